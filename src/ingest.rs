//! Ingestion coordinator.
//!
//! Registers a document in the catalog first so its `file_id` exists to tag
//! chunks, then loads, chunks, embeds, and inserts into the vector index.
//! Any failure after registration is compensated by removing the catalog
//! record, and the result tells the caller whether the stores are untouched,
//! rolled back, or left partially applied.

use std::path::{Path, PathBuf};

use anyhow::bail;
use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use docchat_core::chunk::split_segments;
use docchat_core::models::{Chunk, FileId};
use docchat_core::saga::{SagaError, SagaLog, Step};
use docchat_core::{Error, Result};

use crate::config::UploadConfig;
use crate::context::AppContext;
use crate::loader::is_supported;

/// A successfully ingested document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub file_id: FileId,
    pub filename: String,
    pub chunks: usize,
}

/// Ingest one file: register, index, and compensate on failure.
pub async fn ingest_file(
    ctx: &AppContext,
    path: &Path,
) -> std::result::Result<IngestReport, SagaError> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidInput(format!("not a file path: {}", path.display())))?;

    let mut log = SagaLog::new();
    let file_id = ctx.catalog.insert_document(&filename).await.map_err(|cause| {
        tracing::error!(%filename, error = %cause, "document registration failed");
        SagaError::from(cause)
    })?;
    log.record(Step::DocumentRegistered { file_id });
    tracing::info!(file_id, %filename, "document registered");

    match index_document(ctx, path, file_id).await {
        Ok(chunks) => {
            tracing::info!(file_id, %filename, chunks, "document indexed");
            Ok(IngestReport {
                file_id,
                filename,
                chunks,
            })
        }
        Err(cause) => Err(compensate(ctx, log, cause).await),
    }
}

/// Load, chunk, embed, and insert a file under an already assigned id.
///
/// Returns the number of chunks inserted. Touches only the vector index,
/// and only in the final insert.
pub async fn index_document(ctx: &AppContext, path: &Path, file_id: FileId) -> Result<usize> {
    let chunks = prepare_chunks(ctx, path, file_id).await?;
    ctx.index.insert(&chunks).await?;
    Ok(chunks.len())
}

/// Everything up to, but not including, the index insert.
async fn prepare_chunks(ctx: &AppContext, path: &Path, file_id: FileId) -> Result<Vec<Chunk>> {
    let segments = ctx.loader.load(path)?;
    let candidates = split_segments(&segments, &ctx.chunking);
    if candidates.is_empty() {
        return Err(Error::NoContent(path.display().to_string()));
    }

    let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let vectors = ctx.embedder.embed_texts(&texts).await?;
    if vectors.len() != candidates.len() {
        return Err(Error::embedding(
            ctx.embedder.model_name(),
            format!("expected {} vectors, got {}", candidates.len(), vectors.len()),
        ));
    }

    Ok(candidates
        .into_iter()
        .zip(vectors)
        .map(|(candidate, embedding)| {
            let mut chunk = candidate.into_chunk(file_id, embedding);
            chunk
                .metadata
                .insert("file_id".to_string(), serde_json::Value::from(file_id));
            chunk
        })
        .collect())
}

/// Undo committed steps in reverse order and classify the outcome.
async fn compensate(ctx: &AppContext, log: SagaLog, cause: Error) -> SagaError {
    tracing::warn!(
        error = %cause,
        retryable = cause.is_retryable(),
        steps = log.committed().len(),
        "ingestion failed, compensating"
    );

    let mut result = Ok(());
    for step in log.pending_compensation() {
        if let Step::DocumentRegistered { file_id } = step {
            // Sweep anything a failed insert may have left behind. If the
            // sweep fails the record is kept so the chunks stay attributable.
            if matches!(cause, Error::IndexOperationFailed { .. }) {
                if let Err(e) = ctx.index.delete_by_file(*file_id).await {
                    tracing::warn!(file_id, error = %e, "index sweep during compensation failed");
                    result = Err(e);
                    break;
                }
            }
            match ctx.catalog.delete_document(*file_id).await {
                Ok(_) => tracing::warn!(file_id, "document registration rolled back"),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
    }

    let err = log.fail(cause, result);
    if err.needs_reconciliation() {
        tracing::error!(error = %err, "ingestion left stores inconsistent");
    }
    err
}

/// Supported files under `root` matching the upload include globs and not
/// the exclude globs, sorted by path. A file path is returned as-is.
pub fn collect_upload_paths(root: &Path, config: &UploadConfig) -> anyhow::Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.exists() {
        bail!("Upload path does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let mut default_excludes = vec!["**/.git/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        if !is_supported(path) {
            tracing::debug!(path = %path.display(), "skipping unsupported file");
            continue;
        }
        paths.push(path.to_path_buf());
    }

    paths.sort();
    Ok(paths)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn collect_applies_globs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::create_dir_all(dir.path().join("drafts")).unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("nested/b.pdf"), "b").unwrap();
        fs::write(dir.path().join("drafts/c.txt"), "c").unwrap();
        fs::write(dir.path().join("d.xyz"), "d").unwrap();

        let config = UploadConfig {
            exclude_globs: vec!["drafts/**".to_string()],
            ..UploadConfig::default()
        };
        let paths = collect_upload_paths(dir.path(), &config).unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.pdf"]);
    }

    #[test]
    fn collect_skips_unsupported_even_when_globbed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "a").unwrap();
        fs::write(dir.path().join("b.bin"), "b").unwrap();

        let config = UploadConfig {
            include_globs: vec!["**/*".to_string()],
            ..UploadConfig::default()
        };
        let paths = collect_upload_paths(dir.path(), &config).unwrap();
        assert_eq!(paths, vec![dir.path().join("a.md")]);
    }

    #[test]
    fn collect_single_file_passthrough() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.xyz");
        fs::write(&path, "x").unwrap();
        assert_eq!(
            collect_upload_paths(&path, &UploadConfig::default()).unwrap(),
            vec![path]
        );
    }

    #[test]
    fn collect_missing_root_fails() {
        assert!(collect_upload_paths(Path::new("/no/such/dir"), &UploadConfig::default()).is_err());
    }
}
