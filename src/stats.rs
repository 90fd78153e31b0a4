//! Store statistics and consistency check.
//!
//! Summarizes what is stored in each database and compares the catalog's
//! document ids with the file ids present in the vector index. Orphans on
//! either side are the leftovers of a partially applied ingestion or
//! deletion and need manual reconciliation.

use anyhow::Result;

use docchat_core::store::{audit, AuditReport};

use crate::config::Config;
use crate::context::AppContext;

/// Counts across both stores plus the audit result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    pub documents: usize,
    pub chunks: usize,
    pub turns: usize,
    pub audit: AuditReport,
}

pub async fn collect_stats(ctx: &AppContext) -> Result<Stats> {
    let documents = ctx.catalog.get_documents().await?.len();
    let chunks = ctx.index.count().await?;
    let turns = ctx.catalog.count_turns().await?;
    let audit = audit(ctx.catalog.as_ref(), ctx.index.as_ref()).await?;

    Ok(Stats {
        documents,
        chunks,
        turns,
        audit,
    })
}

/// Print the stats summary for `docchat stats`.
pub async fn run_stats(config: &Config, ctx: &AppContext) -> Result<()> {
    let stats = collect_stats(ctx).await?;

    let size = |path: &std::path::Path| std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    println!("docchat store stats");
    println!("===================");
    println!();
    println!(
        "  Catalog:     {} ({})",
        config.db.path.display(),
        format_bytes(size(&config.db.path))
    );
    println!(
        "  Index:       {} ({})",
        config.index.path.display(),
        format_bytes(size(&config.index.path))
    );
    println!();
    println!("  Documents:   {}", stats.documents);
    println!("  Chunks:      {}", stats.chunks);
    println!("  Turns:       {}", stats.turns);
    println!();

    if stats.audit.is_consistent() {
        println!("  Consistency: ok");
    } else {
        println!("  Consistency: NEEDS RECONCILIATION");
        if !stats.audit.documents_without_chunks.is_empty() {
            println!(
                "    documents without chunks: {}",
                join_ids(&stats.audit.documents_without_chunks)
            );
        }
        if !stats.audit.chunks_without_document.is_empty() {
            println!(
                "    chunks without document:  {}",
                join_ids(&stats.audit.chunks_without_document)
            );
        }
    }
    println!();

    Ok(())
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
    }

    #[test]
    fn test_join_ids() {
        assert_eq!(join_ids(&[3, 7]), "3, 7");
        assert_eq!(join_ids(&[]), "");
    }
}
