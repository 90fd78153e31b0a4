//! Deletion coordinator.
//!
//! Removes a document's chunks from the vector index first, then its record
//! from the catalog. If the index delete fails nothing has changed and the
//! record is kept. If the catalog delete fails after chunks were removed the
//! stores disagree, which is reported as partially applied.

use docchat_core::models::FileId;
use docchat_core::saga::{SagaError, SagaLog, Step};

use crate::context::AppContext;

/// Successful result of a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Chunks and/or the catalog record were removed.
    Deleted {
        file_id: FileId,
        chunks_removed: usize,
        document_removed: bool,
    },
    /// Neither store held anything for this id.
    NothingToDelete { file_id: FileId },
}

pub async fn delete_document(
    ctx: &AppContext,
    file_id: FileId,
) -> Result<DeleteOutcome, SagaError> {
    let mut log = SagaLog::new();

    let chunks_removed = ctx.index.delete_by_file(file_id).await.map_err(|cause| {
        tracing::error!(file_id, error = %cause, "chunk deletion failed, document kept");
        SagaError::from(cause)
    })?;
    if chunks_removed > 0 {
        log.record(Step::ChunksRemoved {
            file_id,
            chunks: chunks_removed,
        });
        tracing::info!(file_id, chunks = chunks_removed, "chunks removed");
    }

    let document_removed = match ctx.catalog.delete_document(file_id).await {
        Ok(removed) => removed,
        Err(cause) => {
            let err = log.fail_uncompensated(cause);
            if err.needs_reconciliation() {
                tracing::error!(file_id, error = %err, "chunks removed but document record kept");
            }
            return Err(err);
        }
    };

    if chunks_removed == 0 && !document_removed {
        tracing::info!(file_id, "nothing to delete");
        return Ok(DeleteOutcome::NothingToDelete { file_id });
    }
    if !document_removed {
        tracing::warn!(file_id, chunks = chunks_removed, "removed chunks with no catalog record");
    } else {
        tracing::info!(file_id, "document removed");
    }

    Ok(DeleteOutcome::Deleted {
        file_id,
        chunks_removed,
        document_removed,
    })
}
