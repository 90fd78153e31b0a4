//! Storage abstractions for docchat.
//!
//! Two independent stores back the system and share no transaction:
//!
//! | Trait | Holds |
//! |-------|-------|
//! | [`VectorIndex`] | chunks with their embeddings, searchable by similarity |
//! | [`Catalog`] | document identities and conversation turns |
//!
//! Every operation is individually atomic. Keeping the two stores in
//! agreement is the job of the coordinators, which use [`crate::saga`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::cmp::Ordering;
use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Chunk, ConversationTurn, Document, FileId, NewTurn, SearchHit};

/// Similarity-searchable chunk storage.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append chunks. No uniqueness constraint on text.
    ///
    /// Either all chunks are stored or the call fails with
    /// `IndexOperationFailed`.
    async fn insert(&self, chunks: &[Chunk]) -> Result<()>;

    /// Return at most `k` chunks ordered by descending cosine similarity,
    /// optionally restricted to one document.
    async fn search(
        &self,
        query: &[f32],
        k: usize,
        file_id: Option<FileId>,
    ) -> Result<Vec<SearchHit>>;

    /// Remove every chunk tagged with `file_id`, returning how many were
    /// removed. Zero matches is a success.
    async fn delete_by_file(&self, file_id: FileId) -> Result<usize>;

    /// Number of chunks tagged with `file_id`.
    async fn count_for_file(&self, file_id: FileId) -> Result<usize>;

    /// Distinct file ids present in the index.
    async fn file_ids(&self) -> Result<BTreeSet<FileId>>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<usize>;
}

/// Relational store of documents and conversation turns.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Register a document, returning its newly assigned id.
    async fn insert_document(&self, filename: &str) -> Result<FileId>;

    /// Remove a document record. Returns `false` when no row matched.
    async fn delete_document(&self, file_id: FileId) -> Result<bool>;

    async fn get_document(&self, file_id: FileId) -> Result<Option<Document>>;

    /// All documents, newest upload first (ties broken by descending id).
    async fn get_documents(&self) -> Result<Vec<Document>>;

    /// Append a turn to its session, assigning the next sequence number.
    async fn append_turn(&self, turn: &NewTurn) -> Result<ConversationTurn>;

    /// Turns of one session in ascending sequence order.
    async fn get_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>>;

    /// Total number of logged turns across all sessions.
    async fn count_turns(&self) -> Result<usize>;
}

/// Order search hits by descending score, breaking ties by file id and
/// chunk index so results are reproducible.
pub fn rank_hits(hits: &mut Vec<SearchHit>, k: usize) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.file_id.cmp(&b.chunk.file_id))
            .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
    });
    hits.truncate(k);
}

/// Orphans found by comparing the two stores.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    /// Catalog documents with no chunks in the index.
    pub documents_without_chunks: Vec<FileId>,
    /// Index file ids with no catalog document.
    pub chunks_without_document: Vec<FileId>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.documents_without_chunks.is_empty() && self.chunks_without_document.is_empty()
    }
}

/// Compare catalog documents against index file ids.
pub async fn audit(catalog: &dyn Catalog, index: &dyn VectorIndex) -> Result<AuditReport> {
    let documents: BTreeSet<FileId> = catalog
        .get_documents()
        .await?
        .into_iter()
        .map(|d| d.file_id)
        .collect();
    let indexed = index.file_ids().await?;

    Ok(AuditReport {
        documents_without_chunks: documents.difference(&indexed).copied().collect(),
        chunks_without_document: indexed.difference(&documents).copied().collect(),
    })
}
