//! In-memory [`VectorIndex`] and [`Catalog`] implementations for tests.
//!
//! Uses `Vec` and `HashMap` behind `std::sync::RwLock` for thread safety.
//! Vector search is brute-force cosine similarity over all stored chunks.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::{Chunk, ConversationTurn, Document, FileId, NewTurn, SearchHit};

use super::{rank_hits, Catalog, VectorIndex};

fn poisoned(op: &'static str) -> Error {
    Error::index(op, "lock poisoned")
}

/// In-memory vector index.
#[derive(Default)]
pub struct InMemoryVectorIndex {
    chunks: RwLock<Vec<Chunk>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn insert(&self, chunks: &[Chunk]) -> Result<()> {
        let mut stored = self.chunks.write().map_err(|_| poisoned("insert"))?;
        stored.extend_from_slice(chunks);
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        file_id: Option<FileId>,
    ) -> Result<Vec<SearchHit>> {
        let stored = self.chunks.read().map_err(|_| poisoned("search"))?;
        let mut hits: Vec<SearchHit> = stored
            .iter()
            .filter(|c| file_id.map_or(true, |f| c.file_id == f))
            .map(|c| SearchHit {
                score: cosine_similarity(query, &c.embedding),
                chunk: c.clone(),
            })
            .collect();
        rank_hits(&mut hits, k);
        Ok(hits)
    }

    async fn delete_by_file(&self, file_id: FileId) -> Result<usize> {
        let mut stored = self.chunks.write().map_err(|_| poisoned("delete_by"))?;
        let before = stored.len();
        stored.retain(|c| c.file_id != file_id);
        Ok(before - stored.len())
    }

    async fn count_for_file(&self, file_id: FileId) -> Result<usize> {
        let stored = self.chunks.read().map_err(|_| poisoned("count"))?;
        Ok(stored.iter().filter(|c| c.file_id == file_id).count())
    }

    async fn file_ids(&self) -> Result<BTreeSet<FileId>> {
        let stored = self.chunks.read().map_err(|_| poisoned("file_ids"))?;
        Ok(stored.iter().map(|c| c.file_id).collect())
    }

    async fn count(&self) -> Result<usize> {
        let stored = self.chunks.read().map_err(|_| poisoned("count"))?;
        Ok(stored.len())
    }
}

#[derive(Default)]
struct CatalogState {
    next_file_id: FileId,
    documents: Vec<Document>,
    turns: HashMap<String, Vec<ConversationTurn>>,
}

/// In-memory metadata catalog.
#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn catalog_poisoned(op: &'static str) -> Error {
    Error::catalog(op, "lock poisoned")
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn insert_document(&self, filename: &str) -> Result<FileId> {
        let mut state = self
            .state
            .write()
            .map_err(|_| catalog_poisoned("insert_document"))?;
        state.next_file_id += 1;
        let file_id = state.next_file_id;
        state.documents.push(Document {
            file_id,
            filename: filename.to_string(),
            upload_timestamp: Utc::now(),
        });
        Ok(file_id)
    }

    async fn delete_document(&self, file_id: FileId) -> Result<bool> {
        let mut state = self
            .state
            .write()
            .map_err(|_| catalog_poisoned("delete_document"))?;
        let before = state.documents.len();
        state.documents.retain(|d| d.file_id != file_id);
        Ok(state.documents.len() < before)
    }

    async fn get_document(&self, file_id: FileId) -> Result<Option<Document>> {
        let state = self
            .state
            .read()
            .map_err(|_| catalog_poisoned("get_document"))?;
        Ok(state.documents.iter().find(|d| d.file_id == file_id).cloned())
    }

    async fn get_documents(&self) -> Result<Vec<Document>> {
        let state = self
            .state
            .read()
            .map_err(|_| catalog_poisoned("get_documents"))?;
        let mut docs = state.documents.clone();
        docs.sort_by(|a, b| {
            b.upload_timestamp
                .cmp(&a.upload_timestamp)
                .then_with(|| b.file_id.cmp(&a.file_id))
        });
        Ok(docs)
    }

    async fn append_turn(&self, turn: &NewTurn) -> Result<ConversationTurn> {
        let mut state = self
            .state
            .write()
            .map_err(|_| catalog_poisoned("append_turn"))?;
        let session = state.turns.entry(turn.session_id.clone()).or_default();
        let stored = ConversationTurn {
            session_id: turn.session_id.clone(),
            seq: session.last().map_or(1, |t| t.seq + 1),
            user_query: turn.user_query.clone(),
            response: turn.response.clone(),
            model: turn.model.clone(),
            created_at: Utc::now(),
        };
        session.push(stored.clone());
        Ok(stored)
    }

    async fn get_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        let state = self
            .state
            .read()
            .map_err(|_| catalog_poisoned("get_turns"))?;
        Ok(state.turns.get(session_id).cloned().unwrap_or_default())
    }

    async fn count_turns(&self) -> Result<usize> {
        let state = self
            .state
            .read()
            .map_err(|_| catalog_poisoned("count_turns"))?;
        Ok(state.turns.values().map(Vec::len).sum())
    }
}
