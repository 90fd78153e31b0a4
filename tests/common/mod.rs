//! Shared fakes for the coordinator tests.
//!
//! `HashEmbedder` and `ScriptedGenerator` are deterministic, so repeated
//! runs over the same stores retrieve and answer identically. `FlakyIndex`
//! and `FlakyCatalog` wrap the in-memory stores and fail chosen operations
//! on demand.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docchat::context::AppContext;
use docchat_core::embedding::{EmbeddingProvider, EmbeddingVector};
use docchat_core::generation::{GenerationRequest, ModelCatalog, Role, TextGenerator};
use docchat_core::models::{
    Chunk, ConversationTurn, Document, FileId, NewTurn, SearchHit,
};
use docchat_core::store::memory::{InMemoryCatalog, InMemoryVectorIndex};
use docchat_core::store::{Catalog, VectorIndex};
use docchat_core::{Error, Result};

pub const DIMS: usize = 64;
pub const MODELS: &[&str] = &["llama-3.1-8b-instant", "mixtral-8x7b-groq"];

// ─── Embedder ───────────────────────────────────────────────────────

/// Bag-of-words hashed into a fixed number of buckets.
pub struct HashEmbedder;

fn fnv1a(word: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in word.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

pub fn embed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let word = word.to_lowercase();
        v[(fnv1a(&word) % DIMS as u64) as usize] += 1.0;
    }
    v
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-bow"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|t| embed(t)).collect())
    }
}

/// Always fails, like a provider that is down.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "down"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Err(Error::embedding("down", "connection refused"))
    }
}

// ─── Generator ──────────────────────────────────────────────────────

/// Rewrites follow-ups by prefixing the first question of the history and
/// answers with a summary of the prompt it received. Records every request.
#[derive(Default)]
pub struct ScriptedGenerator {
    pub requests: Mutex<Vec<GenerationRequest>>,
    pub fail_answers: AtomicBool,
}

impl ScriptedGenerator {
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn is_rewrite(request: &GenerationRequest) -> bool {
    request
        .messages
        .first()
        .map(|m| m.role == Role::System && m.content.starts_with("Given a chat history"))
        .unwrap_or(false)
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());

        let question = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if is_rewrite(request) {
            let first = request
                .messages
                .iter()
                .find(|m| m.role == Role::Human)
                .map(|m| m.content.clone())
                .unwrap_or_default();
            return Ok(format!("{} {}", first, question));
        }

        if self.fail_answers.load(Ordering::SeqCst) {
            return Err(Error::generation("scripted", "rate limited"));
        }
        let turns = request.messages.len() - 2;
        Ok(format!("answer to '{}' after {} messages", question, turns))
    }
}

// ─── Failure-injecting stores ───────────────────────────────────────

#[derive(Default)]
pub struct FlakyIndex {
    pub inner: InMemoryVectorIndex,
    pub fail_insert: AtomicBool,
    pub fail_delete: AtomicBool,
    /// Insert the chunks, then report failure.
    pub fail_after_insert: AtomicBool,
}

#[async_trait]
impl VectorIndex for FlakyIndex {
    async fn insert(&self, chunks: &[Chunk]) -> Result<()> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(Error::index("insert", "disk full"));
        }
        self.inner.insert(chunks).await?;
        if self.fail_after_insert.load(Ordering::SeqCst) {
            return Err(Error::index("insert", "commit acknowledgement lost"));
        }
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        k: usize,
        file_id: Option<FileId>,
    ) -> Result<Vec<SearchHit>> {
        self.inner.search(query, k, file_id).await
    }

    async fn delete_by_file(&self, file_id: FileId) -> Result<usize> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::index("delete_by_file", "index unavailable"));
        }
        self.inner.delete_by_file(file_id).await
    }

    async fn count_for_file(&self, file_id: FileId) -> Result<usize> {
        self.inner.count_for_file(file_id).await
    }

    async fn file_ids(&self) -> Result<BTreeSet<FileId>> {
        self.inner.file_ids().await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }
}

#[derive(Default)]
pub struct FlakyCatalog {
    pub inner: InMemoryCatalog,
    pub fail_insert: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_append: AtomicBool,
}

#[async_trait]
impl Catalog for FlakyCatalog {
    async fn insert_document(&self, filename: &str) -> Result<FileId> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(Error::catalog("insert_document", "database is locked"));
        }
        self.inner.insert_document(filename).await
    }

    async fn delete_document(&self, file_id: FileId) -> Result<bool> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Error::catalog("delete_document", "database is locked"));
        }
        self.inner.delete_document(file_id).await
    }

    async fn get_document(&self, file_id: FileId) -> Result<Option<Document>> {
        self.inner.get_document(file_id).await
    }

    async fn get_documents(&self) -> Result<Vec<Document>> {
        self.inner.get_documents().await
    }

    async fn append_turn(&self, turn: &NewTurn) -> Result<ConversationTurn> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(Error::catalog("append_turn", "disk I/O error"));
        }
        self.inner.append_turn(turn).await
    }

    async fn get_turns(&self, session_id: &str) -> Result<Vec<ConversationTurn>> {
        self.inner.get_turns(session_id).await
    }

    async fn count_turns(&self) -> Result<usize> {
        self.inner.count_turns().await
    }
}

// ─── Harness ────────────────────────────────────────────────────────

pub struct Harness {
    pub ctx: AppContext,
    pub index: Arc<FlakyIndex>,
    pub catalog: Arc<FlakyCatalog>,
    pub generator: Arc<ScriptedGenerator>,
    pub dir: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_embedder(Arc::new(HashEmbedder))
    }

    pub fn with_embedder(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let index = Arc::new(FlakyIndex::default());
        let catalog = Arc::new(FlakyCatalog::default());
        let generator = Arc::new(ScriptedGenerator::default());
        let models = ModelCatalog::new(
            MODELS.iter().map(|m| m.to_string()).collect(),
            MODELS[0],
        )
        .unwrap();
        let ctx = AppContext::new(
            catalog.clone(),
            index.clone(),
            embedder,
            generator.clone(),
            models,
        );
        Self {
            ctx,
            index,
            catalog,
            generator,
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// Write `content` to a file named `name` in the harness temp dir.
    pub fn write(&self, name: &str, content: impl AsRef<[u8]>) -> std::path::PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }
}

pub fn set(flag: &AtomicBool, on: bool) {
    flag.store(on, Ordering::SeqCst);
}
