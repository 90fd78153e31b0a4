//! Core data models used throughout docchat.
//!
//! These types represent the documents, segments, chunks, and conversation
//! turns that flow through the ingestion and retrieval pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity correlating a catalog [`Document`] with all of its [`Chunk`]s.
///
/// Assigned by the catalog; monotonically increasing and never reused.
pub type FileId = i64;

/// Loader- and chunker-specific fields attached to segments and chunks.
///
/// A `BTreeMap` keeps serialization order stable so that identical inputs
/// produce byte-identical `metadata_json`.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// A document registered in the metadata catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub file_id: FileId,
    pub filename: String,
    pub upload_timestamp: DateTime<Utc>,
}

/// A normalized unit of text produced by a loader (a PDF page, a CSV row,
/// a whole text file).
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub metadata: Metadata,
}

impl Segment {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A passage stored in the vector index.
///
/// Created in bulk while ingesting one document and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Owning document.
    pub file_id: FileId,
    /// Position of the chunk within its document, contiguous from 0.
    pub chunk_index: i64,
    pub text: String,
    pub embedding: Vec<f32>,
    /// SHA-256 of `text`.
    pub hash: String,
    /// Segment metadata plus the chunk's character offsets.
    pub metadata: Metadata,
}

/// A chunk returned by similarity search with its cosine score.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// One question/answer exchange within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub session_id: String,
    /// Per-session sequence number, strictly increasing from 1.
    pub seq: i64,
    pub user_query: String,
    pub response: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when appending a turn; the catalog assigns `seq` and
/// `created_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTurn {
    pub session_id: String,
    pub user_query: String,
    pub response: String,
    pub model: String,
}
