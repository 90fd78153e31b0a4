//! # docchat
//!
//! Document question answering over a local corpus.
//!
//! Files are loaded, split into overlapping chunks, embedded, and stored in a
//! vector index. A relational catalog tracks uploaded documents and the chat
//! history of each session. Answers are generated by an OpenAI-compatible
//! chat model from the chunks most similar to a history-aware rewrite of the
//! question.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Loader  │──▶│ Chunk+Embed │──▶│ Vector index │
//! │ pdf/docx │   └─────────────┘   └──────┬───────┘
//! │ html/csv │                            │ top-k
//! └──────────┘   ┌─────────────┐   ┌──────▼───────┐
//!                │   Catalog   │◀──│     Chat     │
//!                │ docs + logs │   │ rewrite+LLM  │
//!                └─────────────┘   └──────────────┘
//! ```
//!
//! Upload and delete touch both stores. They are coordinated as sagas (see
//! [`docchat_core::saga`]): committed steps are compensated in reverse on
//! failure, and the caller learns whether the stores were left unchanged,
//! rolled back, or partially applied.
//!
//! ## Quick Start
//!
//! ```bash
//! docchat init
//! docchat upload ./docs
//! docchat chat "What does the onboarding guide say about VPN access?"
//! docchat chat "And for contractors?" --session <id>
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | SQLite connection pools |
//! | [`migrate`] | Schema migrations for both stores |
//! | [`sqlite_store`] | SQLite-backed catalog and vector index |
//! | [`loader`] | Format-specific text extraction |
//! | [`embedding`] | Embedding provider implementations |
//! | [`generation`] | Chat completion client |
//! | [`context`] | Application context wiring |
//! | [`ingest`] | Upload coordinator |
//! | [`delete`] | Deletion coordinator |
//! | [`chat`] | Retrieval and answer pipeline |
//! | [`stats`] | Store counts and consistency audit |

pub mod chat;
pub mod config;
pub mod context;
pub mod db;
pub mod delete;
pub mod embedding;
pub mod generation;
pub mod ingest;
pub mod loader;
pub mod migrate;
pub mod sqlite_store;
pub mod stats;

pub use docchat_core;
