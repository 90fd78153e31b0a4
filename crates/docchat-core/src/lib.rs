//! # docchat core
//!
//! Shared logic for docchat: data models, the error taxonomy, chunking,
//! store abstractions for the vector index and the metadata catalog,
//! saga bookkeeping, and the embedding/generation traits.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or network code.
//! Concrete stores and providers live in the `docchat` app crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod models;
pub mod saga;
pub mod store;

pub use error::{Error, Result};
