//! Explicitly constructed application context.
//!
//! Holds the two stores, the embedding and generation providers, and the
//! retrieval settings. Built once at startup and passed by reference into
//! every coordinator, so tests can swap in in-memory stores and fakes.

use std::sync::Arc;

use anyhow::Result;

use docchat_core::chunk::ChunkSettings;
use docchat_core::embedding::EmbeddingProvider;
use docchat_core::generation::{ModelCatalog, TextGenerator};
use docchat_core::store::{Catalog, VectorIndex};

use crate::config::Config;
use crate::db;
use crate::embedding::create_provider;
use crate::generation::create_generator;
use crate::loader::Loader;
use crate::sqlite_store::{SqliteCatalog, SqliteVectorIndex};

pub struct AppContext {
    pub catalog: Arc<dyn Catalog>,
    pub index: Arc<dyn VectorIndex>,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub generator: Arc<dyn TextGenerator>,
    pub models: ModelCatalog,
    pub loader: Loader,
    pub chunking: ChunkSettings,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
}

impl AppContext {
    /// Context with default loader, chunking (1000/200), and `top_k` of 2.
    pub fn new(
        catalog: Arc<dyn Catalog>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn TextGenerator>,
        models: ModelCatalog,
    ) -> Self {
        Self {
            catalog,
            index,
            embedder,
            generator,
            models,
            loader: Loader::default(),
            chunking: ChunkSettings::default(),
            top_k: 2,
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkSettings) -> Self {
        self.chunking = chunking;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = loader;
        self
    }

    /// Open the SQLite stores and providers named in `config`.
    ///
    /// Schemas must already exist (`docchat init`).
    pub async fn from_config(config: &Config) -> Result<Self> {
        let catalog_pool = db::connect(&config.db.path).await?;
        let index_pool = db::connect(&config.index.path).await?;
        let models = ModelCatalog::new(
            config.generation.models.clone(),
            config.generation.default_model.clone(),
        )?;

        Ok(Self::new(
            Arc::new(SqliteCatalog::new(catalog_pool)),
            Arc::new(SqliteVectorIndex::new(index_pool)),
            create_provider(&config.embedding)?,
            create_generator(&config.generation)?,
            models,
        )
        .with_chunking(config.chunking.settings())
        .with_top_k(config.retrieval.top_k)
        .with_loader(Loader::new(config.upload.max_extract_bytes)))
    }
}
