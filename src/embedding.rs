//! Embedding provider implementations.
//!
//! Concrete backends for the core [`EmbeddingProvider`] trait:
//! - **[`DisabledProvider`]**: always fails; used when embeddings are not configured.
//! - **[`OpenAIProvider`]**: `POST /v1/embeddings` on OpenAI or a compatible gateway.
//! - **[`OllamaProvider`]**: `POST /api/embed` on a local Ollama instance.
//! - **[`HuggingFaceProvider`]**: the Hugging Face feature-extraction inference endpoint.
//! - **`LocalProvider`**: fastembed models run in-process (feature `local-embeddings-fastembed`).
//!
//! # Provider Selection
//!
//! ```rust,no_run
//! # use docchat::config::EmbeddingConfig;
//! # use docchat::embedding::create_provider;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let provider = create_provider(&config).unwrap();
//! assert_eq!(provider.model_name(), "disabled");
//! ```
//!
//! # Retry Strategy
//!
//! Remote providers retry transient failures up to `max_retries` times
//! (default 0):
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Texts are sent in batches of `batch_size`; every returned vector must
//! have the configured `dims` or the batch fails.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;

use docchat_core::embedding::{check_batch, EmbeddingProvider, EmbeddingVector};
use docchat_core::{Error, Result};

use crate::config::EmbeddingConfig;

/// Send a JSON request, retrying 429/5xx and network errors with
/// exponential backoff. Returns the parsed response body.
async fn post_with_retry<F>(
    provider: &str,
    max_retries: u32,
    build: F,
) -> Result<serde_json::Value>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::warn!(provider, attempt, ?delay, "retrying embedding request");
            tokio::time::sleep(delay).await;
        }

        match build().send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| Error::embedding(provider, e));
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = Error::embedding(provider, format!("API error {}: {}", status, body_text));
                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                last_err = Some(Error::embedding(provider, e));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| Error::embedding(provider, "embedding failed after retries")))
}

fn as_vector(provider: &str, value: &serde_json::Value) -> Result<EmbeddingVector> {
    value
        .as_array()
        .ok_or_else(|| Error::embedding(provider, "embedding is not an array"))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| Error::embedding(provider, "embedding contains a non-number"))
        })
        .collect()
}

fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

/// Split `texts` into `batch_size` pieces, embed each, and check the shape.
async fn embed_batched<'a, F, Fut>(
    provider: &'a str,
    dims: usize,
    batch_size: usize,
    texts: &'a [String],
    embed_batch: F,
) -> Result<Vec<EmbeddingVector>>
where
    F: Fn(&'a [String]) -> Fut,
    Fut: std::future::Future<Output = Result<Vec<EmbeddingVector>>>,
{
    let mut out = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size.max(1)) {
        let vectors = embed_batch(batch).await?;
        check_batch(provider, batch.len(), dims, &vectors)?;
        out.extend(vectors);
    }
    Ok(out)
}

// ============ Disabled Provider ============

/// A no-op embedding provider that always returns errors.
pub struct DisabledProvider;

#[async_trait]
impl EmbeddingProvider for DisabledProvider {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    async fn embed_texts(&self, _texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Err(Error::embedding("disabled", "embedding provider is disabled"))
    }
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI embeddings API.
///
/// Reads the API key from the variable named by `api_key_env`
/// (default `OPENAI_API_KEY`).
pub struct OpenAIProvider {
    model: String,
    dims: usize,
    url: String,
    api_key: String,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let key_env = config.api_key_env.as_deref().unwrap_or("OPENAI_API_KEY");
        let api_key = std::env::var(key_env)
            .with_context(|| format!("{} environment variable not set", key_env))?;

        Ok(Self {
            model,
            dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key,
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let endpoint = format!("{}/embeddings", self.url.trim_end_matches('/'));
        let json = post_with_retry("openai", self.max_retries, || {
            self.client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;
        parse_openai_response(&json)
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        embed_batched("openai", self.dims, self.batch_size, texts, |batch| {
            self.embed_batch(batch)
        })
        .await
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<EmbeddingVector>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::embedding("openai", "invalid response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        let embedding = item
            .get("embedding")
            .ok_or_else(|| Error::embedding("openai", "invalid response: missing embedding"))?;
        indexed.push((index, as_vector("openai", embedding)?));
    }
    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama Provider ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST /api/embed` on the configured URL (default `http://localhost:11434`).
pub struct OllamaProvider {
    model: String,
    dims: usize,
    url: String,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;

        Ok(Self {
            model,
            dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let endpoint = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let json = post_with_retry("ollama", self.max_retries, || {
            self.client.post(&endpoint).json(&body)
        })
        .await?;
        parse_ollama_response(&json)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        embed_batched("ollama", self.dims, self.batch_size, texts, |batch| {
            self.embed_batch(batch)
        })
        .await
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<EmbeddingVector>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| Error::embedding("ollama", "invalid response: missing embeddings array"))?
        .iter()
        .map(|e| as_vector("ollama", e))
        .collect()
}

// ============ Hugging Face Provider ============

/// Embedding provider using the Hugging Face inference API.
///
/// Posts to `{url}/{model}` where `url` defaults to the hosted
/// feature-extraction pipeline. The token is optional and read from the
/// variable named by `api_key_env` (default `HUGGINGFACEHUB_API_TOKEN`).
pub struct HuggingFaceProvider {
    model: String,
    dims: usize,
    url: String,
    api_key: Option<String>,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl HuggingFaceProvider {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Hugging Face provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Hugging Face provider"))?;
        let key_env = config
            .api_key_env
            .as_deref()
            .unwrap_or("HUGGINGFACEHUB_API_TOKEN");

        Ok(Self {
            model,
            dims,
            url: config.url.clone().unwrap_or_else(|| {
                "https://api-inference.huggingface.co/pipeline/feature-extraction".to_string()
            }),
            api_key: std::env::var(key_env).ok(),
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let body = serde_json::json!({
            "inputs": texts,
            "options": { "wait_for_model": true },
        });
        let endpoint = format!("{}/{}", self.url.trim_end_matches('/'), self.model);
        let json = post_with_retry("huggingface", self.max_retries, || {
            let req = self.client.post(&endpoint).json(&body);
            match &self.api_key {
                Some(key) => req.bearer_auth(key),
                None => req,
            }
        })
        .await?;
        parse_feature_extraction(&json)
    }
}

#[async_trait]
impl EmbeddingProvider for HuggingFaceProvider {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        embed_batched("huggingface", self.dims, self.batch_size, texts, |batch| {
            self.embed_batch(batch)
        })
        .await
    }
}

/// Parse a feature-extraction response.
///
/// Sentence-transformer models return one vector per input. Plain
/// transformer models return one vector per token, which are mean-pooled.
fn parse_feature_extraction(json: &serde_json::Value) -> Result<Vec<EmbeddingVector>> {
    let items = json
        .as_array()
        .ok_or_else(|| Error::embedding("huggingface", format!("unexpected response: {}", json)))?;

    items
        .iter()
        .map(|item| {
            let is_token_matrix = item
                .as_array()
                .and_then(|rows| rows.first())
                .map(|first| first.is_array())
                .unwrap_or(false);
            if !is_token_matrix {
                return as_vector("huggingface", item);
            }

            let tokens = item
                .as_array()
                .map(|rows| {
                    rows.iter()
                        .map(|r| as_vector("huggingface", r))
                        .collect::<Result<Vec<_>>>()
                })
                .unwrap_or_else(|| Ok(Vec::new()))?;
            Ok(mean_pool(&tokens))
        })
        .collect()
}

fn mean_pool(tokens: &[EmbeddingVector]) -> EmbeddingVector {
    let Some(width) = tokens.first().map(Vec::len) else {
        return Vec::new();
    };
    let mut sum = vec![0.0f32; width];
    for token in tokens {
        for (acc, v) in sum.iter_mut().zip(token) {
            *acc += v;
        }
    }
    let n = tokens.len() as f32;
    sum.iter_mut().for_each(|v| *v /= n);
    sum
}

// ============ Local Provider (fastembed) ============

/// Embedding provider running fastembed models in-process.
///
/// Models are downloaded on first use and cached; after that no network
/// calls are made.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalProvider {
    model_name: String,
    dims: usize,
    batch_size: usize,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalProvider {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        config_to_fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or(match model_name.as_str() {
            "bge-base-en-v1.5" | "nomic-embed-text-v1.5" => 768,
            "bge-large-en-v1.5" => 1024,
            _ => 384,
        });
        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
        })
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> anyhow::Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1.5",
            other
        ),
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }
    fn dims(&self) -> usize {
        self.dims
    }
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let model = config_to_fastembed_model(&self.model_name)
            .map_err(|e| Error::embedding("local", e))?;
        let batch_size = self.batch_size;
        let owned = texts.to_vec();

        let vectors = tokio::task::spawn_blocking(move || {
            let mut model = fastembed::TextEmbedding::try_new(
                fastembed::InitOptions::new(model).with_show_download_progress(false),
            )
            .map_err(|e| Error::embedding("local", format!("model init failed: {}", e)))?;
            model
                .embed(owned, Some(batch_size))
                .map_err(|e| Error::embedding("local", e))
        })
        .await
        .map_err(|e| Error::embedding("local", e))??;

        check_batch("local", texts.len(), self.dims, &vectors)?;
        Ok(vectors)
    }
}

/// Create the [`EmbeddingProvider`] named by `config.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledProvider`] |
/// | `"openai"` | [`OpenAIProvider`] |
/// | `"ollama"` | [`OllamaProvider`] |
/// | `"huggingface"` | [`HuggingFaceProvider`] |
/// | `"local"` | `LocalProvider` (requires `local-embeddings-fastembed`) |
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledProvider)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaProvider::new(config)?)),
        "huggingface" => Ok(Arc::new(HuggingFaceProvider::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalProvider::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!("Local embedding provider requires --features local-embeddings-fastembed"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_provider_fails() {
        let err = DisabledProvider
            .embed_texts(&["hi".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmbeddingProvider { .. }));
    }

    #[test]
    fn create_disabled_provider() {
        let provider = create_provider(&EmbeddingConfig::default()).unwrap();
        assert_eq!(provider.model_name(), "disabled");
    }

    #[test]
    fn openai_response_sorted_by_index() {
        let json = serde_json::json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] },
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn openai_response_missing_data() {
        assert!(parse_openai_response(&serde_json::json!({})).is_err());
    }

    #[test]
    fn ollama_response() {
        let json = serde_json::json!({ "embeddings": [[0.5, 0.5]] });
        assert_eq!(parse_ollama_response(&json).unwrap(), vec![vec![0.5, 0.5]]);
    }

    #[test]
    fn feature_extraction_sentence_vectors() {
        let json = serde_json::json!([[1.0, 2.0], [3.0, 4.0]]);
        assert_eq!(
            parse_feature_extraction(&json).unwrap(),
            vec![vec![1.0, 2.0], vec![3.0, 4.0]]
        );
    }

    #[test]
    fn feature_extraction_token_matrix_is_pooled() {
        let json = serde_json::json!([[[1.0, 0.0], [3.0, 2.0]]]);
        assert_eq!(parse_feature_extraction(&json).unwrap(), vec![vec![2.0, 1.0]]);
    }

    #[test]
    fn feature_extraction_error_body() {
        let json = serde_json::json!({ "error": "Model is loading" });
        assert!(parse_feature_extraction(&json).is_err());
    }
}
