//! Text embeddings via a local fastembed model, no API keys needed

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{Error, Result};

/// Maps free text to a fixed-dimension vector.
///
/// Implementations must be deterministic: the same text always produces the
/// same vector. Empty or whitespace-only text embeds like any other string.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimension of every vector this embedder produces
    fn dimension(&self) -> usize;
}

/// Embedder backed by a local fastembed model
pub struct FastembedEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    dimension: usize,
}

impl FastembedEmbedder {
    /// Load the local model
    pub fn new(config: &Config) -> Result<Self> {
        // all-MiniLM-L6-v2: 384 dimensions, fetched into ~/.cache/fastembed
        // on first use
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(true),
        )
        .map_err(|e| Error::embedding(format!("Failed to load embedding model: {}", e)))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            dimension: config.embedding_dim,
        })
    }
}

#[async_trait]
impl Embedder for FastembedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        // The session takes &mut self, so access is serialized
        let mut guard = self.model.lock().await;
        let embeddings = guard
            .embed(vec![text.to_string()], None)
            .map_err(|e| Error::embedding(format!("Embedding failed: {}", e)))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("No embedding returned"))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Token counter using tiktoken
pub struct TokenCounter {
    bpe: tiktoken_rs::CoreBPE,
}

impl TokenCounter {
    /// Create a new token counter for a specific model
    pub fn new(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|e| Error::config(format!("Failed to load tokenizer for {}: {}", model, e)))?;

        Ok(Self { bpe })
    }

    /// Create a token counter for GPT-4-family models
    pub fn for_gpt() -> Result<Self> {
        Self::new("gpt-4")
    }

    /// Count tokens in a text
    pub fn count(&self, text: &str) -> u32 {
        self.bpe.encode_with_special_tokens(text).len() as u32
    }
}
