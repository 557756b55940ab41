//! Configuration for banter-memory

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::recency::RecencyScope;

/// Configuration for the memory subsystem
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for all storage
    pub data_dir: PathBuf,

    /// Embedding model name (for reference, actual model set in embedding.rs)
    pub embedding_model: String,

    /// Embedding dimensions (384 for all-MiniLM-L6-v2)
    pub embedding_dim: usize,

    /// Maximum number of memories recalled per (subject, kind) namespace
    pub recall_limit: usize,

    /// Number of exchanges each recency buffer holds
    pub recency_capacity: usize,

    /// How recency buffers are scoped across subjects
    pub recency_scope: RecencyScope,

    /// Capacity of the background write queue
    pub write_queue_depth: usize,

    /// Token count above which an assembled context is logged as unusually large
    pub context_token_warning: u32,

    /// HTTP server port
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("banter-memory");

        Self {
            data_dir,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_dim: 384, // MiniLM-L6-v2 outputs 384-dim vectors
            recall_limit: 5,
            recency_capacity: 5,
            recency_scope: RecencyScope::PerSubject,
            write_queue_depth: 32,
            context_token_warning: 6000,
            server_port: 8430,
        }
    }
}

impl Config {
    /// Create a new config with a custom data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Reject configurations that cannot produce a working subsystem.
    /// Called once at startup, before any component is built.
    pub fn validate(&self) -> Result<()> {
        if self.embedding_dim == 0 {
            return Err(Error::config("embedding_dim must be at least 1"));
        }
        if self.recall_limit == 0 {
            return Err(Error::config("recall_limit must be at least 1"));
        }
        if self.recency_capacity == 0 {
            return Err(Error::config("recency_capacity must be at least 1"));
        }
        if self.write_queue_depth == 0 {
            return Err(Error::config("write_queue_depth must be at least 1"));
        }
        Ok(())
    }

    /// Get the path to the vector database
    pub fn vector_db_path(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    /// Get the path to the SQLite transcript database
    pub fn transcript_db_path(&self) -> PathBuf {
        self.data_dir.join("transcripts.db")
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.vector_db_path())?;
        Ok(())
    }
}
