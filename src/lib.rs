//! # Banter Memory
//!
//! Conversational memory and context assembly for the Banter agent backend.
//!
//! ## Architecture
//!
//! Answering one message draws on three sources of context:
//! - **Long-term user memories** - what the user said, embedded and indexed per subject
//! - **Long-term agent memories** - what the agent replied, kept in a separate namespace
//! - **Recency buffer** - a fixed-capacity FIFO of the latest exchanges
//!
//! [`MemoryStore`] pairs an [`Embedder`] with a [`VectorIndex`] and partitions
//! entries into `(subject, kind)` namespaces. For each message the
//! [`Orchestrator`] recalls from both namespaces, snapshots the recency
//! buffer, assembles a single context blob, and asks the [`Generator`] for a
//! reply. The exchange is then recorded: the recency append lands before the
//! reply returns, while the long-term writes go through the supervised
//! [`MemoryWriter`] so the reply never waits on embedding or the index.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use banter_memory::{
//!     Config, FastembedEmbedder, GenerationSettings, LanceDbIndex, MemoryStore,
//!     OpenAiGenerator, Orchestrator, TranscriptStore,
//! };
//!
//! let config = Config::default();
//! config.ensure_dirs()?;
//!
//! let embedder = Arc::new(FastembedEmbedder::new(&config)?);
//! let index = Arc::new(LanceDbIndex::new(&config).await?);
//! let store = Arc::new(MemoryStore::new(embedder, index));
//! let transcript = Arc::new(TranscriptStore::new(&config.transcript_db_path())?);
//! let generator = Arc::new(OpenAiGenerator::new(GenerationSettings::from_env()));
//!
//! let orchestrator = Orchestrator::new(&config, store, generator, transcript)?;
//! let reply = orchestrator.handle_message("alice", "hey, how's it going?").await?;
//! ```

pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod memory;
pub mod orchestrator;
pub mod recency;
pub mod storage;
pub mod writer;

pub use config::Config;
pub use context::assemble;
pub use embedding::{Embedder, FastembedEmbedder, TokenCounter};
pub use error::{Error, Result};
pub use generation::{GenerationSettings, Generator, OpenAiGenerator};
pub use memory::{namespace, MemoryEntry, MemoryKind, MemoryStore};
pub use orchestrator::Orchestrator;
pub use recency::{Exchange, RecencyBuffer, RecencyLog, RecencyScope};
pub use storage::{LanceDbIndex, MemoryHit, TranscriptStore, VectorIndex};
pub use writer::{MemoryWriter, WriterStats};
