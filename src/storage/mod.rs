//! Storage backends for banter-memory

mod transcript;
pub mod vector;

pub use transcript::{TranscriptRow, TranscriptStore};
pub use vector::{LanceDbIndex, MemoryHit, VectorIndex};
