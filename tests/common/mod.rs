//! Shared test doubles for the embedder, index, and generator seams.
//!
//! None of these touch the network or the filesystem, so protocol tests stay
//! deterministic and run offline. The real fastembed model is never loaded
//! in tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use banter_memory::error::{Error, Result};
use banter_memory::memory::MemoryEntry;
use banter_memory::storage::{MemoryHit, VectorIndex};
use banter_memory::Embedder;

/// Dimension all test vectors use
pub const DIM: usize = 8;

/// Deterministic embedder: hashes whitespace tokens into buckets, with a
/// constant component so no vector is ever all-zero, then normalizes.
/// Identical text always embeds identically.
pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; DIM];
        for token in text.split_whitespace() {
            let mut h: u64 = 0xcbf29ce484222325;
            for b in token.to_lowercase().bytes() {
                h ^= b as u64;
                h = h.wrapping_mul(0x100000001b3);
            }
            v[(h % (DIM as u64 - 1)) as usize] += 1.0;
        }
        v[DIM - 1] = 1.0;

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        Ok(v.into_iter().map(|x| x / norm).collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }
}

struct StoredRow {
    vector: Vec<f32>,
    text: Option<String>,
}

/// In-memory cosine index over namespaces
#[derive(Default)]
pub struct InMemoryIndex {
    rows: Mutex<HashMap<String, Vec<StoredRow>>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row whose text payload is missing, as a malformed entry
    pub fn insert_textless(&self, namespace: &str, vector: Vec<f32>) {
        self.rows
            .lock()
            .unwrap()
            .entry(namespace.to_string())
            .or_default()
            .push(StoredRow { vector, text: None });
    }

    /// Number of rows stored under a namespace
    pub fn count(&self, namespace: &str) -> usize {
        self.rows
            .lock()
            .unwrap()
            .get(namespace)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    /// All stored texts under a namespace, insertion order
    pub fn texts(&self, namespace: &str) -> Vec<String> {
        self.rows
            .lock()
            .unwrap()
            .get(namespace)
            .map(|rows| rows.iter().filter_map(|r| r.text.clone()).collect())
            .unwrap_or_default()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, entry: &MemoryEntry) -> Result<()> {
        self.rows
            .lock()
            .unwrap()
            .entry(entry.namespace())
            .or_default()
            .push(StoredRow {
                vector: entry.vector.clone(),
                text: Some(entry.text.clone()),
            });
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<MemoryHit>> {
        let rows = self.rows.lock().unwrap();
        let mut hits: Vec<MemoryHit> = rows
            .get(namespace)
            .map(|rows| {
                rows.iter()
                    .map(|r| MemoryHit {
                        text: r.text.clone(),
                        score: cosine(&r.vector, vector),
                    })
                    .collect()
            })
            .unwrap_or_default();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Index whose every operation fails
pub struct FailingIndex;

#[async_trait]
impl VectorIndex for FailingIndex {
    async fn upsert(&self, _entry: &MemoryEntry) -> Result<()> {
        Err(Error::store("index offline"))
    }

    async fn query(
        &self,
        _namespace: &str,
        _vector: &[f32],
        _top_k: usize,
    ) -> Result<Vec<MemoryHit>> {
        Err(Error::store("index offline"))
    }
}

/// Index that answers queries but rejects every write
pub struct ReadOnlyIndex;

#[async_trait]
impl VectorIndex for ReadOnlyIndex {
    async fn upsert(&self, _entry: &MemoryEntry) -> Result<()> {
        Err(Error::store("write refused"))
    }

    async fn query(
        &self,
        _namespace: &str,
        _vector: &[f32],
        _top_k: usize,
    ) -> Result<Vec<MemoryHit>> {
        Ok(Vec::new())
    }
}

/// Index whose writes block until released, for exercising the write queue.
/// `entered` fires when a write starts; `release` lets it finish.
pub struct GatedIndex {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl GatedIndex {
    pub fn new() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for GatedIndex {
    async fn upsert(&self, _entry: &MemoryEntry) -> Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }

    async fn query(
        &self,
        _namespace: &str,
        _vector: &[f32],
        _top_k: usize,
    ) -> Result<Vec<MemoryHit>> {
        Ok(Vec::new())
    }
}

/// Generator returning a fixed reply and recording every context it saw
pub struct ScriptedGenerator {
    reply: String,
    contexts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Contexts seen so far, oldest first
    pub fn contexts(&self) -> Vec<String> {
        self.contexts.lock().unwrap().clone()
    }

    /// The most recent context seen
    pub fn last_context(&self) -> String {
        self.contexts
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("generator was never called")
    }
}

#[async_trait]
impl banter_memory::Generator for ScriptedGenerator {
    async fn generate(&self, context: &str) -> Result<String> {
        self.contexts.lock().unwrap().push(context.to_string());
        Ok(self.reply.clone())
    }
}

/// Generator that always fails
pub struct FailingGenerator;

#[async_trait]
impl banter_memory::Generator for FailingGenerator {
    async fn generate(&self, _context: &str) -> Result<String> {
        Err(Error::generation("model unavailable"))
    }
}
