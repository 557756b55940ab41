//! Memory entries and the store that writes and recalls them

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::storage::VectorIndex;

/// Whose utterance a memory captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// Something the user said
    User,

    /// Something the agent replied
    Agent,
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryKind::User => write!(f, "user"),
            MemoryKind::Agent => write!(f, "agent"),
        }
    }
}

/// Derive the namespace for a (subject, kind) pair.
///
/// Entries written under one pair are invisible to every other pair; two
/// subjects with the same name share nothing across kinds either.
pub fn namespace(subject: &str, kind: MemoryKind) -> String {
    format!("{}_{}", subject, kind)
}

/// A single long-term memory. Entries are immutable once stored and are
/// never evicted.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    /// Unique entry ID
    pub id: Uuid,

    /// Embedding of the stored text
    pub vector: Vec<f32>,

    /// The remembered text
    pub text: String,

    /// Conversation this entry belongs to
    pub subject: String,

    /// Whose utterance it was
    pub kind: MemoryKind,
}

impl MemoryEntry {
    /// Create a new entry with a fresh ID
    pub fn new(
        vector: Vec<f32>,
        text: impl Into<String>,
        subject: impl Into<String>,
        kind: MemoryKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            text: text.into(),
            subject: subject.into(),
            kind,
        }
    }

    /// Namespace this entry lives in
    pub fn namespace(&self) -> String {
        namespace(&self.subject, self.kind)
    }
}

/// Long-term semantic memory: an embedder plus a namespaced vector index
pub struct MemoryStore {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl MemoryStore {
    /// Create a new memory store
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Get the embedder
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Get the vector index
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Embed `text` and persist it under the (subject, kind) namespace.
    /// Returns the ID of the stored entry. Embedding and persistence
    /// failures both propagate to the caller.
    pub async fn remember(&self, text: &str, subject: &str, kind: MemoryKind) -> Result<Uuid> {
        let vector = self.embedder.embed(text).await?;
        let entry = MemoryEntry::new(vector, text, subject, kind);
        let id = entry.id;

        debug!(%id, subject = %entry.subject, kind = %entry.kind, "Storing memory");
        self.index.upsert(&entry).await?;

        Ok(id)
    }

    /// Return up to `limit` stored texts most similar to `query_text`,
    /// most similar first, scoped to the (subject, kind) namespace.
    ///
    /// A namespace that has never been written to yields an empty list, not
    /// an error. Hits whose stored text is missing are dropped. Reads see
    /// committed index state only: an entry queued with the background
    /// writer becomes visible once its write has been persisted.
    pub async fn recall(
        &self,
        query_text: &str,
        subject: &str,
        kind: MemoryKind,
        limit: usize,
    ) -> Result<Vec<String>> {
        let vector = self.embedder.embed(query_text).await?;
        let ns = namespace(subject, kind);

        let hits = self.index.query(&ns, &vector, limit).await?;
        let texts: Vec<String> = hits.into_iter().filter_map(|hit| hit.text).collect();

        debug!(namespace = %ns, returned = texts.len(), "Recalled memories");
        Ok(texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_joins_subject_and_kind() {
        assert_eq!(namespace("alice", MemoryKind::User), "alice_user");
        assert_eq!(namespace("alice", MemoryKind::Agent), "alice_agent");
        assert_eq!(namespace("bob", MemoryKind::User), "bob_user");
    }

    #[test]
    fn kind_displays_lowercase() {
        assert_eq!(MemoryKind::User.to_string(), "user");
        assert_eq!(MemoryKind::Agent.to_string(), "agent");
    }

    #[test]
    fn entry_derives_its_namespace() {
        let entry = MemoryEntry::new(vec![0.0; 4], "hello", "carol", MemoryKind::Agent);
        assert_eq!(entry.namespace(), "carol_agent");
    }
}
