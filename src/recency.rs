//! Short-term recency buffers holding the latest exchanges

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// One completed user/agent exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// What the user sent
    pub user_text: String,

    /// What the agent replied
    pub agent_text: String,
}

impl Exchange {
    /// Create a new exchange
    pub fn new(user_text: impl Into<String>, agent_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            agent_text: agent_text.into(),
        }
    }
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "User: {}\nAgent: {}", self.user_text, self.agent_text)
    }
}

/// How recency buffers are scoped across subjects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecencyScope {
    /// One buffer per subject; exchanges never leak across conversations
    PerSubject,

    /// One process-wide buffer blending every conversation's exchanges
    Shared,
}

/// Fixed-capacity FIFO of the most recent exchanges.
///
/// `append` and `snapshot` are individually atomic. A snapshot is an owned
/// copy that later appends cannot touch. Entries are never mutated in place
/// and only leave through oldest-first eviction at capacity.
pub struct RecencyBuffer {
    capacity: usize,
    entries: RwLock<VecDeque<Exchange>>,
}

impl RecencyBuffer {
    /// Create an empty buffer holding at most `capacity` exchanges
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Insert at the tail, evicting from the head once past capacity. O(1).
    pub async fn append(&self, exchange: Exchange) {
        let mut entries = self.entries.write().await;
        entries.push_back(exchange);
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Owned oldest-first copy of the current contents
    pub async fn snapshot(&self) -> Vec<Exchange> {
        self.entries.read().await.iter().cloned().collect()
    }

    /// Number of exchanges currently held
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the buffer holds no exchanges
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Maximum number of exchanges this buffer holds
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Routes appends and snapshots to the buffer for a subject.
///
/// With [`RecencyScope::Shared`] every subject maps to one process-wide
/// buffer: concurrent requests interleave appends in arrival order and a
/// snapshot reflects whatever has been appended when it is taken, so one
/// conversation's exchanges can surface in another's context.
pub struct RecencyLog {
    capacity: usize,
    scope: RecencyScope,
    shared: Arc<RecencyBuffer>,
    per_subject: RwLock<HashMap<String, Arc<RecencyBuffer>>>,
}

impl RecencyLog {
    /// Create a new log
    pub fn new(capacity: usize, scope: RecencyScope) -> Self {
        Self {
            capacity,
            scope,
            shared: Arc::new(RecencyBuffer::new(capacity)),
            per_subject: RwLock::new(HashMap::new()),
        }
    }

    /// How this log is scoped
    pub fn scope(&self) -> RecencyScope {
        self.scope
    }

    async fn buffer(&self, subject: &str) -> Arc<RecencyBuffer> {
        match self.scope {
            RecencyScope::Shared => self.shared.clone(),
            RecencyScope::PerSubject => {
                if let Some(buffer) = self.per_subject.read().await.get(subject) {
                    return buffer.clone();
                }
                let mut buffers = self.per_subject.write().await;
                buffers
                    .entry(subject.to_string())
                    .or_insert_with(|| Arc::new(RecencyBuffer::new(self.capacity)))
                    .clone()
            }
        }
    }

    /// Record a completed exchange for `subject`
    pub async fn append(&self, subject: &str, exchange: Exchange) {
        self.buffer(subject).await.append(exchange).await;
    }

    /// Oldest-first copy of the exchanges visible to `subject`
    pub async fn snapshot(&self, subject: &str) -> Vec<Exchange> {
        self.buffer(subject).await.snapshot().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(n: usize) -> Exchange {
        Exchange::new(format!("message {}", n), format!("reply {}", n))
    }

    #[test]
    fn append_evicts_oldest_past_capacity() {
        tokio_test::block_on(async {
            let buffer = RecencyBuffer::new(3);
            for n in 1..=4 {
                buffer.append(exchange(n)).await;
            }

            let snapshot = buffer.snapshot().await;
            assert_eq!(snapshot.len(), 3);
            assert_eq!(snapshot[0], exchange(2));
            assert_eq!(snapshot[2], exchange(4));
        });
    }

    #[test]
    fn seven_appends_at_capacity_five_keep_the_last_five() {
        tokio_test::block_on(async {
            let buffer = RecencyBuffer::new(5);
            for n in 1..=7 {
                buffer.append(exchange(n)).await;
            }

            let snapshot = buffer.snapshot().await;
            let expected: Vec<Exchange> = (3..=7).map(exchange).collect();
            assert_eq!(snapshot, expected);
        });
    }

    #[test]
    fn snapshot_is_isolated_from_later_appends() {
        tokio_test::block_on(async {
            let buffer = RecencyBuffer::new(5);
            buffer.append(exchange(1)).await;

            let snapshot = buffer.snapshot().await;
            buffer.append(exchange(2)).await;

            assert_eq!(snapshot.len(), 1);
            assert_eq!(buffer.len().await, 2);
        });
    }

    #[test]
    fn exchange_displays_both_sides() {
        let ex = Exchange::new("hi", "hello there");
        assert_eq!(ex.to_string(), "User: hi\nAgent: hello there");
    }

    #[test]
    fn per_subject_log_keeps_subjects_apart() {
        tokio_test::block_on(async {
            let log = RecencyLog::new(5, RecencyScope::PerSubject);
            log.append("alice", exchange(1)).await;
            log.append("bob", exchange(2)).await;

            let alice = log.snapshot("alice").await;
            let bob = log.snapshot("bob").await;
            assert_eq!(alice, vec![exchange(1)]);
            assert_eq!(bob, vec![exchange(2)]);
        });
    }

    #[test]
    fn shared_log_blends_subjects() {
        tokio_test::block_on(async {
            let log = RecencyLog::new(5, RecencyScope::Shared);
            log.append("alice", exchange(1)).await;
            log.append("bob", exchange(2)).await;

            let alice = log.snapshot("alice").await;
            assert_eq!(alice, vec![exchange(1), exchange(2)]);
        });
    }

    #[test]
    fn snapshot_of_untouched_subject_is_empty() {
        tokio_test::block_on(async {
            let log = RecencyLog::new(5, RecencyScope::PerSubject);
            assert!(log.snapshot("nobody").await.is_empty());
        });
    }
}
