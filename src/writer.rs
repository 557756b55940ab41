//! Supervised background writer for long-term memory

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

use crate::memory::{MemoryKind, MemoryStore};

/// Counters published by the background writer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    /// Jobs accepted into the queue
    pub enqueued: u64,

    /// Jobs persisted successfully
    pub completed: u64,

    /// Jobs whose write failed
    pub failed: u64,

    /// Jobs dropped because the queue was full
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

struct WriteJob {
    text: String,
    subject: String,
    kind: MemoryKind,
}

/// Owns a bounded queue of pending `remember` calls and the single worker
/// task that drains it.
///
/// Jobs survive caller cancellation: once accepted they belong to the worker,
/// not to any request, so an abandoned HTTP request cannot abort a write
/// already queued. A full queue sheds the newest job instead of blocking the
/// caller. Dropping the writer lets the worker drain what was accepted and
/// then stop.
pub struct MemoryWriter {
    tx: mpsc::Sender<WriteJob>,
    counters: Arc<Counters>,
    processed_rx: watch::Receiver<u64>,
}

impl MemoryWriter {
    /// Spawn the worker task and return its handle
    pub fn spawn(store: Arc<MemoryStore>, queue_depth: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<WriteJob>(queue_depth);
        let (processed_tx, processed_rx) = watch::channel(0u64);
        let counters = Arc::new(Counters::default());

        let worker_counters = counters.clone();
        tokio::spawn(async move {
            let mut processed = 0u64;
            while let Some(job) = rx.recv().await {
                match store.remember(&job.text, &job.subject, job.kind).await {
                    Ok(id) => {
                        worker_counters.completed.fetch_add(1, Ordering::Relaxed);
                        debug!(%id, subject = %job.subject, kind = %job.kind, "Background write committed");
                    }
                    Err(e) => {
                        worker_counters.failed.fetch_add(1, Ordering::Relaxed);
                        error!(subject = %job.subject, kind = %job.kind, error = %e, "Background write failed");
                    }
                }
                processed += 1;
                let _ = processed_tx.send(processed);
            }
            debug!(processed, "Memory writer drained and stopped");
        });

        Self {
            tx,
            counters,
            processed_rx,
        }
    }

    /// Queue one write without blocking.
    ///
    /// A full queue drops the job: the loss is counted and logged, never
    /// propagated to the caller.
    pub fn enqueue(&self, text: impl Into<String>, subject: impl Into<String>, kind: MemoryKind) {
        let job = WriteJob {
            text: text.into(),
            subject: subject.into(),
            kind,
        };

        match self.tx.try_send(job) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(subject = %job.subject, kind = %job.kind, "Write queue full, dropping job");
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                error!(subject = %job.subject, kind = %job.kind, "Writer worker gone, dropping job");
            }
        }
    }

    /// Current counters. `completed + failed` catches up to `enqueued` once
    /// the queue drains.
    pub fn stats(&self) -> WriterStats {
        WriterStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            completed: self.counters.completed.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }

    /// Wait until the worker has finished at least `count` jobs, counting
    /// completions and failures both. The request path never calls this;
    /// shutdown hooks and tests that need to observe durability do.
    pub async fn wait_for_processed(&self, count: u64) {
        let mut rx = self.processed_rx.clone();
        while *rx.borrow() < count {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
