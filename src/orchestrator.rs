//! Per-message conversation flow

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::Config;
use crate::context::assemble;
use crate::embedding::TokenCounter;
use crate::error::Result;
use crate::generation::Generator;
use crate::memory::{MemoryKind, MemoryStore};
use crate::recency::{Exchange, RecencyLog};
use crate::storage::TranscriptStore;
use crate::writer::MemoryWriter;

/// Drives one message through retrieval, generation, and recording.
///
/// Safe to share across concurrent requests; each call runs independently
/// and appends from simultaneous calls interleave in arrival order.
pub struct Orchestrator {
    store: Arc<MemoryStore>,
    generator: Arc<dyn Generator>,
    recency: RecencyLog,
    transcript: Arc<TranscriptStore>,
    writer: MemoryWriter,
    token_counter: TokenCounter,
    recall_limit: usize,
    context_token_warning: u32,
}

impl Orchestrator {
    /// Create a new orchestrator. Validates the config and spawns the
    /// background writer.
    pub fn new(
        config: &Config,
        store: Arc<MemoryStore>,
        generator: Arc<dyn Generator>,
        transcript: Arc<TranscriptStore>,
    ) -> Result<Self> {
        config.validate()?;

        let recency = RecencyLog::new(config.recency_capacity, config.recency_scope);
        let writer = MemoryWriter::spawn(store.clone(), config.write_queue_depth);
        let token_counter = TokenCounter::for_gpt()?;

        Ok(Self {
            store,
            generator,
            recency,
            transcript,
            writer,
            token_counter,
            recall_limit: config.recall_limit,
            context_token_warning: config.context_token_warning,
        })
    }

    /// Get the memory store
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Get the recency log
    pub fn recency(&self) -> &RecencyLog {
        &self.recency
    }

    /// Get the background writer
    pub fn writer(&self) -> &MemoryWriter {
        &self.writer
    }

    /// Answer one message for `subject`.
    ///
    /// Recalls user and agent memories concurrently, snapshots the recency
    /// buffer, assembles one context blob, and asks the generator for a
    /// reply. Retrieval and generation failures abort the request before
    /// anything is recorded. Once a reply exists, the exchange is appended
    /// to the recency buffer and both long-term writes are queued before
    /// returning; a transcript failure is logged and the reply still
    /// returned.
    pub async fn handle_message(&self, subject: &str, message: &str) -> Result<String> {
        // Retrieve: both memory kinds concurrently, then the recency snapshot
        let (user_memories, agent_memories) = tokio::try_join!(
            self.store
                .recall(message, subject, MemoryKind::User, self.recall_limit),
            self.store
                .recall(message, subject, MemoryKind::Agent, self.recall_limit),
        )?;
        let recent = self.recency.snapshot(subject).await;

        debug!(
            subject,
            user_memories = user_memories.len(),
            agent_memories = agent_memories.len(),
            recent = recent.len(),
            "Retrieved context"
        );

        // Generate: a failure here leaves buffer, index, and transcript untouched
        let context = assemble(&user_memories, &agent_memories, &recent, message);
        let context_tokens = self.token_counter.count(&context);
        if context_tokens > self.context_token_warning {
            warn!(subject, context_tokens, "Assembled context unusually large");
        }

        let reply = self.generator.generate(&context).await?;

        // Record: the recency append lands before the reply returns; the
        // long-term writes are queued, not awaited
        self.recency
            .append(subject, Exchange::new(message, reply.clone()))
            .await;

        self.writer
            .enqueue(format!("User said: {}", message), subject, MemoryKind::User);
        self.writer
            .enqueue(format!("Agent replied: {}", reply), subject, MemoryKind::Agent);

        if let Err(e) = self.transcript.append(subject, message, &reply) {
            warn!(subject, error = %e, "Transcript write failed");
        }

        Ok(reply)
    }
}
