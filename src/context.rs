//! Context assembly for the generation call

use crate::recency::Exchange;

/// Assemble the single context blob handed to the generator.
///
/// Pure function of its inputs: same memories, exchanges, and message always
/// yield the same string, byte for byte. Memory texts are inserted verbatim
/// in the order given, so recall order (most similar first) is preserved.
/// Empty memory lists render fixed placeholder sentences rather than being
/// skipped, and exchanges are numbered from 1 oldest-first.
pub fn assemble(
    user_memories: &[String],
    agent_memories: &[String],
    recent: &[Exchange],
    message: &str,
) -> String {
    let user_section = if user_memories.is_empty() {
        "No relevant user memories found.".to_string()
    } else {
        format!("Relevant user memories: {}", user_memories.join("; "))
    };

    let agent_section = if agent_memories.is_empty() {
        "No relevant agent memories found.".to_string()
    } else {
        format!("Relevant agent memories: {}", agent_memories.join("; "))
    };

    let numbered: Vec<String> = recent
        .iter()
        .enumerate()
        .map(|(i, exchange)| format!("Exchange {}: {}", i + 1, exchange))
        .collect();
    let recent_section = format!("Recent exchanges:\n{}", numbered.join("\n"));

    let message_section = format!("User message: {}", message);

    [user_section, agent_section, recent_section, message_section].join("\n\n")
}
