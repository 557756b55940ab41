//! Language generation via an OpenAI-compatible chat completions API

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly conversational companion. \
Keep replies short and natural, one to three sentences. The user message includes \
remembered context and recent exchanges; stay consistent with them, and when an \
older memory conflicts with a recent exchange, the recent exchange wins.";

/// Settings for the generation client
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    /// Base URL of the API, without the `/v1/chat/completions` suffix
    pub base_url: String,

    /// Model to request
    pub model: String,

    /// Bearer token, if the endpoint needs one
    pub api_key: Option<String>,

    /// System prompt prepended to every request, if any
    pub system_prompt: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens in the reply
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
            api_key: None,
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: 0.7,
            max_tokens: 256,
        }
    }
}

impl GenerationSettings {
    /// Build settings from `OPENAI_API_KEY`, `OPENAI_BASE_URL`, and
    /// `OPENAI_MODEL`, falling back to defaults for anything unset
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            settings.api_key = Some(key);
        }
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            settings.base_url = base_url;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            settings.model = model;
        }
        settings
    }
}

/// Turns an assembled context blob into a reply.
///
/// Opaque to the rest of the subsystem: text in, text out, may fail.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a reply for the given context
    async fn generate(&self, context: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Generator backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiGenerator {
    settings: GenerationSettings,
    http: reqwest::Client,
}

impl OpenAiGenerator {
    /// Create a new generator
    pub fn new(settings: GenerationSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    fn build_request(&self, context: &str) -> ChatCompletionRequest {
        let mut messages = Vec::new();
        if let Some(system_prompt) = &self.settings.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system_prompt.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: context.to_string(),
        });

        ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        }
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, context: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.settings.base_url);
        let body = self.build_request(context);

        let mut request = self.http.post(&url).json(&body);
        if let Some(api_key) = &self.settings.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::generation(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(format!("API error {}: {}", status, body)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::generation(format!("Failed to parse response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::generation("No choices in response"))
    }
}
