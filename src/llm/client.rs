//! Ollama chat client.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Failures of a single text-generation call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Cannot connect to Ollama at {0}")]
    Connect(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Ollama API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse Ollama response: {0}")]
    Decode(String),

    #[error("Failed to send request: {0}")]
    Transport(String),
}

/// Something that turns a prompt pair into Markdown text.
pub trait TextGenerator {
    /// Generate a completion for one report section.
    ///
    /// `images` are base64-encoded PNGs attached to the user prompt.
    fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        images: &[String],
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Model identifier, shown in the report metadata.
    fn model_name(&self) -> &str;
}

/// Connection settings for the Ollama client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub ollama_url: String,
    pub model_name: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            ollama_url: "http://localhost:11434".to_string(),
            model_name: "llama3.2:latest".to_string(),
            temperature: 0.2,
            timeout_seconds: 600,
        }
    }
}

impl From<&crate::config::ModelConfig> for LlmConfig {
    fn from(model: &crate::config::ModelConfig) -> Self {
        Self {
            ollama_url: model.ollama_url.clone(),
            model_name: model.name.clone(),
            temperature: model.temperature,
            timeout_seconds: model.timeout_seconds,
        }
    }
}

/// Message in the chat history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
    /// Base64-encoded images, for vision models.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            images: Vec::new(),
        }
    }
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Non-streaming client for Ollama's `/api/chat`.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: LlmConfig,
    http_client: reqwest::Client,
}

impl OllamaClient {
    /// Build a client; fails only if the HTTP stack cannot be initialized.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        info!(
            "Initializing Ollama client with model {} at {}",
            config.model_name, config.ollama_url
        );

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.ollama_url.trim_end_matches('/'))
    }

    fn build_request<'a>(
        &'a self,
        system_prompt: &str,
        user_prompt: &str,
        images: &[String],
    ) -> OllamaChatRequest<'a> {
        let mut user = ChatMessage::new("user", user_prompt);
        user.images = images.to_vec();

        OllamaChatRequest {
            model: &self.config.model_name,
            messages: vec![ChatMessage::new("system", system_prompt), user],
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        }
    }
}

impl TextGenerator for OllamaClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        images: &[String],
    ) -> Result<String, LlmError> {
        let url = self.chat_url();
        let request = self.build_request(system_prompt, user_prompt, images);
        debug!(
            "POST {} ({} prompt chars, {} images)",
            url,
            user_prompt.len(),
            images.len()
        );

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.config.timeout_seconds)
                } else if e.is_connect() {
                    LlmError::Connect(self.config.ollama_url.clone())
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let chat_response: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;

        Ok(chat_response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}
