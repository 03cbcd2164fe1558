pub mod gemini;
pub mod openai;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::db::models::MessageRole;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
}

/// One generation call: system instructions, prior turns, and the new prompt.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub system: String,
    pub history: Vec<ChatMessage>,
    pub prompt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerateResponse {
    pub text: String,
    pub model: String,
}

/// Generation backend. Gemini is the default; any OpenAI-compatible endpoint works as well.
#[derive(Debug, Clone)]
pub enum Provider {
    Gemini(gemini::GeminiConfig),
    OpenAi(openai::OpenAiConfig),
}

impl Provider {
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini(_) => "gemini",
            Provider::OpenAi(_) => "openai",
        }
    }

    pub async fn generate(
        &self,
        client: &Client,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, LlmError> {
        match self {
            Provider::Gemini(config) => gemini::generate(client, config, request).await,
            Provider::OpenAi(config) => openai::generate(client, config, request).await,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("API key rejected: {0}")]
    Auth(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl LlmError {
    /// Classify a non-success response. Key problems are reported separately
    /// so callers can surface them instead of falling back.
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        if status == 401 || status == 403 || message.contains("API_KEY") {
            LlmError::Auth(message)
        } else {
            LlmError::Api { status, message }
        }
    }
}
