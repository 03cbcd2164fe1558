use super::{GenerateRequest, GenerateResponse, LlmError};
use crate::db::models::MessageRole;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<OpenAiMessage>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

fn message(role: &str, content: &str) -> OpenAiMessage {
    OpenAiMessage {
        role: role.to_string(),
        content: Some(content.to_string()),
    }
}

fn build_messages(request: &GenerateRequest) -> Vec<OpenAiMessage> {
    let mut messages = vec![message("system", &request.system)];
    messages.extend(request.history.iter().map(|m| {
        let role = match m.role {
            MessageRole::User => "user",
            MessageRole::Model => "assistant",
        };
        message(role, &m.text)
    }));
    messages.push(message("user", &request.prompt));
    messages
}

pub async fn generate(
    client: &Client,
    config: &OpenAiConfig,
    request: &GenerateRequest,
) -> Result<GenerateResponse, LlmError> {
    let body = OpenAiRequest {
        model: &config.model,
        messages: build_messages(request),
        stream: false,
    };

    let mut req = client
        .post(format!("{}/chat/completions", config.base_url))
        .header("Content-Type", "application/json")
        .json(&body);

    if !config.api_key.is_empty() {
        req = req.header("Authorization", format!("Bearer {}", config.api_key));
    }

    let resp = req.send().await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(LlmError::from_status(status, text));
    }

    let data: OpenAiResponse = resp.json().await?;
    let text = data
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| LlmError::Parse("completion contained no message".into()))?;

    Ok(GenerateResponse {
        text,
        model: config.model.clone(),
    })
}
