use super::{GenerateRequest, GenerateResponse, LlmError};
use crate::db::models::MessageRole;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

fn text_content(role: Option<&str>, text: &str) -> GeminiContent {
    GeminiContent {
        role: role.map(str::to_string),
        parts: vec![GeminiPart {
            text: text.to_string(),
        }],
    }
}

fn build_body(request: &GenerateRequest) -> GeminiRequest {
    let mut contents: Vec<GeminiContent> = request
        .history
        .iter()
        .map(|m| {
            let role = match m.role {
                MessageRole::User => "user",
                MessageRole::Model => "model",
            };
            text_content(Some(role), &m.text)
        })
        .collect();
    contents.push(text_content(Some("user"), &request.prompt));

    GeminiRequest {
        system_instruction: text_content(None, &request.system),
        contents,
    }
}

pub async fn generate(
    client: &Client,
    config: &GeminiConfig,
    request: &GenerateRequest,
) -> Result<GenerateResponse, LlmError> {
    let resp = client
        .post(format!(
            "{}/v1beta/models/{}:generateContent",
            config.base_url, config.model
        ))
        .header("Content-Type", "application/json")
        .header("x-goog-api-key", &config.api_key)
        .json(&build_body(request))
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        return Err(LlmError::from_status(status, text));
    }

    let data: GeminiResponse = resp.json().await?;
    let text: String = data
        .candidates
        .first()
        .map(|c| c.content.parts.iter().map(|p| p.text.as_str()).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::Parse("Gemini returned no text".into()));
    }

    Ok(GenerateResponse {
        text,
        model: config.model.clone(),
    })
}
