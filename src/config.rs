//! Server configuration. Read from the process environment (and `.env`).

use crate::embedding::VoyageClient;
use crate::llm::gemini::GeminiConfig;
use crate::llm::openai::OpenAiConfig;
use crate::llm::Provider;
use serde::Deserialize;

/// Upper bound for `JWT_EXPIRES_DAYS`.
pub const MAX_JWT_EXPIRES_DAYS: i64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    #[default]
    Gemini,
    OpenAi,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_expires_days")]
    pub jwt_expires_days: i64,

    /// Allowed CORS origin.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    // ── Embeddings (Voyage AI) ──
    #[serde(default)]
    pub voyage_api_key: Option<String>,
    #[serde(default = "default_voyage_base_url")]
    pub voyage_base_url: String,
    #[serde(default = "default_voyage_model")]
    pub voyage_model: String,

    // ── Generation ──
    #[serde(default)]
    pub generation_provider: GenerationProvider,
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    // ── Knowledge base ──
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_rag_top_k")]
    pub rag_top_k: usize,

    // ── Accounts ──
    /// When false, signup ignores a requested `admin`/`staff` role.
    #[serde(default)]
    pub allow_privileged_signup: bool,
    #[serde(default)]
    pub admin_name: Option<String>,
    #[serde(default)]
    pub admin_email: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_database_path() -> String {
    "campus-safety.db".to_string()
}
fn default_jwt_expires_days() -> i64 {
    7
}
fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_voyage_base_url() -> String {
    "https://api.voyageai.com".to_string()
}
fn default_voyage_model() -> String {
    "voyage-2".to_string()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_gemini_model() -> String {
    "gemini-pro".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_rag_top_k() -> usize {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database_path: default_database_path(),
            jwt_secret: String::new(),
            jwt_expires_days: default_jwt_expires_days(),
            frontend_url: default_frontend_url(),
            voyage_api_key: None,
            voyage_base_url: default_voyage_base_url(),
            voyage_model: default_voyage_model(),
            generation_provider: GenerationProvider::default(),
            gemini_api_key: None,
            gemini_base_url: default_gemini_base_url(),
            gemini_model: default_gemini_model(),
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            openai_model: default_openai_model(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            rag_top_k: default_rag_top_k(),
            allow_privileged_signup: false,
            admin_name: None,
            admin_email: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let cfg: Self = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "JWT_SECRET must be set".to_string(),
            ));
        }
        if !(1..=MAX_JWT_EXPIRES_DAYS).contains(&self.jwt_expires_days) {
            return Err(config::ConfigError::Message(format!(
                "JWT_EXPIRES_DAYS ({}) must be between 1 and {MAX_JWT_EXPIRES_DAYS}",
                self.jwt_expires_days
            )));
        }
        if self.chunk_size == 0 || self.chunk_overlap >= self.chunk_size {
            return Err(config::ConfigError::Message(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.rag_top_k == 0 {
            return Err(config::ConfigError::Message(
                "RAG_TOP_K must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn embedding_configured(&self) -> bool {
        non_empty(&self.voyage_api_key).is_some()
    }

    pub fn generation_configured(&self) -> bool {
        self.provider().is_some()
    }

    /// Voyage client, if an API key is configured.
    pub fn voyage(&self) -> Option<VoyageClient> {
        non_empty(&self.voyage_api_key).map(|api_key| VoyageClient {
            api_key,
            base_url: self.voyage_base_url.trim_end_matches('/').to_string(),
            model: self.voyage_model.clone(),
        })
    }

    /// Generation provider for the configured backend, if its API key is set.
    pub fn provider(&self) -> Option<Provider> {
        match self.generation_provider {
            GenerationProvider::Gemini => {
                non_empty(&self.gemini_api_key).map(|api_key| {
                    Provider::Gemini(GeminiConfig {
                        api_key,
                        base_url: self.gemini_base_url.trim_end_matches('/').to_string(),
                        model: self.gemini_model.clone(),
                    })
                })
            }
            GenerationProvider::OpenAi => {
                non_empty(&self.openai_api_key).map(|api_key| {
                    Provider::OpenAi(OpenAiConfig {
                        api_key,
                        base_url: self.openai_base_url.trim_end_matches('/').to_string(),
                        model: self.openai_model.clone(),
                    })
                })
            }
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
