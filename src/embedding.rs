use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Max texts per embeddings request.
pub const EMBED_BATCH_SIZE: usize = 64;

#[derive(Debug, Clone)]
pub struct VoyageClient {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

/// Voyage distinguishes stored passages from search queries.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    Document,
    Query,
}

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Embedding API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Embedding API returned {got} vectors for {expected} inputs")]
    CountMismatch { expected: usize, got: usize },
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    input_type: InputType,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

impl VoyageClient {
    /// Embed a list of texts, batching requests. Output order matches `texts`.
    pub async fn embed(
        &self,
        client: &Client,
        texts: &[String],
        input_type: InputType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            out.extend(self.embed_batch(client, batch, input_type).await?);
        }
        Ok(out)
    }

    async fn embed_batch(
        &self,
        client: &Client,
        texts: &[String],
        input_type: InputType,
    ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            input_type,
        };

        let resp = client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api { status, message });
        }

        let mut data: EmbeddingResponse = resp.json().await?;
        if data.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                got: data.data.len(),
            });
        }
        data.data.sort_by_key(|d| d.index);
        Ok(data.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Null-fallback embedding: any failure (or no client) yields `None`.
pub async fn embed_or_none(
    voyage: Option<&VoyageClient>,
    client: &Client,
    texts: &[String],
    input_type: InputType,
) -> Option<Vec<Vec<f32>>> {
    let voyage = voyage?;
    match voyage.embed(client, texts, input_type).await {
        Ok(embeddings) => Some(embeddings),
        Err(e) => {
            tracing::warn!(error = %e, count = texts.len(), "embedding generation failed, continuing without vectors");
            None
        }
    }
}

/// Cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Rank `(id, embedding)` pairs against a query vector, best first.
pub fn search_similar<'a>(
    query_embedding: &[f32],
    candidates: impl IntoIterator<Item = (&'a str, &'a [f32])>,
    top_k: usize,
) -> Vec<(&'a str, f32)> {
    let mut scored: Vec<(&str, f32)> = candidates
        .into_iter()
        .map(|(id, emb)| (id, cosine_similarity(query_embedding, emb)))
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}

/// Serialize embedding to bytes for SQLite BLOB storage
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize embedding from SQLite BLOB bytes
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
