//! Retrieval-augmented answering: retrieve knowledge-base chunks, assemble the
//! prompt, generate, and turn a finalized incident tag into a stored report.

use crate::auth::AuthUser;
use crate::db::models::{
    Category, Conversation, Priority, Report, ReportDraft, ReportKind,
    SearchableChunk,
};
use crate::db::Database;
use crate::embedding::{embed_or_none, search_similar, InputType};
use crate::error::{AppError, AppResult};
use crate::llm::{ChatMessage, GenerateRequest, LlmError};
use crate::AppState;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant for the ASTU (Adama Science and Technology University) Smart Campus Safety Platform. Your role is to:

1. Provide accurate information about campus safety procedures, emergency protocols, and resources
2. Answer student questions about campus security, health services, and emergency contacts
3. Offer guidance on reporting incidents and accessing safety resources
4. Be concise, clear, and supportive in your responses
5. If you don't know something, admit it and suggest contacting campus security or administration

When a student wants to report an incident or a maintenance problem, ask for the type (Security or Maintenance), category, location, a short description and the priority (Low, Medium, High or Critical). Once you have all of them, end your reply with exactly one line of the form:
[REPORT_FINALIZED: type|category|location|description|priority]

Always prioritize student safety and well-being in your responses.";

pub const FALLBACK_ANSWER: &str = "I apologize, but I'm having trouble generating a response right now. Please try again later or contact campus security directly for urgent matters.";

pub const REPORT_REGISTERED_NOTICE: &str =
    "\n\n**STATUS: Your case has been securely registered with the campus administration.**";

pub const MIN_QUESTION_CHARS: usize = 3;
pub const MAX_QUESTION_CHARS: usize = 1000;
/// Prior turns sent along with a question.
pub const HISTORY_TURNS: usize = 10;
/// Characters of each retrieved chunk placed in the prompt.
pub const CONTEXT_CHARS: usize = 500;

const REPORT_TAG_OPEN: &str = "[REPORT_FINALIZED:";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub title: String,
    pub category: Category,
    pub content: String,
    pub score: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default, alias = "conversation_id")]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub score: f32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskOutcome {
    pub question: String,
    pub answer: String,
    pub sources: Vec<Source>,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,
    pub timestamp: String,
}

fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Keyword relevance of a chunk: title hits weigh 3, tag hits 2, content hits 1.
pub fn keyword_score(terms: &[String], chunk: &SearchableChunk) -> f32 {
    let title = chunk.title.to_lowercase();
    let content = chunk.content.to_lowercase();
    let tags: Vec<String> = chunk.tags.iter().map(|t| t.to_lowercase()).collect();
    terms
        .iter()
        .map(|term| {
            let mut score = 0.0;
            if title.contains(term.as_str()) {
                score += 3.0;
            }
            if tags.iter().any(|t| t.contains(term.as_str())) {
                score += 2.0;
            }
            if content.contains(term.as_str()) {
                score += 1.0;
            }
            score
        })
        .sum()
}

/// Keep the best chunk per document, up to `top_k`, highest score first.
fn best_per_document(
    scored: Vec<(f32, &SearchableChunk)>,
    top_k: usize,
) -> Vec<RetrievedChunk> {
    let mut scored = scored;
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    let mut seen = HashSet::new();
    scored
        .into_iter()
        .filter(|(_, c)| seen.insert(c.document_id.clone()))
        .take(top_k)
        .map(|(score, c)| RetrievedChunk {
            chunk_id: c.id.clone(),
            document_id: c.document_id.clone(),
            title: c.title.clone(),
            category: c.category,
            content: c.content.clone(),
            score,
        })
        .collect()
}

/// Rank chunks by cosine similarity to `query_embedding`. Chunks without
/// vectors, and non-positive similarities, are skipped.
pub fn rank_by_embedding(
    query_embedding: &[f32],
    chunks: &[SearchableChunk],
    top_k: usize,
) -> Vec<RetrievedChunk> {
    let by_id: HashMap<&str, &SearchableChunk> =
        chunks.iter().map(|c| (c.id.as_str(), c)).collect();
    let candidates = chunks
        .iter()
        .filter_map(|c| c.embedding.as_deref().map(|e| (c.id.as_str(), e)));
    let scored = search_similar(query_embedding, candidates, chunks.len())
        .into_iter()
        .filter(|(_, score)| *score > 0.0)
        .filter_map(|(id, score)| by_id.get(id).map(|c| (score, *c)))
        .collect();
    best_per_document(scored, top_k)
}

pub fn rank_by_keywords(query: &str, chunks: &[SearchableChunk], top_k: usize) -> Vec<RetrievedChunk> {
    let terms = query_terms(query);
    if terms.is_empty() {
        return vec![];
    }
    let scored = chunks
        .iter()
        .map(|c| (keyword_score(&terms, c), c))
        .filter(|(score, _)| *score > 0.0)
        .collect();
    best_per_document(scored, top_k)
}

/// Find the chunks most relevant to `question`. Falls back to keyword scoring
/// when no query embedding is available or nothing in the store is embedded.
pub async fn retrieve(state: &AppState, question: &str, top_k: usize) -> AppResult<Vec<RetrievedChunk>> {
    let chunks = state.db.load_public_chunks()?;
    if chunks.is_empty() {
        return Ok(vec![]);
    }

    if chunks.iter().any(|c| c.embedding.is_some()) {
        let voyage = state.config.voyage();
        let query = [question.to_string()];
        if let Some(mut vectors) =
            embed_or_none(voyage.as_ref(), &state.http, &query, InputType::Query).await
        {
            if let Some(query_embedding) = vectors.pop() {
                let hits = rank_by_embedding(&query_embedding, &chunks, top_k);
                tracing::debug!(hits = hits.len(), "vector retrieval");
                if !hits.is_empty() {
                    return Ok(hits);
                }
            }
        }
    }

    let hits = rank_by_keywords(question, &chunks, top_k);
    tracing::debug!(hits = hits.len(), "keyword retrieval");
    Ok(hits)
}

pub fn build_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return String::new();
    }
    let mut context = String::from("\n\nRelevant Information from Campus Safety Documents:\n");
    for (i, chunk) in chunks.iter().enumerate() {
        let excerpt: String = chunk.content.chars().take(CONTEXT_CHARS).collect();
        context.push_str(&format!("\n{}. {}\n{}...\n", i + 1, chunk.title, excerpt));
    }
    context
}

pub fn build_prompt(question: &str, context: &str) -> String {
    format!("{context}\n\nStudent Question: {question}\n\nAssistant Response:")
}

/// Extract a `[REPORT_FINALIZED: type|category|location|description|priority]`
/// tag. Returns the draft and the text with the tag replaced by a notice.
pub fn parse_report_tag(text: &str) -> Option<(ReportDraft, String)> {
    let start = text.find(REPORT_TAG_OPEN)?;
    let end = start + text[start..].find(']')?;
    let inner = text[start + REPORT_TAG_OPEN.len()..end].trim();

    let parts: Vec<&str> = inner.split('|').map(str::trim).collect();
    let part = |i: usize, default: &str| -> String {
        parts
            .get(i)
            .filter(|p| !p.is_empty())
            .map(|p| p.to_string())
            .unwrap_or_else(|| default.to_string())
    };

    let kind = if parts.first().is_some_and(|p| p.contains("Maintenance")) {
        ReportKind::Maintenance
    } else {
        ReportKind::Security
    };
    let draft = ReportDraft {
        kind,
        category: part(1, "General"),
        location: part(2, "Unknown"),
        description: part(3, "N/A"),
        priority: part(4, "Medium").parse().unwrap_or(Priority::Medium),
    };

    let mut cleaned = String::with_capacity(text.len());
    cleaned.push_str(&text[..start]);
    cleaned.push_str(REPORT_REGISTERED_NOTICE);
    cleaned.push_str(&text[end + 1..]);
    Some((draft, cleaned))
}

pub fn validate_question(question: &str) -> AppResult<String> {
    let question = question.trim();
    if question.is_empty() {
        return Err(AppError::BadRequest("Please provide a question".to_string()));
    }
    let len = question.chars().count();
    if len < MIN_QUESTION_CHARS {
        return Err(AppError::Validation(vec![format!(
            "Question must be between {MIN_QUESTION_CHARS} and {MAX_QUESTION_CHARS} characters"
        )]));
    }
    if len > MAX_QUESTION_CHARS {
        return Err(AppError::BadRequest(format!(
            "Question is too long (max {MAX_QUESTION_CHARS} characters)"
        )));
    }
    Ok(question.to_string())
}

fn conversation_title(question: &str) -> String {
    let mut title: String = question.chars().take(50).collect();
    if question.chars().count() > 50 {
        title.push_str("...");
    }
    title
}

/// An existing conversation must belong to the caller. `None` means the
/// exchange starts a new one.
fn owned_conversation(
    db: &Database,
    user: &AuthUser,
    conversation_id: Option<&str>,
) -> AppResult<Option<Conversation>> {
    let Some(id) = conversation_id.filter(|id| !id.trim().is_empty()) else {
        return Ok(None);
    };
    db.get_conversation(id)?
        .filter(|c| c.user_id == user.id())
        .map(Some)
        .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))
}

fn missing_key() -> AppError {
    AppError::Upstream("Gemini API key is invalid or missing".to_string())
}

/// Full ask pipeline: validate, retrieve, generate, persist, and file any finalized report.
/// Nothing is written until generation has produced an answer.
pub async fn answer(state: &AppState, user: &AuthUser, request: AskRequest) -> AppResult<AskOutcome> {
    let question = validate_question(&request.question)?;
    let Some(provider) = state.config.provider() else {
        tracing::error!("generation provider has no API key configured");
        return Err(missing_key());
    };
    let conversation = owned_conversation(&state.db, user, request.conversation_id.as_deref())?;

    let history: Vec<ChatMessage> = match &conversation {
        Some(c) => state
            .db
            .recent_messages(&c.id, HISTORY_TURNS)?
            .into_iter()
            .map(|m| ChatMessage {
                role: m.role,
                text: m.text,
            })
            .collect(),
        None => Vec::new(),
    };

    let chunks = retrieve(state, &question, state.config.rag_top_k).await?;

    let request = GenerateRequest {
        system: SYSTEM_PROMPT.to_string(),
        history,
        prompt: build_prompt(&question, &build_context(&chunks)),
    };

    let raw_answer = match provider.generate(&state.http, &request).await {
        Ok(resp) => resp.text,
        Err(LlmError::Auth(detail)) => {
            tracing::error!(provider = provider.name(), %detail, "generation key rejected");
            return Err(missing_key());
        }
        Err(e) => {
            tracing::warn!(provider = provider.name(), error = %e, "generation failed, using fallback answer");
            FALLBACK_ANSWER.to_string()
        }
    };

    let (answer, report) = match parse_report_tag(&raw_answer) {
        Some((draft, cleaned)) => {
            let report = state.db.create_report(user.id(), &draft)?;
            tracing::info!(reference = %report.reference, "report filed from chat");
            (cleaned, Some(report))
        }
        None => (raw_answer, None),
    };

    let preview: String = answer.chars().take(100).collect();
    let conversation_id = state.db.record_exchange(
        conversation.as_ref().map(|c| c.id.as_str()),
        user.id(),
        &conversation_title(&question),
        &question,
        &answer,
        &preview,
    )?;

    Ok(AskOutcome {
        question,
        answer,
        sources: chunks
            .into_iter()
            .map(|c| Source {
                id: c.document_id,
                title: c.title,
                category: c.category,
                score: c.score,
            })
            .collect(),
        conversation_id,
        report,
        timestamp: crate::db::now(),
    })
}
