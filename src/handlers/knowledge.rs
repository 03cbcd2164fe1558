use crate::auth::AuthUser;
use crate::db::models::{Category, Document, DocumentFilter, DocumentSummary, NewDocument, Role};
use crate::doc_processor::{self, ParseError};
use crate::embedding::{embed_or_none, InputType};
use crate::error::{ApiResponse, AppError, AppJson, AppMultipart, AppQuery, AppResult};
use crate::AppState;
use axum::extract::multipart::MultipartError;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

pub const MIN_TITLE_CHARS: usize = 3;
pub const MAX_TITLE_CHARS: usize = 200;
pub const MIN_CONTENT_CHARS: usize = 10;
pub const MAX_CONTENT_CHARS: usize = 50_000;
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

const EDITORS: &[Role] = &[Role::Admin, Role::Staff];

#[derive(Debug, Deserialize)]
pub struct UploadTextRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub limit: Option<String>,
    pub page: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DocumentPayload {
    pub document: Document,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Pagination {
    pub total: i64,
    pub page: u32,
    pub pages: i64,
}

#[derive(Debug, Serialize)]
pub struct DocumentList {
    pub documents: Vec<DocumentSummary>,
    pub pagination: Pagination,
}

/// Lenient integer parsing: leading digits count, anything unparsable is the default.
fn parse_int(raw: Option<&str>, default: u32) -> u32 {
    raw.map(str::trim)
        .map(|s| s.chars().take_while(char::is_ascii_digit).collect::<String>())
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(default)
}

pub fn pagination(total: i64, page: u32, limit: u32) -> Pagination {
    let limit = i64::from(limit.max(1));
    Pagination {
        total,
        page,
        pages: (total + limit - 1) / limit,
    }
}

fn parse_category(raw: Option<&str>, errors: &mut Vec<String>) -> Category {
    match raw.map(str::trim).filter(|c| !c.is_empty()) {
        None => Category::default(),
        Some(c) => c.parse().unwrap_or_else(|_| {
            errors.push("Invalid category".to_string());
            Category::default()
        }),
    }
}

fn clean_tags(tags: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn validate_document(title: &str, content: &str, errors: &mut Vec<String>) {
    let title_len = title.chars().count();
    if title_len == 0 {
        errors.push("Title is required".to_string());
    } else if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&title_len) {
        errors.push(format!(
            "Title must be between {MIN_TITLE_CHARS} and {MAX_TITLE_CHARS} characters"
        ));
    }
    let content_len = content.chars().count();
    if content_len == 0 {
        errors.push("Content is required".to_string());
    } else if content_len < MIN_CONTENT_CHARS {
        errors.push(format!(
            "Content must be at least {MIN_CONTENT_CHARS} characters"
        ));
    } else if content_len > MAX_CONTENT_CHARS {
        errors.push(format!(
            "Content cannot exceed {MAX_CONTENT_CHARS} characters"
        ));
    }
}

/// Chunk, store, then embed a validated document. Embedding failures leave
/// chunks without vectors; retrieval falls back to keywords for them.
async fn ingest(state: &AppState, doc: NewDocument) -> AppResult<Document> {
    let chunks = doc_processor::chunk_text(
        &doc.content,
        state.config.chunk_size,
        state.config.chunk_overlap,
    );
    let (document, pending) = state.db.insert_document_with_chunks(&doc, &chunks)?;

    let texts: Vec<String> = pending.iter().map(|(_, text)| text.clone()).collect();
    let voyage = state.config.voyage();
    if let Some(embeddings) =
        embed_or_none(voyage.as_ref(), &state.http, &texts, InputType::Document).await
    {
        for ((chunk_id, _), embedding) in pending.iter().zip(embeddings.iter()) {
            state.db.set_chunk_embedding(chunk_id, embedding)?;
        }
    }

    let document = state.db.get_document(&document.id)?.unwrap_or(document);
    tracing::info!(
        id = %document.id,
        title = %document.title,
        chunks = document.chunk_count,
        embedded = document.embedded_chunks,
        "document stored"
    );
    Ok(document)
}

pub async fn upload_text(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<UploadTextRequest>,
) -> AppResult<(StatusCode, ApiResponse<DocumentPayload>)> {
    user.require_role(EDITORS)?;
    tracing::info!(user = %user.0.email, "document upload");

    let title = req.title.trim().to_string();
    let content = req.content.trim().to_string();
    let mut errors = Vec::new();
    validate_document(&title, &content, &mut errors);
    let category = parse_category(req.category.as_deref(), &mut errors);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let document = ingest(
        &state,
        NewDocument {
            title,
            content,
            category,
            tags: clean_tags(req.tags),
            file_name: None,
            file_type: None,
            file_size: None,
            uploaded_by: user.id().to_string(),
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("Document uploaded successfully", DocumentPayload { document }),
    ))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::from(ParseError::TooLarge)
    } else {
        AppError::BadRequest(format!("Invalid multipart request: {}", e.body_text()))
    }
}

struct UploadedFile {
    name: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

pub async fn upload_file(
    State(state): State<AppState>,
    user: AuthUser,
    AppMultipart(mut multipart): AppMultipart,
) -> AppResult<(StatusCode, ApiResponse<DocumentPayload>)> {
    user.require_role(EDITORS)?;

    let mut file: Option<UploadedFile> = None;
    let mut title: Option<String> = None;
    let mut category: Option<String> = None;
    let mut tags: Vec<String> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
                file = Some(UploadedFile {
                    name,
                    content_type,
                    bytes,
                });
            }
            "title" => title = Some(field.text().await.map_err(multipart_error)?),
            "category" => category = Some(field.text().await.map_err(multipart_error)?),
            "tags" => {
                let raw = field.text().await.map_err(multipart_error)?;
                tags.extend(raw.split(',').map(str::to_string));
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("No file provided".to_string()))?;
    tracing::info!(user = %user.0.email, file = %file.name, size = file.bytes.len(), "file upload");

    let parsed = doc_processor::parse_upload(&file.name, file.content_type.as_deref(), &file.bytes)?;

    let title = title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            file.name
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_string())
                .unwrap_or_else(|| file.name.clone())
        });
    let content = parsed.content.trim().to_string();

    let mut errors = Vec::new();
    validate_document(&title, &content, &mut errors);
    let category = parse_category(category.as_deref(), &mut errors);
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let document = ingest(
        &state,
        NewDocument {
            title,
            content,
            category,
            tags: clean_tags(tags),
            file_size: Some(file.bytes.len() as i64),
            file_name: Some(file.name),
            file_type: Some(parsed.file_type),
            uploaded_by: user.id().to_string(),
        },
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        ApiResponse::with_message("File uploaded successfully", DocumentPayload { document }),
    ))
}

pub async fn list_documents(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(query): AppQuery<DocumentQuery>,
) -> AppResult<ApiResponse<DocumentList>> {
    let limit = parse_int(query.limit.as_deref(), DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = parse_int(query.page.as_deref(), 1).max(1);

    let mut errors = Vec::new();
    let category = query
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|c| parse_category(Some(c), &mut errors));
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let filter = DocumentFilter {
        category,
        search: query.search,
    };
    let (documents, total) = state.db.list_documents(&filter, page, limit)?;

    Ok(ApiResponse::data(DocumentList {
        documents,
        pagination: pagination(total, page, limit),
    }))
}

pub async fn get_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<DocumentPayload>> {
    let not_found = || AppError::NotFound("Document not found".to_string());
    let existing = state.db.get_document(&id)?.ok_or_else(not_found)?;
    if !existing.is_public && !user.is_privileged() {
        return Err(not_found());
    }
    state.db.increment_view_count(&id)?;
    let document = state.db.get_document(&id)?.ok_or_else(not_found)?;
    Ok(ApiResponse::data(DocumentPayload { document }))
}

pub async fn delete_document(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    user.require_role(EDITORS)?;
    if !state.db.delete_document(&id)? {
        return Err(AppError::NotFound("Document not found".to_string()));
    }
    tracing::info!(%id, by = %user.0.email, "document deleted");
    Ok(ApiResponse::message("Document and its chunks deleted"))
}
