use crate::auth::AuthUser;
use crate::db::models::{Conversation, Message};
use crate::error::{ApiResponse, AppError, AppJson, AppResult};
use crate::rag::{self, AskOutcome, AskRequest};
use crate::AppState;
use axum::extract::{Path, State};

pub async fn ask(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(req): AppJson<AskRequest>,
) -> AppResult<ApiResponse<AskOutcome>> {
    tracing::info!(user = %user.0.email, "chat request");
    let outcome = rag::answer(&state, &user, req).await?;
    tracing::info!(
        sources = outcome.sources.len(),
        report = outcome.report.is_some(),
        "chat response sent"
    );
    Ok(ApiResponse::data(outcome))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<ApiResponse<Vec<Conversation>>> {
    Ok(ApiResponse::data(state.db.list_conversations(user.id())?))
}

fn owned_conversation(state: &AppState, user: &AuthUser, id: &str) -> AppResult<Conversation> {
    state
        .db
        .get_conversation(id)?
        .filter(|c| c.user_id == user.id())
        .ok_or_else(|| AppError::NotFound("Conversation not found".to_string()))
}

pub async fn get_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<Message>>> {
    let conversation = owned_conversation(&state, &user, &id)?;
    Ok(ApiResponse::data(state.db.get_messages(&conversation.id)?))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<()>> {
    let conversation = owned_conversation(&state, &user, &id)?;
    state.db.delete_conversation(&conversation.id)?;
    Ok(ApiResponse::message("Conversation deleted"))
}
