pub mod auth;
pub mod chat;
pub mod knowledge;
pub mod reports;

use crate::doc_processor::MAX_UPLOAD_BYTES;
use crate::error::AppError;
use crate::AppState;
use axum::extract::{DefaultBodyLimit, OriginalUri, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

fn cors(frontend_url: &str) -> CorsLayer {
    let origin = frontend_url.parse::<HeaderValue>().unwrap_or_else(|_| {
        tracing::warn!(frontend_url, "FRONTEND_URL is not a valid origin, using default");
        HeaderValue::from_static("http://localhost:3000")
    });
    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}

pub fn router(state: AppState) -> Router {
    let cors = cors(&state.config.frontend_url);

    // Axum 0.8 uses {param} path syntax
    let api = Router::new()
        .route("/status", get(status))
        // Auth
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/profile", put(auth::update_profile))
        .route("/users", get(auth::list_users))
        .route("/users/{id}/active", patch(auth::set_active))
        // Chat
        .route("/chat/ask", post(chat::ask))
        .route("/chat/conversations", get(chat::list_conversations))
        .route(
            "/chat/conversations/{id}",
            delete(chat::delete_conversation),
        )
        .route(
            "/chat/conversations/{id}/messages",
            get(chat::get_messages),
        )
        // Knowledge base
        .route("/chat/upload", post(knowledge::upload_text))
        .route("/chat/upload/text", post(knowledge::upload_text))
        .route(
            "/chat/upload/file",
            post(knowledge::upload_file)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024)),
        )
        .route("/chat/documents", get(knowledge::list_documents))
        .route(
            "/chat/documents/{id}",
            get(knowledge::get_document).delete(knowledge::delete_document),
        )
        // Reports
        .route(
            "/reports",
            post(reports::create_report).get(reports::list_reports),
        )
        .route("/reports/stats", get(reports::report_stats))
        .route("/reports/{id}", get(reports::get_report))
        .route("/reports/{id}/status", patch(reports::update_status))
        .method_not_allowed_fallback(method_not_allowed);

    Router::new()
        .route("/", get(health))
        .nest("/api", api)
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Campus Safety API - Server is running",
        "timestamp": crate::db::now(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let database = match state.db.ping() {
        Ok(()) => "connected",
        Err(e) => {
            tracing::error!(error = %e, "database ping failed");
            "disconnected"
        }
    };
    Json(json!({
        "success": true,
        "status": "operational",
        "database": database,
        "embeddings": state.config.embedding_configured(),
        "generation": state.config.generation_configured(),
        "timestamp": crate::db::now(),
    }))
}

async fn not_found(OriginalUri(uri): OriginalUri) -> AppError {
    AppError::NotFound(format!("Route {} not found", uri))
}

async fn method_not_allowed(method: Method, OriginalUri(uri): OriginalUri) -> AppError {
    AppError::MethodNotAllowed(format!("Method {} not allowed on {}", method, uri))
}
