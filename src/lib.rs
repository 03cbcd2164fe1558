pub mod auth;
pub mod config;
pub mod db;
pub mod doc_processor;
pub mod embedding;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod rag;

use anyhow::Context;
use crate::config::AppConfig;
use crate::db::models::Role;
use crate::db::Database;
use std::path::Path;
use std::sync::Arc;

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<AppConfig>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(db: Database, config: AppConfig) -> Self {
        Self {
            db: Arc::new(db),
            config: Arc::new(config),
            http: reqwest::Client::new(),
        }
    }
}

/// Create the configured admin account if its email is not registered yet.
pub fn bootstrap_admin(db: &Database, config: &AppConfig) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = email.trim().to_lowercase();
    if db.find_user_by_email(&email)?.is_some() {
        return Ok(());
    }
    let name = config.admin_name.as_deref().unwrap_or("Campus Administrator");
    let hash = auth::hash_password(password)?;
    db.create_user(name, &email, &hash, Role::Admin)?;
    tracing::info!(%email, "bootstrap admin account created");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining connections");
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let database = Database::open(Path::new(&config.database_path))
        .with_context(|| format!("opening database at {}", config.database_path))?;
    bootstrap_admin(&database, &config)?;

    if !config.embedding_configured() {
        tracing::warn!("VOYAGE_API_KEY not set; documents will be stored without embeddings");
    }
    if !config.generation_configured() {
        tracing::warn!(provider = ?config.generation_provider, "generation API key not set; chat requests will fail");
    }

    let addr = config.bind_addr();
    let state = AppState::new(database, config);
    let app = handlers::router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("Campus Safety API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}
