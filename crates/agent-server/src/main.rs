//! project-agent HTTP Server
//!
//! Axum-based server hosting agent sessions over REST and WebSocket.
//! The provider is chosen from the environment (see `RuntimeConfig`); the
//! agent works inside `AGENT_WORKING_DIR` unless a request names another
//! project root.

mod handlers;
mod state;
mod stream;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agent_core::{MemoryRecordStore, SessionManager};
use agent_runtime::RuntimeConfig;

use crate::handlers::{
    cancel_session, chat_handler, delete_session, get_session, health_check, list_conversations,
    list_sessions, list_tools, reset_session,
};
use crate::state::AppState;
use crate::stream::chat_stream_handler;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & info
        .route("/health", get(health_check))
        .route("/api/tools", get(list_tools))
        // Agent API
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/stream", get(chat_stream_handler))
        // Sessions
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/sessions/{id}/cancel", post(cancel_session))
        .route("/api/sessions/{id}/reset", post(reset_session))
        .route("/api/conversations", get(list_conversations))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn env_secs(key: &str, default: Duration) -> anyhow::Result<Duration> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => {
            let secs: u64 = value
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("{key} has an invalid value: '{value}'"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Ok(default),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Initialize LLM provider; configuration errors stop startup
    let provider = RuntimeConfig::from_env()?.build_provider()?;

    match provider.health_check().await {
        Ok(true) => tracing::info!("✓ Connected to {} ({})", provider.name(), provider.model()),
        Ok(false) | Err(_) => {
            tracing::warn!("⚠ {} not reachable - submissions will fail", provider.name());
        }
    }

    let command_timeout = env_secs(
        "AGENT_COMMAND_TIMEOUT_SECS",
        project_tools::DEFAULT_COMMAND_TIMEOUT,
    )?;
    let agent = Arc::new(project_tools::project_agent(provider, command_timeout)?);

    tracing::info!("Registered {} tools:", agent.tools().len());
    for name in agent.tools().names() {
        tracing::info!("  • {}", name);
    }

    let default_working_dir = match std::env::var("AGENT_WORKING_DIR") {
        Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => std::env::current_dir()?,
    };
    if !default_working_dir.is_dir() {
        anyhow::bail!("AGENT_WORKING_DIR is not a directory: {}", default_working_dir.display());
    }
    tracing::info!("Working directory: {}", default_working_dir.display());

    // Build application state
    let records = Arc::new(MemoryRecordStore::new());
    let sessions = SessionManager::new(agent).with_records(records.clone());
    let state = AppState {
        sessions: Arc::new(sessions),
        records,
        default_working_dir,
    };

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 project-agent server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                   - Health check");
    tracing::info!("  GET    /api/tools                - Tool descriptors");
    tracing::info!("  POST   /api/chat                 - Send message");
    tracing::info!("  GET    /api/chat/stream          - WebSocket session stream");
    tracing::info!("  GET    /api/sessions             - Live sessions");
    tracing::info!("  POST   /api/sessions/{{id}}/cancel - Stop generation");
    tracing::info!("  POST   /api/sessions/{{id}}/reset  - Clear history");
    tracing::info!("  DELETE /api/sessions/{{id}}        - Drop session");
    tracing::info!("  GET    /api/conversations        - Saved records");
    tracing::info!("");

    axum::serve(listener, router(state)).await?;

    Ok(())
}
