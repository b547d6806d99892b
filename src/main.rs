//! Quiz Tutor - streaming quiz tutoring service
//!
//! Greets a learner, asks a multiple-choice question on the topic they
//! pick, and judges their answers with hints, streaming every reply
//! character by character.

mod api;
mod config;
mod db;
mod llm;
mod runtime;
mod state_machine;
mod tutor_prompt;

use api::{create_router, AppState};
use config::AppConfig;
use db::Database;
use llm::ModelRegistry;
use runtime::{DatabaseStorage, LlmClient, RegistryLlmClient, TutorRuntime};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quiz_tutor=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;

    // Ensure database directory exists
    if config.db_path != ":memory:" {
        if let Some(parent) = PathBuf::from(&config.db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    // Initialize database
    tracing::info!(path = %config.db_path, "Opening database");
    let db = if config.db_path == ":memory:" {
        Database::open_in_memory()?
    } else {
        Database::open(&config.db_path)?
    };

    // Initialize LLM registry
    let llm_registry = Arc::new(ModelRegistry::new(&config.llm));

    if llm_registry.has_models() {
        tracing::info!(
            models = ?llm_registry.available_models(),
            default = %llm_registry.default_model_id(),
            context_window = llm_registry.default().map_or(0, |m| m.context_window()),
            "LLM registry initialized"
        );
    } else {
        tracing::warn!("No LLM API keys configured. Set GEMINI_API_KEY or LLM_GATEWAY.");
    }

    // Create application state
    let llm_client: Arc<dyn LlmClient> = Arc::new(RegistryLlmClient::new(
        llm_registry.clone(),
        llm_registry.default_model_id().to_string(),
    ));
    let runtime = Arc::new(TutorRuntime::new(
        DatabaseStorage::new(db),
        llm_client,
        config.history_window,
    ));
    let state = AppState::new(runtime, llm_registry, &config);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        stream_delay_ms = %config.stream_delay.as_millis(),
        history_window = config.history_window,
        error_status = config.error_status,
        "Quiz tutor listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
