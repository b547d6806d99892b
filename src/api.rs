//! HTTP API for the quiz tutor

mod handlers;
mod stream;
mod types;

pub use handlers::create_router;

use crate::config::AppConfig;
use crate::llm::ModelRegistry;
use crate::runtime::ProductionRuntime;
use std::sync::Arc;
use std::time::Duration;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ProductionRuntime>,
    pub llm_registry: Arc<ModelRegistry>,
    /// Pause between streamed characters
    pub stream_delay: Duration,
    /// Map failures to HTTP error statuses instead of streaming them
    pub error_status: bool,
}

impl AppState {
    pub fn new(
        runtime: Arc<ProductionRuntime>,
        llm_registry: Arc<ModelRegistry>,
        config: &AppConfig,
    ) -> Self {
        Self {
            runtime,
            llm_registry,
            stream_delay: config.stream_delay,
            error_status: config.error_status,
        }
    }
}
