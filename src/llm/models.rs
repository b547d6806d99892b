//! Centralized model definitions
//!
//! Every model the tutor can talk to is declared here with its factory.

use super::gemini::{GeminiModel, GeminiService};
use super::LlmService;
use std::sync::Arc;

/// Model id used when `DEFAULT_MODEL` is not set
pub const DEFAULT_MODEL_ID: &str = "gemini-1.5-flash";

/// Model definition with metadata
#[derive(Debug, Clone)]
pub struct ModelDef {
    /// User-facing model ID (e.g., "gemini-1.5-flash")
    pub id: &'static str,
    /// Human-readable description
    pub description: &'static str,
    /// Factory function to create the service
    pub factory: fn(&str, Option<&str>) -> Result<Arc<dyn LlmService>, String>,
}

fn gemini_factory(
    model: GeminiModel,
    api_key: &str,
    gateway: Option<&str>,
) -> Result<Arc<dyn LlmService>, String> {
    // Accept any non-empty key (including "implicit" for gateway mode)
    if api_key.is_empty() {
        return Err(format!("{} requires GEMINI_API_KEY or gateway", model.api_name()));
    }
    let service = GeminiService::new(api_key.to_string(), model, gateway).map_err(|e| e.message)?;
    Ok(Arc::new(service))
}

/// Get all available model definitions
pub fn all_models() -> &'static [ModelDef] {
    &[
        ModelDef {
            id: "gemini-1.5-flash",
            description: "Gemini 1.5 Flash (fast, default tutor model)",
            factory: |api_key, gateway| gemini_factory(GeminiModel::Gemini15Flash, api_key, gateway),
        },
        ModelDef {
            id: "gemini-1.5-pro",
            description: "Gemini 1.5 Pro (more capable, slower)",
            factory: |api_key, gateway| gemini_factory(GeminiModel::Gemini15Pro, api_key, gateway),
        },
        ModelDef {
            id: "gemini-2.0-flash",
            description: "Gemini 2.0 Flash",
            factory: |api_key, gateway| gemini_factory(GeminiModel::Gemini20Flash, api_key, gateway),
        },
    ]
}
