//! Process configuration from the environment
//!
//! Values come from environment variables, optionally seeded from a `.env`
//! file by `main`. The storage location is mandatory; everything else has
//! a default.

use crate::llm::LlmConfig;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_STREAM_DELAY_MS: u64 = 10;
const DEFAULT_HISTORY_WINDOW: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite file path, or `:memory:`
    pub db_path: String,
    pub port: u16,
    /// Pause between streamed characters
    pub stream_delay: Duration,
    /// Number of recent turns sent to the backend when judging answers
    pub history_window: usize,
    /// Answer failed requests with an HTTP error status instead of a 200
    /// response streaming the `Error: ...` text
    pub error_status: bool,
    pub llm: LlmConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let db_path = non_empty("TUTOR_DB_PATH").ok_or(ConfigError::Missing("TUTOR_DB_PATH"))?;

        let port = parse_or(&non_empty, "TUTOR_PORT", DEFAULT_PORT)?;
        let delay_ms = parse_or(&non_empty, "TUTOR_STREAM_DELAY_MS", DEFAULT_STREAM_DELAY_MS)?;
        let history_window = parse_or(&non_empty, "TUTOR_HISTORY_WINDOW", DEFAULT_HISTORY_WINDOW)?;
        let error_status = parse_or(&non_empty, "TUTOR_ERROR_STATUS", false)?;

        Ok(Self {
            db_path,
            port,
            stream_delay: Duration::from_millis(delay_ms),
            history_window,
            error_status,
            llm: LlmConfig {
                gemini_api_key: non_empty("GEMINI_API_KEY"),
                gateway: non_empty("LLM_GATEWAY"),
                default_model: non_empty("DEFAULT_MODEL"),
            },
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
