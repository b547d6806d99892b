//! API request and response types

use crate::db::{Role, TurnRecord};
use crate::state_machine::TutorState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to ask the tutor something
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub user_id: String,
    pub message: String,
    /// Sent by older web clients; the stored conversation is authoritative
    #[serde(default)]
    pub history: Vec<HistoryItem>,
}

/// Client-side view of a turn; the role must be `user` or `assistant`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryItem {
    pub role: Role,
    pub content: String,
}

/// Stored conversation for a user
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub user_id: String,
    pub state: TutorState,
    pub turns: Vec<HistoryTurn>,
}

#[derive(Debug, Serialize)]
pub struct HistoryTurn {
    pub sequence_id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<TurnRecord> for HistoryTurn {
    fn from(record: TurnRecord) -> Self {
        Self {
            sequence_id: record.sequence_id,
            role: record.role,
            content: record.content,
            created_at: record.created_at,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub models_available: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
