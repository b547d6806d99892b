//! Runtime for tutoring conversations
//!
//! Drives the pure state machine against storage and the completion
//! backend, one request at a time per user.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::{ConversationView, TutorReply, TutorRuntime};
pub use traits::*;

use thiserror::Error;

/// Runtime used by the server: database storage, any completion client
pub type ProductionRuntime = TutorRuntime<DatabaseStorage, dyn LlmClient>;

/// Failure of a single tutoring request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TutorError {
    pub kind: TutorErrorKind,
    pub message: String,
}

/// What went wrong, as far as the caller needs to know
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TutorErrorKind {
    /// The conversation store could not be read or written
    Storage,
    /// The completion backend failed or returned nothing usable
    Completion,
    /// The request itself was unusable
    InvalidRequest,
    /// The conversation was in a state that cannot accept the request
    Internal,
}

impl TutorError {
    pub fn new(kind: TutorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(TutorErrorKind::Storage, message)
    }

    pub fn completion(message: impl Into<String>) -> Self {
        Self::new(TutorErrorKind::Completion, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(TutorErrorKind::InvalidRequest, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(TutorErrorKind::Internal, message)
    }
}
