//! Events that can occur in a tutor conversation

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserMessage { text: String },

    // Completion backend events
    CompletionReady { text: String },
    CompletionFailed { message: String },
}
