//! Effects produced by state transitions

/// What the completion backend is being asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionPrompt {
    /// Pose a multiple-choice question on a freshly chosen topic
    Question { topic: String },

    /// Judge an answer to the open question, hinting if it is wrong
    Evaluate { question: String, answer: String },

    /// Continue after a resolved question (next question or wrap up)
    Continue {
        topic: Option<String>,
        question: String,
        reply: String,
    },
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append the user's message to the conversation
    PersistUserTurn { content: String },

    /// Append the tutor's reply and record the new (stable) state in one write
    PersistAssistantTurn { content: String },

    /// Ask the completion backend; the result comes back as an event
    RequestCompletion { prompt: CompletionPrompt },

    /// Text to stream back to the caller
    Reply { text: String },
}

impl Effect {
    pub fn persist_user_turn(content: impl Into<String>) -> Self {
        Effect::PersistUserTurn {
            content: content.into(),
        }
    }

    pub fn persist_assistant_turn(content: impl Into<String>) -> Self {
        Effect::PersistAssistantTurn {
            content: content.into(),
        }
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Effect::Reply { text: text.into() }
    }

    pub fn request_completion(prompt: CompletionPrompt) -> Self {
        Effect::RequestCompletion { prompt }
    }
}
