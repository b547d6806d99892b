//! Tutor state types

use crate::db::{Role, Turn};
use serde::{Deserialize, Serialize};

/// Where a conversation stands in the quiz flow.
///
/// Stable states are persisted between requests. Transient states only
/// exist while a completion request is in flight and are never written
/// to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TutorState {
    /// No exchange yet
    #[default]
    New,

    /// Greeting sent, the next message names a topic
    AwaitingTopic,

    /// Asking the model for the first question on `topic`
    GeneratingQuestion { topic: String },

    /// A question is open; the next message is an answer to it.
    /// `topic` is unknown for conversations recovered from bare history.
    AwaitingAnswer {
        topic: Option<String>,
        question: String,
    },

    /// Asking the model to evaluate `answer`
    Evaluating {
        topic: Option<String>,
        question: String,
        answer: String,
    },

    /// The model congratulated the user and asked whether to go on
    QuestionResolved {
        topic: Option<String>,
        question: String,
    },

    /// Asking the model how to continue after a resolved question
    GeneratingNext {
        topic: Option<String>,
        question: String,
        reply: String,
    },
}

impl TutorState {
    /// True while a completion request is outstanding
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TutorState::GeneratingQuestion { .. }
                | TutorState::Evaluating { .. }
                | TutorState::GeneratingNext { .. }
        )
    }

    /// Stable state to fall back to when the in-flight request fails
    pub fn stable_fallback(&self) -> TutorState {
        match self {
            TutorState::GeneratingQuestion { .. } => TutorState::AwaitingTopic,
            TutorState::Evaluating {
                topic, question, ..
            } => TutorState::AwaitingAnswer {
                topic: topic.clone(),
                question: question.clone(),
            },
            TutorState::GeneratingNext {
                topic, question, ..
            } => TutorState::QuestionResolved {
                topic: topic.clone(),
                question: question.clone(),
            },
            stable => stable.clone(),
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            TutorState::New => "new",
            TutorState::AwaitingTopic => "awaiting_topic",
            TutorState::GeneratingQuestion { .. } => "generating_question",
            TutorState::AwaitingAnswer { .. } => "awaiting_answer",
            TutorState::Evaluating { .. } => "evaluating",
            TutorState::QuestionResolved { .. } => "question_resolved",
            TutorState::GeneratingNext { .. } => "generating_next",
        }
    }

    /// Rebuild a state for a conversation whose history exists but whose
    /// state was never recorded.
    ///
    /// Mirrors the turn-count rule of older deployments: nothing stored
    /// means a fresh start, at most one assistant turn means the greeting
    /// went out, and otherwise the latest assistant turn is the open
    /// question.
    pub fn recover_from_history(history: &[Turn]) -> TutorState {
        if history.is_empty() {
            return TutorState::New;
        }

        let mut assistant_turns = history.iter().filter(|t| t.role == Role::Assistant);
        let Some(last) = assistant_turns.next_back() else {
            return TutorState::AwaitingTopic;
        };
        if assistant_turns.next().is_none() {
            return TutorState::AwaitingTopic;
        }

        TutorState::AwaitingAnswer {
            topic: None,
            question: last.content.clone(),
        }
    }
}
