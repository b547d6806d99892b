//! Pure state transition function

use super::{CompletionPrompt, Effect, Event, TutorState};
use crate::tutor_prompt::{signals_resolution, GREETING, QUESTION_PREFIX};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TutorState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TutorState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Persist `text` as the tutor's turn along with the state, and reply with it
    fn replying(self, text: String) -> Self {
        self.with_effect(Effect::persist_assistant_turn(text.clone()))
            .with_effect(Effect::reply(text))
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A reply is already being generated for this conversation")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same state and event it always produces the same result and
/// performs no I/O. A user message always yields exactly one
/// `PersistUserTurn` as its first effect, before any completion request.
pub fn transition(state: &TutorState, event: Event) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User messages
        // ============================================================

        // Cold start: the message is not inspected
        (TutorState::New, Event::UserMessage { text }) => {
            Ok(TransitionResult::new(TutorState::AwaitingTopic)
                .with_effect(Effect::persist_user_turn(text))
                .replying(GREETING.to_string()))
        }

        (TutorState::AwaitingTopic, Event::UserMessage { text }) => {
            Ok(TransitionResult::new(TutorState::GeneratingQuestion {
                topic: text.clone(),
            })
            .with_effect(Effect::persist_user_turn(text.clone()))
            .with_effect(Effect::request_completion(CompletionPrompt::Question {
                topic: text,
            })))
        }

        (TutorState::AwaitingAnswer { topic, question }, Event::UserMessage { text }) => {
            Ok(TransitionResult::new(TutorState::Evaluating {
                topic: topic.clone(),
                question: question.clone(),
                answer: text.clone(),
            })
            .with_effect(Effect::persist_user_turn(text.clone()))
            .with_effect(Effect::request_completion(CompletionPrompt::Evaluate {
                question: question.clone(),
                answer: text,
            })))
        }

        (TutorState::QuestionResolved { topic, question }, Event::UserMessage { text }) => {
            Ok(TransitionResult::new(TutorState::GeneratingNext {
                topic: topic.clone(),
                question: question.clone(),
                reply: text.clone(),
            })
            .with_effect(Effect::persist_user_turn(text.clone()))
            .with_effect(Effect::request_completion(CompletionPrompt::Continue {
                topic: topic.clone(),
                question: question.clone(),
                reply: text,
            })))
        }

        (s, Event::UserMessage { .. }) if s.is_transient() => Err(TransitionError::Busy),

        // ============================================================
        // Completion results
        // ============================================================

        (TutorState::GeneratingQuestion { topic }, Event::CompletionReady { text }) => {
            let reply = format!("{QUESTION_PREFIX}{text}");
            Ok(TransitionResult::new(TutorState::AwaitingAnswer {
                topic: Some(topic.clone()),
                question: text,
            })
            .replying(reply))
        }

        // The question stays open until the model's own reply says it is
        // resolved; correctness is judged only by the model.
        (TutorState::Evaluating { topic, question, .. }, Event::CompletionReady { text }) => {
            let next = if signals_resolution(&text) {
                TutorState::QuestionResolved {
                    topic: topic.clone(),
                    question: question.clone(),
                }
            } else {
                TutorState::AwaitingAnswer {
                    topic: topic.clone(),
                    question: question.clone(),
                }
            };
            Ok(TransitionResult::new(next).replying(text))
        }

        (TutorState::GeneratingNext { topic, .. }, Event::CompletionReady { text }) => {
            Ok(TransitionResult::new(TutorState::AwaitingAnswer {
                topic: topic.clone(),
                question: text.clone(),
            })
            .replying(text))
        }

        // No assistant turn is written; the conversation stays where it was
        (s, Event::CompletionFailed { .. }) if s.is_transient() => {
            Ok(TransitionResult::new(s.stable_fallback()))
        }

        // ============================================================
        // Everything else
        // ============================================================
        (s, e) => Err(TransitionError::InvalidTransition(format!(
            "{} cannot handle {e:?}",
            s.name()
        ))),
    }
}
