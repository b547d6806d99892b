//! Tutor runtime executor

use super::traits::{LlmClient, Storage};
use super::TutorError;
use crate::db::{Role, Turn, TurnRecord};
use crate::llm::LlmRequest;
use crate::state_machine::{transition, Effect, Event, TutorState};
use crate::tutor_prompt::{render_prompt, QUIZ_PROMPT};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

const MAX_COMPLETION_TOKENS: u32 = 1024;

/// Reply produced for one user message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorReply {
    pub text: String,
    /// State the conversation settled in
    pub state: TutorState,
}

/// Stored conversation as seen by readers
#[derive(Debug, Clone)]
pub struct ConversationView {
    pub state: TutorState,
    pub turns: Vec<TurnRecord>,
}

/// Tutor runtime, generic over storage and completion backend
pub struct TutorRuntime<S, L>
where
    S: Storage + 'static,
    L: LlmClient + ?Sized + 'static,
{
    storage: S,
    llm_client: Arc<L>,
    /// Prior turns sent along when judging an answer
    history_window: usize,
    /// One lock per user; held from the history read to the last write
    user_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S, L> TutorRuntime<S, L>
where
    S: Storage + 'static,
    L: LlmClient + ?Sized + 'static,
{
    pub fn new(storage: S, llm_client: Arc<L>, history_window: usize) -> Self {
        Self {
            storage,
            llm_client,
            history_window,
            user_locks: RwLock::new(HashMap::new()),
        }
    }

    pub fn model_id(&self) -> &str {
        self.llm_client.model_id()
    }

    /// Handle one user message and produce the tutor's reply.
    ///
    /// The user turn is stored before the completion backend is called. On
    /// success the assistant turn and the new state are stored before this
    /// returns; on failure no assistant turn is written and the stored
    /// state is left untouched.
    pub async fn ask(&self, user_id: &str, message: &str) -> Result<TutorReply, TutorError> {
        if user_id.is_empty() {
            return Err(TutorError::invalid_request("user_id must not be empty"));
        }

        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let history: Vec<Turn> = self
            .storage
            .get_history(user_id)
            .await
            .map_err(storage_error)?
            .iter()
            .map(TurnRecord::to_turn)
            .collect();
        let mut state = self.load_state(user_id, &history).await?;
        let recent = &history[history.len().saturating_sub(self.history_window)..];

        tracing::info!(
            user_id = %user_id,
            state = state.name(),
            turns = history.len(),
            "Handling message"
        );

        let mut reply = None;
        let mut failure = None;
        let mut next_event = Some(Event::UserMessage {
            text: message.to_string(),
        });

        while let Some(event) = next_event.take() {
            if let Event::CompletionFailed { message } = &event {
                failure = Some(message.clone());
            }

            let result = transition(&state, event).map_err(|e| {
                tracing::warn!(user_id = %user_id, state = state.name(), error = %e, "Message rejected");
                TutorError::internal(e.to_string())
            })?;
            state = result.new_state;

            for effect in result.effects {
                if let Some(event) = self
                    .execute_effect(user_id, &state, effect, recent, &mut reply)
                    .await?
                {
                    next_event = Some(event);
                }
            }
        }

        match (reply, failure) {
            (Some(text), _) => {
                tracing::info!(user_id = %user_id, state = state.name(), chars = text.chars().count(), "Reply ready");
                Ok(TutorReply { text, state })
            }
            (None, Some(message)) => Err(TutorError::completion(message)),
            (None, None) => Err(TutorError::internal("No reply was produced")),
        }
    }

    /// Stored turns and current state for a user; empty for unknown ids
    pub async fn conversation(&self, user_id: &str) -> Result<ConversationView, TutorError> {
        let turns = self
            .storage
            .get_history(user_id)
            .await
            .map_err(storage_error)?;
        let history: Vec<Turn> = turns.iter().map(TurnRecord::to_turn).collect();
        let state = self.load_state(user_id, &history).await?;
        Ok(ConversationView { state, turns })
    }

    async fn load_state(&self, user_id: &str, history: &[Turn]) -> Result<TutorState, TutorError> {
        match self.storage.get_state(user_id).await.map_err(storage_error)? {
            Some(state) if state.is_transient() => {
                tracing::warn!(user_id = %user_id, state = state.name(), "Stored state is transient, falling back");
                Ok(state.stable_fallback())
            }
            Some(state) => Ok(state),
            None => {
                let state = TutorState::recover_from_history(history);
                if !history.is_empty() {
                    tracing::info!(user_id = %user_id, state = state.name(), "Recovered state from history");
                }
                Ok(state)
            }
        }
    }

    async fn execute_effect(
        &self,
        user_id: &str,
        state: &TutorState,
        effect: Effect,
        recent: &[Turn],
        reply: &mut Option<String>,
    ) -> Result<Option<Event>, TutorError> {
        match effect {
            Effect::PersistUserTurn { content } => {
                self.storage
                    .append_turn(user_id, Role::User, &content)
                    .await
                    .map_err(storage_error)?;
                Ok(None)
            }

            Effect::PersistAssistantTurn { content } => {
                self.storage
                    .append_turn_with_state(user_id, Role::Assistant, &content, state)
                    .await
                    .map_err(storage_error)?;
                tracing::debug!(user_id = %user_id, state = state.name(), "Reply and state persisted");
                Ok(None)
            }

            Effect::RequestCompletion { prompt } => {
                let request = LlmRequest::prompt(QUIZ_PROMPT, render_prompt(&prompt, recent))
                    .with_max_tokens(MAX_COMPLETION_TOKENS);

                tracing::info!(user_id = %user_id, model = %self.llm_client.model_id(), "Requesting completion");

                let event = match self.llm_client.complete(&request).await {
                    Ok(response) => Event::CompletionReady {
                        text: response.text,
                    },
                    Err(e) => {
                        tracing::error!(
                            user_id = %user_id,
                            error = %e.message,
                            retryable = e.kind.is_retryable(),
                            "Completion failed"
                        );
                        Event::CompletionFailed { message: e.message }
                    }
                };
                Ok(Some(event))
            }

            Effect::Reply { text } => {
                *reply = Some(text);
                Ok(None)
            }
        }
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let existing = self.user_locks.read().await.get(user_id).cloned();
        if let Some(lock) = existing {
            return lock;
        }
        self.user_locks
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }
}

fn storage_error(message: String) -> TutorError {
    tracing::error!(error = %message, "Storage operation failed");
    TutorError::storage(message)
}
