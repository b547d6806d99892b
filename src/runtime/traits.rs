//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the tutor runtime with mock implementations.

use crate::db::{Role, TurnRecord};
use crate::llm::{LlmError, LlmRequest, LlmResponse};
use crate::state_machine::TutorState;
use async_trait::async_trait;

/// Storage for conversation turns
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Append a turn, creating the conversation if absent
    async fn append_turn(
        &self,
        user_id: &str,
        role: Role,
        content: &str,
    ) -> Result<TurnRecord, String>;

    /// Get all turns for a user in insertion order
    async fn get_history(&self, user_id: &str) -> Result<Vec<TurnRecord>, String>;
}

/// Storage for tutor state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Append a turn and record the conversation state as one atomic write
    async fn append_turn_with_state(
        &self,
        user_id: &str,
        role: Role,
        content: &str,
        state: &TutorState,
    ) -> Result<TurnRecord, String>;

    /// Get the recorded state, if any
    async fn get_state(&self, user_id: &str) -> Result<Option<TutorState>, String>;
}

/// Client for making completion requests
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete a request
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Combined storage trait for convenience
pub trait Storage: TurnStore + StateStore {}
impl<T: TurnStore + StateStore> Storage for T {}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: TurnStore + ?Sized> TurnStore for Arc<T> {
    async fn append_turn(
        &self,
        user_id: &str,
        role: Role,
        content: &str,
    ) -> Result<TurnRecord, String> {
        (**self).append_turn(user_id, role, content).await
    }

    async fn get_history(&self, user_id: &str) -> Result<Vec<TurnRecord>, String> {
        (**self).get_history(user_id).await
    }
}

#[async_trait]
impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    async fn append_turn_with_state(
        &self,
        user_id: &str,
        role: Role,
        content: &str,
        state: &TutorState,
    ) -> Result<TurnRecord, String> {
        (**self)
            .append_turn_with_state(user_id, role, content, state)
            .await
    }

    async fn get_state(&self, user_id: &str) -> Result<Option<TutorState>, String> {
        (**self).get_state(user_id).await
    }
}

#[async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        (**self).complete(request).await
    }

    fn model_id(&self) -> &str {
        (**self).model_id()
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

use crate::db::Database;
use crate::llm::ModelRegistry;
use std::sync::Arc;

/// Adapter to use Database as Storage
#[derive(Clone)]
pub struct DatabaseStorage {
    db: Database,
}

impl DatabaseStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TurnStore for DatabaseStorage {
    async fn append_turn(
        &self,
        user_id: &str,
        role: Role,
        content: &str,
    ) -> Result<TurnRecord, String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.db
            .append_turn(&id, user_id, role, content)
            .map_err(|e| e.to_string())
    }

    async fn get_history(&self, user_id: &str) -> Result<Vec<TurnRecord>, String> {
        self.db.get_history(user_id).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl StateStore for DatabaseStorage {
    async fn append_turn_with_state(
        &self,
        user_id: &str,
        role: Role,
        content: &str,
        state: &TutorState,
    ) -> Result<TurnRecord, String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.db
            .append_turn_with_state(&id, user_id, role, content, state)
            .map_err(|e| e.to_string())
    }

    async fn get_state(&self, user_id: &str) -> Result<Option<TutorState>, String> {
        self.db.get_state(user_id).map_err(|e| e.to_string())
    }
}

/// Adapter to use ModelRegistry as LlmClient
pub struct RegistryLlmClient {
    registry: Arc<ModelRegistry>,
    model_id: String,
}

impl RegistryLlmClient {
    pub fn new(registry: Arc<ModelRegistry>, model_id: String) -> Self {
        Self { registry, model_id }
    }
}

#[async_trait]
impl LlmClient for RegistryLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let llm = self
            .registry
            .get(&self.model_id)
            .or_else(|| self.registry.default())
            .ok_or_else(|| LlmError::network("No LLM available"))?;
        llm.complete(request).await
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
