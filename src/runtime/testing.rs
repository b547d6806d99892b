//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::db::{Role, Turn, TurnRecord};
use crate::llm::{LlmError, LlmRequest, LlmResponse};
use crate::state_machine::TutorState;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, RwLock};

// ============================================================================
// Mock LLM Client
// ============================================================================

/// Mock LLM client that returns queued responses
pub struct MockLlmClient {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    /// Record of all requests made
    pub requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlmClient {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response with the given text
    pub fn queue_text(&self, text: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(LlmResponse::from_text(text)));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Prompt text of the n-th recorded request
    pub fn prompt_text(&self, n: usize) -> String {
        self.requests.lock().unwrap()[n].messages[0].text.clone()
    }

    fn next_response(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.next_response(request)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Delayed Mock LLM Client (for concurrency testing)
// ============================================================================

/// Mock LLM client with configurable delay
pub struct DelayedMockLlmClient {
    inner: MockLlmClient,
    delay: Duration,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockLlmClient {
    pub fn new(model_id: impl Into<String>, delay: Duration) -> Self {
        Self {
            inner: MockLlmClient::new(model_id),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_text(&self, text: impl Into<String>) {
        self.inner.queue_text(text);
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl LlmClient for DelayedMockLlmClient {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.request_started.notify_waiters();
        tokio::time::sleep(self.delay).await;
        self.inner.next_response(request)
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// In-Memory Storage
// ============================================================================

/// In-memory storage for testing
#[derive(Default)]
pub struct InMemoryStorage {
    turns: RwLock<HashMap<String, Vec<TurnRecord>>>,
    states: RwLock<HashMap<String, TutorState>>,
    fail_writes: AtomicBool,
    /// Writes still allowed before failing, when set
    write_budget: Mutex<Option<usize>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail; `false` also clears any write budget
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
        if !fail {
            *self.write_budget.lock().unwrap() = None;
        }
    }

    /// Allow `writes` more writes, then fail every write after them
    pub fn fail_after_writes(&self, writes: usize) {
        *self.write_budget.lock().unwrap() = Some(writes);
    }

    /// Store turns without recording a state, as older deployments did
    pub async fn seed(&self, user_id: &str, turns: &[Turn]) {
        for turn in turns {
            self.push(user_id, turn.role, &turn.content).await;
        }
    }

    /// Turns currently stored for a user
    pub async fn turns(&self, user_id: &str) -> Vec<Turn> {
        self.turns
            .read()
            .await
            .get(user_id)
            .map(|records| records.iter().map(TurnRecord::to_turn).collect())
            .unwrap_or_default()
    }

    /// State currently stored for a user
    pub async fn stored_state(&self, user_id: &str) -> Option<TutorState> {
        self.states.read().await.get(user_id).cloned()
    }

    async fn push(&self, user_id: &str, role: Role, content: &str) -> TurnRecord {
        let mut turns = self.turns.write().await;
        let entry = turns.entry(user_id.to_string()).or_default();
        #[allow(clippy::cast_possible_wrap)]
        let sequence_id = entry.len() as i64 + 1;
        let record = TurnRecord {
            turn_id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            sequence_id,
            role,
            content: content.to_string(),
            created_at: chrono::Utc::now(),
        };
        entry.push(record.clone());
        record
    }

    fn check_writable(&self) -> Result<(), String> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err("disk I/O error".to_string());
        }
        match &mut *self.write_budget.lock().unwrap() {
            Some(0) => Err("disk I/O error".to_string()),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TurnStore for InMemoryStorage {
    async fn append_turn(
        &self,
        user_id: &str,
        role: Role,
        content: &str,
    ) -> Result<TurnRecord, String> {
        self.check_writable()?;
        Ok(self.push(user_id, role, content).await)
    }

    async fn get_history(&self, user_id: &str) -> Result<Vec<TurnRecord>, String> {
        Ok(self
            .turns
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl StateStore for InMemoryStorage {
    async fn append_turn_with_state(
        &self,
        user_id: &str,
        role: Role,
        content: &str,
        state: &TutorState,
    ) -> Result<TurnRecord, String> {
        self.check_writable()?;
        let record = self.push(user_id, role, content).await;
        self.states
            .write()
            .await
            .insert(user_id.to_string(), state.clone());
        Ok(record)
    }

    async fn get_state(&self, user_id: &str) -> Result<Option<TutorState>, String> {
        Ok(self.stored_state(user_id).await)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::llm::LlmErrorKind;
    use crate::runtime::{TutorErrorKind, TutorRuntime};
    use crate::tutor_prompt::{GREETING, QUESTION_PREFIX, QUIZ_PROMPT};

    const QUESTION: &str = "Solve 2x + 3 = 7. A) 1 B) 2 C) 3 D) 4";
    const CORRECT: &str =
        "Great job! 2(2) + 3 = 7, so x = 2 is correct. Would you like to proceed with the next question?";

    fn runtime(
        llm: &Arc<MockLlmClient>,
        window: usize,
    ) -> (TutorRuntime<Arc<InMemoryStorage>, MockLlmClient>, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        (TutorRuntime::new(storage.clone(), llm.clone(), window), storage)
    }

    #[tokio::test]
    async fn test_quiz_scenario() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_text(QUESTION);
        llm.queue_text(CORRECT);
        let (rt, storage) = runtime(&llm, 6);

        let first = rt.ask("u1", "Algebra").await.unwrap();
        assert_eq!(first.text, GREETING);
        assert!(llm.recorded_requests().is_empty());
        assert_eq!(
            storage.turns("u1").await,
            vec![Turn::user("Algebra"), Turn::assistant(GREETING)]
        );

        let second = rt.ask("u1", "Algebra").await.unwrap();
        assert_eq!(second.text, format!("{QUESTION_PREFIX}{QUESTION}"));
        assert_eq!(llm.prompt_text(0), "User topic: Algebra");
        assert_eq!(llm.recorded_requests()[0].system[0].text, QUIZ_PROMPT);

        let third = rt.ask("u1", "B").await.unwrap();
        assert_eq!(third.text, CORRECT);
        assert!(llm
            .prompt_text(1)
            .ends_with(&format!("User question: {QUESTION}\nUser answer: B")));
        assert!(matches!(third.state, TutorState::QuestionResolved { .. }));

        let turns = storage.turns("u1").await;
        assert_eq!(turns.len(), 6);
        assert_eq!(turns[2], Turn::user("Algebra"));
        assert_eq!(turns[3], Turn::assistant(second.text));
        assert_eq!(turns[4], Turn::user("B"));
        assert_eq!(turns[5], Turn::assistant(CORRECT));
    }

    #[tokio::test]
    async fn test_greeting_ignores_message_content() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        let (rt, _) = runtime(&llm, 6);

        let a = rt.ask("alice", "hello").await.unwrap();
        let b = rt.ask("bob", "I want to learn chemistry").await.unwrap();
        assert_eq!(a.text, GREETING);
        assert_eq!(a.text, b.text);
        assert_eq!(a.state, TutorState::AwaitingTopic);
    }

    #[tokio::test]
    async fn test_wrong_answer_keeps_question_open() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_text(QUESTION);
        llm.queue_text("Not quite. Hint: subtract 3 from both sides.");
        llm.queue_text(CORRECT);
        let (rt, storage) = runtime(&llm, 6);

        rt.ask("u1", "hi").await.unwrap();
        rt.ask("u1", "Algebra").await.unwrap();
        let hint = rt.ask("u1", "A").await.unwrap();
        assert_eq!(
            hint.state,
            TutorState::AwaitingAnswer {
                topic: Some("Algebra".to_string()),
                question: QUESTION.to_string(),
            }
        );
        assert_eq!(storage.turns("u1").await.len(), 6);

        rt.ask("u1", "B").await.unwrap();
        assert!(llm.prompt_text(2).contains(&format!("User question: {QUESTION}")));
        assert_eq!(storage.turns("u1").await.len(), 8);
    }

    #[tokio::test]
    async fn test_continue_after_resolved_question() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_text(QUESTION);
        llm.queue_text(CORRECT);
        llm.queue_text("Next: what is 3x = 9? A) 1 B) 2 C) 3 D) 4");
        let (rt, storage) = runtime(&llm, 6);

        rt.ask("u1", "hi").await.unwrap();
        rt.ask("u1", "Algebra").await.unwrap();
        rt.ask("u1", "B").await.unwrap();
        let next = rt.ask("u1", "yes please").await.unwrap();

        assert_eq!(next.text, "Next: what is 3x = 9? A) 1 B) 2 C) 3 D) 4");
        assert_eq!(
            next.state,
            TutorState::AwaitingAnswer {
                topic: Some("Algebra".to_string()),
                question: next.text.clone(),
            }
        );
        assert!(llm.prompt_text(2).contains("User reply: yes please"));
        assert_eq!(storage.stored_state("u1").await, Some(next.state));
    }

    #[tokio::test]
    async fn test_completion_failure_keeps_state_and_user_turn() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_error(LlmError::new(LlmErrorKind::ServerError, "backend exploded"));
        llm.queue_text(QUESTION);
        let (rt, storage) = runtime(&llm, 6);

        rt.ask("u1", "hi").await.unwrap();
        let err = rt.ask("u1", "Algebra").await.unwrap_err();
        assert_eq!(err.kind, TutorErrorKind::Completion);
        assert_eq!(err.message, "backend exploded");
        assert_eq!(
            storage.turns("u1").await,
            vec![Turn::user("hi"), Turn::assistant(GREETING), Turn::user("Algebra")]
        );
        assert_eq!(storage.stored_state("u1").await, Some(TutorState::AwaitingTopic));

        // Retrying the topic works
        let reply = rt.ask("u1", "Algebra").await.unwrap();
        assert!(reply.text.starts_with(QUESTION_PREFIX));
        assert_eq!(storage.turns("u1").await.len(), 5);
    }

    #[tokio::test]
    async fn test_storage_failure_is_reported() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        let (rt, storage) = runtime(&llm, 6);
        storage.fail_writes(true);

        let err = rt.ask("u1", "hi").await.unwrap_err();
        assert_eq!(err.kind, TutorErrorKind::Storage);
        assert!(storage.turns("u1").await.is_empty());

        storage.fail_writes(false);
        assert_eq!(rt.ask("u1", "hi").await.unwrap().text, GREETING);
    }

    #[tokio::test]
    async fn test_failed_reply_write_leaves_state_in_step_with_turns() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_text(QUESTION);
        llm.queue_text(QUESTION);
        let (rt, storage) = runtime(&llm, 6);

        rt.ask("u1", "hi").await.unwrap();

        // The user turn lands; the reply and its state do not
        storage.fail_after_writes(1);
        let err = rt.ask("u1", "Algebra").await.unwrap_err();
        assert_eq!(err.kind, TutorErrorKind::Storage);
        assert_eq!(
            storage.turns("u1").await,
            vec![Turn::user("hi"), Turn::assistant(GREETING), Turn::user("Algebra")]
        );
        assert_eq!(storage.stored_state("u1").await, Some(TutorState::AwaitingTopic));

        storage.fail_writes(false);
        let reply = rt.ask("u1", "Algebra").await.unwrap();
        assert_eq!(reply.text, format!("{QUESTION_PREFIX}{QUESTION}"));
        assert_eq!(storage.stored_state("u1").await, Some(reply.state));
        assert_eq!(storage.turns("u1").await.len(), 5);
    }

    #[tokio::test]
    async fn test_empty_user_id_is_rejected() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        let (rt, storage) = runtime(&llm, 6);

        let err = rt.ask("", "hi").await.unwrap_err();
        assert_eq!(err.kind, TutorErrorKind::InvalidRequest);
        assert!(storage.turns("").await.is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_user_id_is_accepted() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        let (rt, storage) = runtime(&llm, 6);

        assert_eq!(rt.ask(" ", "hi").await.unwrap().text, GREETING);
        assert_eq!(storage.turns(" ").await.len(), 2);
        assert!(storage.turns("").await.is_empty());
    }

    #[tokio::test]
    async fn test_history_window_limits_context() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_text(QUESTION);
        llm.queue_text(CORRECT);
        let (rt, _) = runtime(&llm, 2);

        rt.ask("u1", "hi").await.unwrap();
        rt.ask("u1", "Algebra").await.unwrap();
        rt.ask("u1", "B").await.unwrap();

        let prompt = llm.prompt_text(1);
        assert!(prompt.starts_with("Recent conversation:\nUser: Algebra\nTutor: Great choice!"));
        assert!(!prompt.contains(GREETING));
    }

    #[tokio::test]
    async fn test_zero_window_sends_no_context() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_text(QUESTION);
        llm.queue_text(CORRECT);
        let (rt, _) = runtime(&llm, 0);

        rt.ask("u1", "hi").await.unwrap();
        rt.ask("u1", "Algebra").await.unwrap();
        rt.ask("u1", "B").await.unwrap();

        assert_eq!(
            llm.prompt_text(1),
            format!("User question: {QUESTION}\nUser answer: B")
        );
    }

    #[tokio::test]
    async fn test_state_recovered_from_legacy_history() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_text(QUESTION);
        let (rt, storage) = runtime(&llm, 0);
        storage
            .seed("legacy", &[Turn::user("hi"), Turn::assistant(GREETING)])
            .await;

        let reply = rt.ask("legacy", "Biology").await.unwrap();
        assert!(reply.text.starts_with(QUESTION_PREFIX));
        assert_eq!(llm.prompt_text(0), "User topic: Biology");
    }

    #[tokio::test]
    async fn test_legacy_open_question_is_evaluated() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_text(CORRECT);
        let (rt, storage) = runtime(&llm, 0);
        storage
            .seed(
                "legacy",
                &[
                    Turn::user("hi"),
                    Turn::assistant(GREETING),
                    Turn::user("Algebra"),
                    Turn::assistant(format!("{QUESTION_PREFIX}{QUESTION}")),
                ],
            )
            .await;

        let reply = rt.ask("legacy", "B").await.unwrap();
        assert_eq!(reply.text, CORRECT);
        assert_eq!(
            llm.prompt_text(0),
            format!("User question: {QUESTION_PREFIX}{QUESTION}\nUser answer: B")
        );
    }

    #[tokio::test]
    async fn test_concurrent_requests_for_same_user_are_serialized() {
        let llm = Arc::new(DelayedMockLlmClient::new("mock", Duration::from_millis(50)));
        llm.queue_text(QUESTION);
        let storage = Arc::new(InMemoryStorage::new());
        let rt = TutorRuntime::new(storage.clone(), llm.clone(), 6);

        let (a, b) = tokio::join!(rt.ask("u1", "first"), rt.ask("u1", "second"));
        let mut replies = [a.unwrap().text, b.unwrap().text];
        replies.sort();

        // One request saw an empty conversation, the other saw the greeting
        assert!(replies.contains(&GREETING.to_string()));
        assert!(replies.iter().any(|r| r.starts_with(QUESTION_PREFIX)));
        assert_eq!(llm.recorded_requests().len(), 1);

        let turns = storage.turns("u1").await;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[1], Turn::assistant(GREETING));
    }

    #[tokio::test]
    async fn test_different_users_do_not_wait_on_each_other() {
        let llm = Arc::new(DelayedMockLlmClient::new("mock", Duration::from_millis(200)));
        llm.queue_text(QUESTION);
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .seed("slow", &[Turn::user("hi"), Turn::assistant(GREETING)])
            .await;
        let rt = Arc::new(TutorRuntime::new(storage, llm.clone(), 6));

        let started = llm.request_started.clone();
        let notified = started.notified();
        let slow = tokio::spawn({
            let rt = rt.clone();
            async move { rt.ask("slow", "Algebra").await }
        });
        notified.await;

        // The slow user's lock is held; another user is still served
        let fast = tokio::time::timeout(Duration::from_millis(100), rt.ask("fast", "hi"))
            .await
            .expect("other user was blocked")
            .unwrap();
        assert_eq!(fast.text, GREETING);
        assert!(slow.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_conversation_view() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        let (rt, _) = runtime(&llm, 6);

        let empty = rt.conversation("nobody").await.unwrap();
        assert_eq!(empty.state, TutorState::New);
        assert!(empty.turns.is_empty());

        rt.ask("u1", "hi").await.unwrap();
        let view = rt.conversation("u1").await.unwrap();
        assert_eq!(view.state, TutorState::AwaitingTopic);
        assert_eq!(view.turns.len(), 2);
        assert_eq!(view.turns[0].sequence_id, 1);
        assert_eq!(view.turns[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_scenario_against_database() {
        let llm = Arc::new(MockLlmClient::new("mock"));
        llm.queue_text(QUESTION);
        let storage = DatabaseStorage::new(Database::open_in_memory().unwrap());
        let rt = TutorRuntime::new(storage.clone(), llm, 6);

        assert_eq!(rt.ask("u1", "Algebra").await.unwrap().text, GREETING);
        rt.ask("u1", "Algebra").await.unwrap();

        let history = storage.get_history("u1").await.unwrap();
        let sequence: Vec<i64> = history.iter().map(|t| t.sequence_id).collect();
        assert_eq!(sequence, vec![1, 2, 3, 4]);
        assert_eq!(
            storage.get_state("u1").await.unwrap(),
            Some(TutorState::AwaitingAnswer {
                topic: Some("Algebra".to_string()),
                question: QUESTION.to_string(),
            })
        );
    }
}
