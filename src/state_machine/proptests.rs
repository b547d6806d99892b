//! Property-based tests for the tutor state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::db::Turn;
use crate::tutor_prompt::{GREETING, QUESTION_PREFIX};
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ?!.,]{0,40}"
}

fn arb_topic() -> impl Strategy<Value = Option<String>> {
    proptest::option::of(arb_text())
}

fn arb_stable_state() -> impl Strategy<Value = TutorState> {
    prop_oneof![
        Just(TutorState::New),
        Just(TutorState::AwaitingTopic),
        (arb_topic(), arb_text())
            .prop_map(|(topic, question)| TutorState::AwaitingAnswer { topic, question }),
        (arb_topic(), arb_text())
            .prop_map(|(topic, question)| TutorState::QuestionResolved { topic, question }),
    ]
}

fn arb_transient_state() -> impl Strategy<Value = TutorState> {
    prop_oneof![
        arb_text().prop_map(|topic| TutorState::GeneratingQuestion { topic }),
        (arb_topic(), arb_text(), arb_text()).prop_map(|(topic, question, answer)| {
            TutorState::Evaluating {
                topic,
                question,
                answer,
            }
        }),
        (arb_topic(), arb_text(), arb_text()).prop_map(|(topic, question, reply)| {
            TutorState::GeneratingNext {
                topic,
                question,
                reply,
            }
        }),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        arb_text().prop_map(|text| Event::UserMessage { text }),
        arb_text().prop_map(|text| Event::CompletionReady { text }),
        arb_text().prop_map(|message| Event::CompletionFailed { message }),
    ]
}

fn arb_turn() -> impl Strategy<Value = Turn> {
    (any::<bool>(), arb_text()).prop_map(|(is_user, text)| {
        if is_user {
            Turn::user(text)
        } else {
            Turn::assistant(text)
        }
    })
}

fn reply_text(effects: &[Effect]) -> Option<&str> {
    effects.iter().find_map(|e| match e {
        Effect::Reply { text } => Some(text.as_str()),
        _ => None,
    })
}

/// Drive a stable state through one full request with a successful completion
fn run_request(state: &TutorState, message: &str, model_text: &str) -> (TutorState, Vec<Effect>) {
    let first = transition(
        state,
        Event::UserMessage {
            text: message.to_string(),
        },
    )
    .unwrap();
    let mut effects = first.effects;
    if !first.new_state.is_transient() {
        return (first.new_state, effects);
    }

    let second = transition(
        &first.new_state,
        Event::CompletionReady {
            text: model_text.to_string(),
        },
    )
    .unwrap();
    effects.extend(second.effects);
    (second.new_state, effects)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_user_message_persists_user_turn_first(state in arb_stable_state(), text in arb_text()) {
        let result = transition(&state, Event::UserMessage { text: text.clone() }).unwrap();
        let user_turns = result
            .effects
            .iter()
            .filter(|e| matches!(e, Effect::PersistUserTurn { .. }))
            .count();
        prop_assert_eq!(user_turns, 1);
        prop_assert_eq!(&result.effects[0], &Effect::persist_user_turn(text));
    }

    #[test]
    fn prop_transient_state_never_persisted(
        state in prop_oneof![arb_stable_state(), arb_transient_state()],
        event in arb_event(),
    ) {
        if let Ok(result) = transition(&state, event) {
            if result.effects.iter().any(|e| matches!(e, Effect::PersistAssistantTurn { .. })) {
                prop_assert!(!result.new_state.is_transient());
            }
        }
    }

    #[test]
    fn prop_full_request_ends_stable_with_matching_turn_and_reply(
        state in arb_stable_state(),
        message in arb_text(),
        model_text in arb_text(),
    ) {
        let (new_state, effects) = run_request(&state, &message, &model_text);
        prop_assert!(!new_state.is_transient());

        let assistant: Vec<&Effect> = effects
            .iter()
            .filter(|e| matches!(e, Effect::PersistAssistantTurn { .. }))
            .collect();
        prop_assert_eq!(assistant.len(), 1);

        let reply = reply_text(&effects).unwrap();
        prop_assert_eq!(assistant[0], &Effect::persist_assistant_turn(reply));

        match state {
            TutorState::New => prop_assert_eq!(reply, GREETING),
            TutorState::AwaitingTopic => {
                prop_assert_eq!(reply, format!("{QUESTION_PREFIX}{model_text}"));
            }
            _ => prop_assert_eq!(reply, model_text.as_str()),
        }
    }

    #[test]
    fn prop_failed_completion_restores_pre_request_state(
        state in arb_stable_state(),
        message in arb_text(),
        error in arb_text(),
    ) {
        let first = transition(&state, Event::UserMessage { text: message }).unwrap();
        if first.new_state.is_transient() {
            let failed = transition(&first.new_state, Event::CompletionFailed { message: error }).unwrap();
            prop_assert_eq!(failed.new_state, state);
            prop_assert!(failed.effects.is_empty());
        }
    }

    #[test]
    fn prop_transient_states_reject_user_messages(state in arb_transient_state(), text in arb_text()) {
        prop_assert_eq!(
            transition(&state, Event::UserMessage { text }).unwrap_err(),
            TransitionError::Busy
        );
    }

    #[test]
    fn prop_recovery_is_new_only_for_empty_history(history in proptest::collection::vec(arb_turn(), 0..8)) {
        let recovered = TutorState::recover_from_history(&history);
        prop_assert_eq!(recovered == TutorState::New, history.is_empty());
        prop_assert!(!recovered.is_transient());
    }
}
