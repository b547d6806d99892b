//! Tutoring instruction template and prompt rendering
//!
//! The instruction template is sent as the system context of every
//! completion request. The per-request prompt carries the topic, the open
//! question and the user's latest message.

use crate::db::{Role, Turn};
use crate::state_machine::CompletionPrompt;
use std::fmt::Write;

/// Fixed reply to a user's very first message
pub const GREETING: &str = "Hey there! What topic would you like to study?";

/// Lead-in placed before the model's first question on a topic
pub const QUESTION_PREFIX: &str = "Great choice! Here's your first question: ";

/// Phrase the template asks the model to use once an answer is correct
const RESOLUTION_MARKER: &str = "proceed with the next question";

/// Base system prompt establishing the tutor's role
pub const QUIZ_PROMPT: &str = r"You are a quiz tutor. Based on the given topic, generate a quiz question, a broad hint, a more specific hint, and check the user's answer.

You are a friendly and knowledgeable math and science tutor. Your goal is to provide clear, concise, and step-by-step explanations without directly giving answers. Follow these steps:
- Begin with: 'Hey there! What topic would you like to study?'
- After the user specifies a topic, ask a multiple-choice question related to it, offering four options.
- When the user selects an option, provide hints to guide their understanding without revealing the answer.
- If the user answers incorrectly, continue providing hints, moving from broad to more specific, until they arrive at the correct answer.
- The user cannot switch to a different question until they answer the current one correctly.
- Once they get the right answer, congratulate them and ask: 'Would you like to proceed with the next question?'
- Keep responses short, to the point, and focused on fostering the student's learning.

Response Format Example:
1. Initial greeting: 'Hey there! What topic would you like to study?'
2. User response: 'Algebra'
3. Tutor question: 'What's the value of x in 2x + 3 = 7? A) 1, B) 2, C) 3, D) 4'
4. User response: 'A'
5. Tutor hint: 'Try substituting x = 1 into the equation. Does 2(1) + 3 equal 7? Let's rethink the steps!'
6. User response: 'C'
7. Tutor hint: 'Let's break it down: Subtract 3 from both sides first, then divide by 2. Try again!'
8. User response: 'B'
9. Tutor confirmation: 'Great job! 2(2) + 3 = 7, so x = 2 is correct. Would you like to proceed with the next question?'";

/// Whether a model reply closes the open question
pub fn signals_resolution(reply: &str) -> bool {
    reply.to_lowercase().contains(RESOLUTION_MARKER)
}

/// Render the per-request prompt.
///
/// `recent` is the window of prior turns to include as context; it is
/// only used when judging answers, where earlier hints matter.
pub fn render_prompt(prompt: &CompletionPrompt, recent: &[Turn]) -> String {
    let mut out = String::new();
    match prompt {
        CompletionPrompt::Question { topic } => {
            let _ = write!(out, "User topic: {topic}");
        }
        CompletionPrompt::Evaluate { question, answer } => {
            write_recent(&mut out, recent);
            let _ = write!(out, "User question: {question}\nUser answer: {answer}");
        }
        CompletionPrompt::Continue {
            topic,
            question,
            reply,
        } => {
            if let Some(topic) = topic {
                let _ = writeln!(out, "User topic: {topic}");
            }
            let _ = write!(
                out,
                "Previous question (answered correctly): {question}\n\
                 The user was asked whether to proceed with the next question.\n\
                 User reply: {reply}\n\
                 If they want to continue, ask a new multiple-choice question on the same topic with four options. Otherwise, wrap up briefly."
            );
        }
    }
    out
}

fn write_recent(out: &mut String, recent: &[Turn]) {
    if recent.is_empty() {
        return;
    }
    out.push_str("Recent conversation:\n");
    for turn in recent {
        let speaker = match turn.role {
            Role::User => "User",
            Role::Assistant => "Tutor",
        };
        let _ = writeln!(out, "{speaker}: {}", turn.content);
    }
    out.push('\n');
}
