//! Prompt construction for AI round-trips
//!
//! A prompt is the mode instruction, the last few turns as `role: text`
//! lines, and the new user line.

use crate::session::{ConversationHistory, REPLAY_WINDOW};
use crate::state_machine::Mode;
use std::fmt::Write;

const LEARNING_INSTRUCTION: &str =
    "You are an expert educator. Explain clearly and educatingly. ";
const WRITING_INSTRUCTION: &str =
    "You are a creative writing expert. Help with creative content. ";

/// Template used when the AI writes a post
const POST_TEMPLATE: &str = "Write a professional social media post about: ";

/// System instruction for a mode; Chat and QnA have none
pub fn instruction(mode: Mode) -> &'static str {
    match mode {
        Mode::Chat | Mode::QnA => "",
        Mode::Learning => LEARNING_INSTRUCTION,
        Mode::Writing => WRITING_INSTRUCTION,
    }
}

/// Build the prompt for `text` given the stored history
pub fn build_prompt(mode: Mode, history: &ConversationHistory, text: &str) -> String {
    let mut prompt = String::from(instruction(mode));
    for turn in history.recent(REPLAY_WINDOW) {
        let _ = writeln!(prompt, "{}: {}", turn.role.as_str(), turn.text);
    }
    let _ = writeln!(prompt, "user: {text}");
    prompt
}

/// The user text sent for an AI-written post
pub fn post_request(topic: &str) -> String {
    format!("{POST_TEMPLATE}{topic}")
}

/// Reply text shown when the AI call fails
pub fn error_reply(message: &str) -> String {
    format!("❌ Error: {message}")
}
