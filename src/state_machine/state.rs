//! Conversation state types

use serde::{Deserialize, Serialize};

/// AI persona selected by the user; orthogonal to [`ConvState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Chat,
    Learning,
    Writing,
    #[serde(rename = "qna")]
    QnA,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Chat => "chat",
            Mode::Learning => "learning",
            Mode::Writing => "writing",
            Mode::QnA => "qna",
        }
    }
}

/// Pending post action awaiting free text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostAction {
    Write,
    Generate,
}

/// Conversation state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvState {
    /// Top-level menu
    #[default]
    Menu,

    /// Free text goes to the AI in the session's mode
    ChatMode,

    /// Post creation; `action` is consumed by the next free text
    PostMode { action: Option<PostAction> },

    /// Toggling target channels for the current draft
    ChannelMode,

    /// Waiting for a due time for the current draft
    ScheduleMode,
}

impl ConvState {
    pub fn name(&self) -> &'static str {
        match self {
            ConvState::Menu => "menu",
            ConvState::ChatMode => "chat_mode",
            ConvState::PostMode { .. } => "post_mode",
            ConvState::ChannelMode => "channel_mode",
            ConvState::ScheduleMode => "schedule_mode",
        }
    }

    /// The pending post action, if any
    pub fn post_action(&self) -> Option<PostAction> {
        match self {
            ConvState::PostMode { action } => *action,
            _ => None,
        }
    }
}
