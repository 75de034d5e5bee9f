//! Events that drive the conversation

use std::fmt;
use uuid::Uuid;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The `/start` command
    Start,
    /// A button press carrying an action token
    Selection(Action),
    /// Raw message text
    Text(String),
}

/// Menu actions, parsed from stable callback tokens.
///
/// The tokens are the contract with button callbacks and must not change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AiChat,
    AiLearning,
    AskAi,
    AiWriting,
    CreatePosts,
    WritePost,
    AiGeneratePost,
    SelectChannels,
    ToggleChannel(String),
    ChannelsDone,
    PreviewPost,
    SchedulePost,
    PostNow,
    CancelSchedule(Uuid),
    Help,
    ManageChannels,
    BackMenu,
    /// A token this version does not know; always an invalid selection
    Unknown(String),
}

const TOGGLE_PREFIX: &str = "toggle_channel:";
/// Telegram's cap on `callback_data`, in bytes
pub const CALLBACK_DATA_LIMIT: usize = 64;
/// Longest channel key whose toggle token still fits in a button
pub const MAX_CHANNEL_KEY_LEN: usize = CALLBACK_DATA_LIMIT - TOGGLE_PREFIX.len();
const CANCEL_PREFIX: &str = "cancel_schedule:";

impl Action {
    /// Parse a callback token. Never fails: unknown tokens become [`Action::Unknown`].
    pub fn parse(token: &str) -> Self {
        match token {
            "ai_chat" => Action::AiChat,
            "ai_learning" => Action::AiLearning,
            "ask_ai" => Action::AskAi,
            "ai_writing" => Action::AiWriting,
            "create_posts" => Action::CreatePosts,
            "write_post" => Action::WritePost,
            "ai_generate_post" => Action::AiGeneratePost,
            "select_channels" => Action::SelectChannels,
            "channels_done" => Action::ChannelsDone,
            "preview_post" => Action::PreviewPost,
            "schedule_post" => Action::SchedulePost,
            "post_now" => Action::PostNow,
            "help" => Action::Help,
            "manage_channels" => Action::ManageChannels,
            "back_menu" => Action::BackMenu,
            other => {
                if let Some(key) = other.strip_prefix(TOGGLE_PREFIX).filter(|k| !k.is_empty()) {
                    Action::ToggleChannel(key.to_string())
                } else if let Some(id) = other
                    .strip_prefix(CANCEL_PREFIX)
                    .and_then(|id| Uuid::parse_str(id).ok())
                {
                    Action::CancelSchedule(id)
                } else {
                    Action::Unknown(other.to_string())
                }
            }
        }
    }

    /// The wire token for this action
    pub fn token(&self) -> String {
        match self {
            Action::ToggleChannel(key) => format!("{TOGGLE_PREFIX}{key}"),
            Action::CancelSchedule(id) => format!("{CANCEL_PREFIX}{id}"),
            Action::Unknown(token) => token.clone(),
            simple => simple.simple_token().to_string(),
        }
    }

    fn simple_token(&self) -> &'static str {
        match self {
            Action::AiChat => "ai_chat",
            Action::AiLearning => "ai_learning",
            Action::AskAi => "ask_ai",
            Action::AiWriting => "ai_writing",
            Action::CreatePosts => "create_posts",
            Action::WritePost => "write_post",
            Action::AiGeneratePost => "ai_generate_post",
            Action::SelectChannels => "select_channels",
            Action::ChannelsDone => "channels_done",
            Action::PreviewPost => "preview_post",
            Action::SchedulePost => "schedule_post",
            Action::PostNow => "post_now",
            Action::Help => "help",
            Action::ManageChannels => "manage_channels",
            Action::BackMenu => "back_menu",
            Action::ToggleChannel(_) | Action::CancelSchedule(_) | Action::Unknown(_) => "",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}
