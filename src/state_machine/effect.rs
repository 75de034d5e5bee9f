//! Effects produced by state transitions

use super::state::Mode;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// What the user should be looking at after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Menu,
    /// Intro for the session's current mode
    ModeIntro,
    PostMenu,
    WritePrompt,
    GeneratePrompt,
    DraftActions,
    ChannelPicker,
    Preview,
    SchedulePrompt,
    ScheduleRejected(String),
    Help,
    ChannelList,
}

/// Effects to be executed after a state transition, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Clear history and switch the AI persona
    ResetConversation { mode: Mode },

    /// Show the typing indicator
    SendTyping,

    /// AI round-trip in the session's mode; the reply is chunked and sent
    AskAi { text: String },

    /// Create or replace the draft with verbatim content
    CreateDraft { content: String },

    /// Create or replace the draft with AI-written content
    GenerateDraft { topic: String },

    /// Flip membership of a channel in the draft's selection
    ToggleChannel { key: String },

    /// Deliver the draft to every selected channel and report
    PublishNow,

    /// Snapshot the draft into the broadcast scheduler
    ScheduleDraft { due_at: DateTime<Utc> },

    /// Cancel a pending scheduled post
    CancelScheduled { id: Uuid },

    /// Show a screen
    Render(Screen),
}

impl Effect {
    pub fn render(screen: Screen) -> Self {
        Effect::Render(screen)
    }
}
