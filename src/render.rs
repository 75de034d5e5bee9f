//! Screen rendering: text plus inline keyboard for each [`Screen`]

use crate::channels::ChannelRegistry;
use crate::session::{PostDraft, Session};
use crate::state_machine::{Action, Mode, Screen};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub action: Action,
}

impl Button {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            action,
        }
    }
}

/// Inline keyboard, one inner vec per row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn row(mut self, buttons: impl IntoIterator<Item = Button>) -> Self {
        self.rows.push(buttons.into_iter().collect());
        self
    }

    pub fn button(self, label: &str, action: Action) -> Self {
        self.row([Button::new(label, action)])
    }

    /// Every action reachable from this keyboard
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.rows.iter().flatten().map(|b| &b.action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

impl Rendered {
    fn new(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

fn back_keyboard() -> Keyboard {
    Keyboard::default().button("⬅️ Back Menu", Action::BackMenu)
}

fn menu_keyboard() -> Keyboard {
    Keyboard::default()
        .row([
            Button::new("💬 AI Chat", Action::AiChat),
            Button::new("📝 Create Posts", Action::CreatePosts),
        ])
        .row([
            Button::new("⏰ Schedule Post", Action::SchedulePost),
            Button::new("🎓 AI Learning", Action::AiLearning),
        ])
        .row([
            Button::new("🔍 Ask AI", Action::AskAi),
            Button::new("✍️ AI Writing", Action::AiWriting),
        ])
        .row([
            Button::new("📊 Channels", Action::ManageChannels),
            Button::new("❓ Help", Action::Help),
        ])
}

fn draft_keyboard() -> Keyboard {
    Keyboard::default()
        .button("📍 Select Channels", Action::SelectChannels)
        .button("👁️ Preview", Action::PreviewPost)
        .button("⏰ Schedule", Action::SchedulePost)
        .button("✅ Post Now", Action::PostNow)
        .button("⬅️ Back", Action::BackMenu)
}

fn mode_intro(mode: Mode) -> &'static str {
    match mode {
        Mode::Chat => "💬 AI Chat\n\nSend me any message and I'll answer it.",
        Mode::Learning => "🎓 AI Learning\n\nAsk about any topic and I'll explain it step by step.",
        Mode::QnA => "🔍 Ask AI\n\nAsk a question and get a direct answer.",
        Mode::Writing => "✍️ AI Writing\n\nTell me what to write: stories, captions, articles.",
    }
}

/// Draft content followed by its channel selection
pub fn preview_text(draft: &PostDraft) -> String {
    let mut text = format!("👁️ Preview\n\n{}\n\n📍 Channels: ", draft.content);
    if draft.selected_channels.is_empty() {
        text.push_str("none selected");
    } else {
        let keys: Vec<&str> = draft.selected_channels.iter().map(String::as_str).collect();
        text.push_str(&keys.join(", "));
    }
    text
}

/// Render `screen` for the session
pub fn render(screen: &Screen, session: &Session, channels: &ChannelRegistry) -> Rendered {
    match screen {
        Screen::Menu => Rendered::new(
            "🤖 Welcome to Herald!\n\nChat with AI, write posts and broadcast them to your channels.\nChoose an option:",
            menu_keyboard(),
        ),
        Screen::ModeIntro => Rendered::new(mode_intro(session.mode), back_keyboard()),
        Screen::PostMenu => Rendered::new(
            "📝 Create Posts\n\nWrite a post yourself or let the AI draft one.",
            Keyboard::default()
                .button("📝 Write Post", Action::WritePost)
                .button("🤖 AI Generate", Action::AiGeneratePost)
                .button("⬅️ Back Menu", Action::BackMenu),
        ),
        Screen::WritePrompt => Rendered::new(
            "📝 Send the text of your post.",
            Keyboard::default().button("⬅️ Cancel", Action::BackMenu),
        ),
        Screen::GeneratePrompt => Rendered::new(
            "🤖 What should the post be about?",
            Keyboard::default().button("⬅️ Cancel", Action::BackMenu),
        ),
        Screen::DraftActions => match &session.draft {
            Some(draft) => Rendered::new(
                format!("✅ Post ready!\n\n{}", draft.content),
                draft_keyboard(),
            ),
            None => render(&Screen::PostMenu, session, channels),
        },
        Screen::ChannelPicker => {
            let selected = session.draft.as_ref().map(|d| &d.selected_channels);
            let mut keyboard = Keyboard::default();
            for channel in channels.iter() {
                let mark = if selected.is_some_and(|s| s.contains(&channel.key)) {
                    "✅"
                } else {
                    "⬜"
                };
                keyboard = keyboard.button(
                    &format!("{mark} {}", channel.key),
                    Action::ToggleChannel(channel.key.clone()),
                );
            }
            let text = if channels.is_empty() {
                "📍 No channels are configured."
            } else {
                "📍 Select the channels to post to:"
            };
            Rendered::new(text, keyboard.button("✔️ Done", Action::ChannelsDone))
        }
        Screen::Preview => match &session.draft {
            Some(draft) => Rendered::new(preview_text(draft), draft_keyboard()),
            None => render(&Screen::PostMenu, session, channels),
        },
        Screen::SchedulePrompt => Rendered::new(
            "⏰ When should this post go out?\n\nExamples: 30m, 2h, 1d, 2026-05-01 09:00 (UTC)",
            back_keyboard(),
        ),
        Screen::ScheduleRejected(reason) => Rendered::new(
            format!("⚠️ {reason}\n\nWhen should this post go out?"),
            back_keyboard(),
        ),
        Screen::Help => Rendered::new(
            "❓ Help\n\n\
             💬 AI Chat, 🎓 Learning, 🔍 Ask AI and ✍️ Writing start a fresh conversation.\n\
             📝 Create Posts lets you write or generate a post, pick channels and publish it.\n\
             ⏰ Schedule sends the current draft later.\n\
             /start returns to this menu at any time.",
            back_keyboard(),
        ),
        Screen::ChannelList => {
            let mut text = String::from("📊 Channels\n\n");
            if channels.is_empty() {
                text.push_str("No channels are configured.");
            }
            for channel in channels.iter() {
                let _ = writeln!(text, "• {} ({})", channel.key, channel.chat_id);
            }
            Rendered::new(text, back_keyboard())
        }
    }
}

/// Plain notice with a way back to the menu
pub fn notice(text: impl Into<String>) -> Rendered {
    Rendered::new(text, back_keyboard())
}
