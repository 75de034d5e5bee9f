//! Pure state transition function

use super::effect::{Effect, Screen};
use super::event::{Action, Event};
use super::state::{ConvState, Mode, PostAction};
use crate::scheduler::parse_due_time;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Read-only facts about the session that transitions depend on
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext {
    pub has_draft: bool,
    pub now: DateTime<Utc>,
}

impl TransitionContext {
    pub fn new(has_draft: bool, now: DateTime<Utc>) -> Self {
        Self { has_draft, now }
    }
}

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConvState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: ConvState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Selection '{token}' is not valid in state {state}")]
    InvalidSelection { token: String, state: &'static str },
}

/// The screen a state shows when re-rendered
pub fn current_screen(state: &ConvState, has_draft: bool) -> Screen {
    match state {
        ConvState::Menu => Screen::Menu,
        ConvState::ChatMode => Screen::ModeIntro,
        ConvState::PostMode { action: Some(PostAction::Write) } => Screen::WritePrompt,
        ConvState::PostMode { action: Some(PostAction::Generate) } => Screen::GeneratePrompt,
        ConvState::PostMode { action: None } if has_draft => Screen::DraftActions,
        ConvState::PostMode { action: None } => Screen::PostMenu,
        ConvState::ChannelMode => Screen::ChannelPicker,
        ConvState::ScheduleMode => Screen::SchedulePrompt,
    }
}

fn enter_mode(mode: Mode) -> TransitionResult {
    TransitionResult::new(ConvState::ChatMode)
        .with_effect(Effect::ResetConversation { mode })
        .with_effect(Effect::render(Screen::ModeIntro))
}

fn stay(state: ConvState, screen: Screen) -> TransitionResult {
    TransitionResult::new(state).with_effect(Effect::render(screen))
}

/// Pure transition function.
///
/// Given the same inputs it always produces the same outputs. Free text
/// never fails; selections fail only with [`TransitionError::InvalidSelection`],
/// which callers recover from by re-rendering the current screen.
pub fn transition(
    state: &ConvState,
    ctx: &TransitionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match event {
        Event::Start => Ok(stay(ConvState::Menu, Screen::Menu)),
        Event::Selection(action) => select(*state, ctx, action),
        Event::Text(text) => Ok(free_text(*state, ctx, text)),
    }
}

fn select(
    state: ConvState,
    ctx: &TransitionContext,
    action: Action,
) -> Result<TransitionResult, TransitionError> {
    let draft_stage = matches!(
        state,
        ConvState::PostMode { .. } | ConvState::ChannelMode
    ) && ctx.has_draft;

    match (state, action) {
        // Leaving to the menu drops any pending post action with the PostMode variant
        (_, Action::BackMenu) => Ok(stay(ConvState::Menu, Screen::Menu)),

        (_, Action::CancelSchedule(id)) => Ok(TransitionResult::new(state)
            .with_effect(Effect::CancelScheduled { id })),

        (ConvState::Menu, Action::AiChat) => Ok(enter_mode(Mode::Chat)),
        (ConvState::Menu, Action::AiLearning) => Ok(enter_mode(Mode::Learning)),
        (ConvState::Menu, Action::AskAi) => Ok(enter_mode(Mode::QnA)),
        (ConvState::Menu, Action::AiWriting) => Ok(enter_mode(Mode::Writing)),
        (ConvState::Menu, Action::CreatePosts) => {
            Ok(stay(ConvState::PostMode { action: None }, Screen::PostMenu))
        }
        (ConvState::Menu, Action::Help) => Ok(stay(ConvState::Menu, Screen::Help)),
        (ConvState::Menu, Action::ManageChannels) => {
            Ok(stay(ConvState::Menu, Screen::ChannelList))
        }
        (ConvState::Menu, Action::SchedulePost) if ctx.has_draft => {
            Ok(stay(ConvState::ScheduleMode, Screen::SchedulePrompt))
        }

        (ConvState::PostMode { .. }, Action::WritePost) => Ok(stay(
            ConvState::PostMode {
                action: Some(PostAction::Write),
            },
            Screen::WritePrompt,
        )),
        (ConvState::PostMode { .. }, Action::AiGeneratePost) => Ok(stay(
            ConvState::PostMode {
                action: Some(PostAction::Generate),
            },
            Screen::GeneratePrompt,
        )),

        (ConvState::PostMode { .. }, Action::SelectChannels) if ctx.has_draft => {
            Ok(stay(ConvState::ChannelMode, Screen::ChannelPicker))
        }
        (ConvState::ChannelMode, Action::ToggleChannel(key)) if ctx.has_draft => {
            Ok(TransitionResult::new(ConvState::ChannelMode)
                .with_effect(Effect::ToggleChannel { key })
                .with_effect(Effect::render(Screen::ChannelPicker)))
        }
        (ConvState::ChannelMode, Action::ChannelsDone) => Ok(stay(
            ConvState::PostMode { action: None },
            Screen::DraftActions,
        )),

        (_, Action::PreviewPost) if draft_stage => Ok(stay(state, Screen::Preview)),
        (_, Action::SchedulePost) if draft_stage => {
            Ok(stay(ConvState::ScheduleMode, Screen::SchedulePrompt))
        }
        (_, Action::PostNow) if draft_stage => {
            Ok(TransitionResult::new(ConvState::PostMode { action: None })
                .with_effect(Effect::PublishNow)
                .with_effect(Effect::render(Screen::DraftActions)))
        }

        (state, action) => Err(TransitionError::InvalidSelection {
            token: action.token(),
            state: state.name(),
        }),
    }
}

fn free_text(state: ConvState, ctx: &TransitionContext, text: String) -> TransitionResult {
    match state {
        ConvState::ChatMode => TransitionResult::new(ConvState::ChatMode)
            .with_effect(Effect::SendTyping)
            .with_effect(Effect::AskAi { text }),

        ConvState::PostMode {
            action: Some(PostAction::Generate),
        } => TransitionResult::new(ConvState::PostMode { action: None })
            .with_effect(Effect::SendTyping)
            .with_effect(Effect::GenerateDraft { topic: text })
            .with_effect(Effect::render(Screen::DraftActions)),

        // No pending action behaves as Write
        ConvState::PostMode { .. } => TransitionResult::new(ConvState::PostMode { action: None })
            .with_effect(Effect::CreateDraft { content: text })
            .with_effect(Effect::render(Screen::DraftActions)),

        ConvState::ScheduleMode => match parse_due_time(&text, ctx.now) {
            Ok(due_at) => TransitionResult::new(ConvState::PostMode { action: None })
                .with_effect(Effect::ScheduleDraft { due_at })
                .with_effect(Effect::render(Screen::DraftActions)),
            Err(e) => stay(ConvState::ScheduleMode, Screen::ScheduleRejected(e.to_string())),
        },

        ConvState::Menu | ConvState::ChannelMode => {
            stay(state, current_screen(&state, ctx.has_draft))
        }
    }
}
