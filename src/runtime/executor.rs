//! Conversation runtime executor

use super::traits::{AiClient, Transport, TransportError};
use super::Inbound;

use crate::channels::ChannelRegistry;
use crate::chunker::{chunk, MESSAGE_LIMIT};
use crate::llm::LlmError;
use crate::posts::{self, Publisher};
use crate::prompt::{build_prompt, error_reply, post_request};
use crate::render::{notice, render, Button, Keyboard, Rendered};
use crate::scheduler::BroadcastScheduler;
use crate::session::{ChatId, ConversationTurn, MessageId, Session, SessionStore};
use crate::state_machine::{
    current_screen, transition, Action, Effect, Mode, TransitionContext, TransitionResult,
};
use chrono::Utc;
use std::sync::Arc;

/// Where replies for the current event go.
///
/// The first rendered screen replaces the message whose button was pressed;
/// everything after that is sent as a new message.
struct Outbox {
    chat: ChatId,
    edit: Option<MessageId>,
}

/// Executes state machine effects for every user against shared collaborators
pub struct ConversationRuntime {
    sessions: Arc<SessionStore>,
    transport: Arc<dyn Transport>,
    ai: Arc<dyn AiClient>,
    channels: Arc<ChannelRegistry>,
    publisher: Arc<Publisher>,
    scheduler: Arc<BroadcastScheduler>,
}

impl ConversationRuntime {
    pub fn new(
        sessions: Arc<SessionStore>,
        ai: Arc<dyn AiClient>,
        publisher: Arc<Publisher>,
        scheduler: Arc<BroadcastScheduler>,
    ) -> Self {
        Self {
            sessions,
            transport: Arc::clone(publisher.transport()),
            ai,
            channels: Arc::clone(publisher.channels()),
            publisher,
            scheduler,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle one inbound event for one user.
    ///
    /// The user's session stays locked until every effect has run, so a
    /// user's events never interleave. Events dispatched concurrently for
    /// one user race for the lock; their order is not guaranteed.
    pub async fn process_event(&self, inbound: Inbound) -> Result<(), TransportError> {
        if let Some(callback_id) = &inbound.callback_id {
            if let Err(e) = self.transport.answer_callback(callback_id).await {
                tracing::debug!(error = %e, "Failed to answer callback query");
            }
        }

        let mut session = self.sessions.lock(inbound.user, inbound.chat).await;
        let now = Utc::now();
        session.last_active = now;
        session.chat = inbound.chat;

        let ctx = TransitionContext::new(session.draft.is_some(), now);
        let result = match transition(&session.state, &ctx, inbound.event) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(user_id = %inbound.user, error = %e, "Invalid selection, re-rendering");
                TransitionResult::new(session.state)
                    .with_effect(Effect::render(current_screen(&session.state, ctx.has_draft)))
            }
        };

        if result.new_state != session.state {
            tracing::debug!(
                user_id = %inbound.user,
                from = session.state.name(),
                to = result.new_state.name(),
                "State transition"
            );
        }
        session.state = result.new_state;

        let mut outbox = Outbox {
            chat: inbound.chat,
            edit: inbound.message,
        };
        for effect in result.effects {
            self.execute_effect(&mut session, &mut outbox, effect).await?;
        }
        Ok(())
    }

    async fn execute_effect(
        &self,
        session: &mut Session,
        outbox: &mut Outbox,
        effect: Effect,
    ) -> Result<(), TransportError> {
        match effect {
            Effect::ResetConversation { mode } => {
                tracing::info!(user_id = %session.user, mode = mode.as_str(), "Conversation reset");
                session.reset_conversation(mode);
                Ok(())
            }

            Effect::SendTyping => {
                if let Err(e) = self.transport.send_typing(outbox.chat).await {
                    tracing::debug!(chat_id = %outbox.chat, error = %e, "Typing indicator failed");
                }
                Ok(())
            }

            Effect::AskAi { text } => {
                let mode = session.mode;
                let reply = match self.ask(session, mode, &text).await {
                    Ok(reply) => reply,
                    Err(e) => error_reply(&e.message),
                };
                for part in chunk(&reply, MESSAGE_LIMIT) {
                    self.transport.send_message(outbox.chat, &part, None).await?;
                }
                Ok(())
            }

            Effect::CreateDraft { content } => {
                posts::submit_content(session, content);
                tracing::info!(user_id = %session.user, "Draft written");
                Ok(())
            }

            Effect::GenerateDraft { topic } => {
                match self.ask(session, Mode::Writing, &post_request(&topic)).await {
                    Ok(content) => {
                        posts::submit_content(session, content);
                        tracing::info!(user_id = %session.user, "Draft generated");
                    }
                    Err(e) => {
                        self.send(outbox.chat, &notice(error_reply(&e.message)))
                            .await?;
                    }
                }
                Ok(())
            }

            Effect::ToggleChannel { key } => {
                match posts::toggle_channel(session, &self.channels, &key) {
                    Ok(selected) => {
                        tracing::debug!(user_id = %session.user, channel = %key, selected, "Channel toggled");
                    }
                    Err(e) => self.send(outbox.chat, &notice(e.to_string())).await?,
                }
                Ok(())
            }

            Effect::PublishNow => {
                let text = match posts::publish_now(session, &self.publisher).await {
                    Ok(report) => report.summary(),
                    Err(e) => e.to_string(),
                };
                self.transport.send_message(outbox.chat, &text, None).await?;
                Ok(())
            }

            Effect::ScheduleDraft { due_at } => {
                let rendered = match posts::schedule(session, due_at) {
                    Ok(post) => {
                        let id = self.scheduler.schedule(post);
                        Rendered {
                            text: format!(
                                "⏰ Scheduled for {}",
                                due_at.format("%Y-%m-%d %H:%M UTC")
                            ),
                            keyboard: Some(Keyboard::default().row([Button::new(
                                "🚫 Cancel",
                                Action::CancelSchedule(id),
                            )])),
                        }
                    }
                    Err(e) => notice(e.to_string()),
                };
                self.send(outbox.chat, &rendered).await
            }

            Effect::CancelScheduled { id } => {
                let text = match self.scheduler.cancel_owned(id, session.user) {
                    Ok(_) => "🚫 Scheduled post cancelled.".to_string(),
                    Err(e) => e.to_string(),
                };
                self.send(outbox.chat, &notice(text)).await
            }

            Effect::Render(screen) => {
                let rendered = render(&screen, session, &self.channels);
                self.show(outbox, &rendered).await
            }
        }
    }

    /// One AI round-trip. The user turn is always recorded; the reply only on success.
    async fn ask(&self, session: &mut Session, mode: Mode, text: &str) -> Result<String, LlmError> {
        let prompt = build_prompt(mode, &session.history, text);
        session.history.push(ConversationTurn::user(text));

        match self.ai.generate(&prompt).await {
            Ok(reply) => {
                session.history.push(ConversationTurn::assistant(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!(
                    user_id = %session.user,
                    kind = ?e.kind,
                    error = %e.message,
                    "AI request failed"
                );
                Err(e)
            }
        }
    }

    async fn send(&self, chat: ChatId, rendered: &Rendered) -> Result<(), TransportError> {
        self.transport
            .send_message(chat, &rendered.text, rendered.keyboard.as_ref())
            .await
            .map(|_| ())
    }

    /// Edit the pressed message if there is one, otherwise send
    async fn show(&self, outbox: &mut Outbox, rendered: &Rendered) -> Result<(), TransportError> {
        if let Some(message) = outbox.edit.take() {
            match self
                .transport
                .edit_message(outbox.chat, message, &rendered.text, rendered.keyboard.as_ref())
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(chat_id = %outbox.chat, error = %e, "Edit failed, sending instead");
                }
            }
        }
        self.send(outbox.chat, rendered).await
    }
}
