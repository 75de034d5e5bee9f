//! Post lifecycle: drafting, channel selection and delivery
//!
//! Draft operations act on a locked [`Session`]. Delivery goes through a
//! [`Publisher`], which fans a post out to every selected channel at once
//! and records one outcome per channel.

use crate::channels::ChannelRegistry;
use crate::render::preview_text;
use crate::runtime::{Transport, TransportError};
use crate::scheduler::ScheduledPost;
use crate::session::{ChatId, MessageId, PostDraft, Session};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PostError {
    #[error("There is no post draft yet. Write or generate one first.")]
    NoDraft,
    #[error("Select at least one channel first.")]
    NoChannelsSelected,
    #[error("Unknown channel '{0}'")]
    UnknownChannel(String),
}

/// Create or replace the user's draft with an empty channel selection
pub fn submit_content(session: &mut Session, content: String) -> &PostDraft {
    session.draft.insert(PostDraft::new(session.user, content))
}

/// Flip `key` in the draft's selection. Returns whether it is now selected.
pub fn toggle_channel(
    session: &mut Session,
    channels: &ChannelRegistry,
    key: &str,
) -> Result<bool, PostError> {
    if !channels.contains(key) {
        return Err(PostError::UnknownChannel(key.to_string()));
    }
    let draft = session.draft.as_mut().ok_or(PostError::NoDraft)?;
    if draft.selected_channels.remove(key) {
        Ok(false)
    } else {
        draft.selected_channels.insert(key.to_string());
        Ok(true)
    }
}

pub fn preview(session: &Session) -> Result<String, PostError> {
    session.draft.as_ref().map(preview_text).ok_or(PostError::NoDraft)
}

/// The draft, provided it can be delivered somewhere
fn deliverable(session: &Session) -> Result<&PostDraft, PostError> {
    let draft = session.draft.as_ref().ok_or(PostError::NoDraft)?;
    if draft.selected_channels.is_empty() {
        return Err(PostError::NoChannelsSelected);
    }
    Ok(draft)
}

/// Deliver the draft to all its channels now
pub async fn publish_now(
    session: &Session,
    publisher: &Publisher,
) -> Result<DeliveryReport, PostError> {
    let draft = deliverable(session)?;
    Ok(publisher
        .deliver(&draft.content, &draft.selected_channels)
        .await)
}

/// Copy the draft into a pending scheduled post. The draft is left as is.
pub fn schedule(session: &Session, due_at: DateTime<Utc>) -> Result<ScheduledPost, PostError> {
    let draft = deliverable(session)?;
    Ok(ScheduledPost::new(
        session.user,
        session.chat,
        draft.content.clone(),
        draft.selected_channels.clone(),
        due_at,
    ))
}

// ============================================================================
// Delivery
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered { message_id: i64 },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelOutcome {
    pub channel: String,
    #[serde(flatten)]
    pub status: DeliveryStatus,
}

impl ChannelOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, DeliveryStatus::Delivered { .. })
    }
}

/// One outcome per target channel, in channel key order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DeliveryReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(ChannelOutcome::succeeded)
    }

    pub fn outcome(&self, channel: &str) -> Option<&ChannelOutcome> {
        self.outcomes.iter().find(|o| o.channel == channel)
    }

    pub fn summary(&self) -> String {
        let delivered = self.outcomes.iter().filter(|o| o.succeeded()).count();
        let mut text = format!(
            "📤 Delivered to {delivered} of {} channel(s)\n",
            self.outcomes.len()
        );
        for outcome in &self.outcomes {
            let _ = match &outcome.status {
                DeliveryStatus::Delivered { .. } => writeln!(text, "✅ {}", outcome.channel),
                DeliveryStatus::Failed { error } => {
                    writeln!(text, "❌ {}: {error}", outcome.channel)
                }
            };
        }
        text
    }
}

/// Bounded exponential backoff for channel delivery
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base * 2^(attempt-1), plus up to 10% jitter
    fn delay(&self, attempt: u32) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(1 << attempt.saturating_sub(1).min(16));
        let jitter_ms = u64::try_from(backoff.as_millis() / 10).unwrap_or(u64::MAX);
        let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
        backoff + Duration::from_millis(jitter)
    }
}

/// Fans posts out to registered channels
pub struct Publisher {
    transport: Arc<dyn Transport>,
    channels: Arc<ChannelRegistry>,
    retry: RetryPolicy,
}

impl Publisher {
    pub fn new(
        transport: Arc<dyn Transport>,
        channels: Arc<ChannelRegistry>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            channels,
            retry,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    /// Deliver `content` to every channel in `keys` concurrently.
    ///
    /// A failing channel never stops the others.
    pub async fn deliver(&self, content: &str, keys: &BTreeSet<String>) -> DeliveryReport {
        let outcomes = join_all(keys.iter().map(|key| self.deliver_one(key, content))).await;
        DeliveryReport { outcomes }
    }

    async fn deliver_one(&self, key: &str, content: &str) -> ChannelOutcome {
        let status = match self.channels.get(key) {
            None => DeliveryStatus::Failed {
                error: PostError::UnknownChannel(key.to_string()).to_string(),
            },
            Some(channel) => match self.send_with_retry(channel.chat_id, key, content).await {
                Ok(MessageId(message_id)) => DeliveryStatus::Delivered { message_id },
                Err(e) => DeliveryStatus::Failed {
                    error: e.to_string(),
                },
            },
        };
        ChannelOutcome {
            channel: key.to_string(),
            status,
        }
    }

    async fn send_with_retry(
        &self,
        chat: ChatId,
        key: &str,
        content: &str,
    ) -> Result<MessageId, TransportError> {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.transport.send_message(chat, content, None).await {
                Ok(id) => {
                    tracing::info!(channel = %key, chat_id = %chat, attempt, "Post delivered");
                    return Ok(id);
                }
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        channel = %key,
                        attempt,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "Delivery failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(channel = %key, chat_id = %chat, attempt, error = %e, "Delivery failed");
                    return Err(e);
                }
            }
        }
    }
}
