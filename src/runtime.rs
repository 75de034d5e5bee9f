//! Runtime for executing conversations
//!
//! Inbound events are dispatched onto their own tasks; the executor
//! serializes them per user through the session store.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::ConversationRuntime;
pub use traits::*;

use crate::session::{ChatId, MessageId, SessionStore, UserId};
use crate::state_machine::Event;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// An event from the transport, tagged with who sent it and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub user: UserId,
    pub chat: ChatId,
    /// Message carrying the pressed button, edited in place by the reply
    pub message: Option<MessageId>,
    /// Button press to acknowledge
    pub callback_id: Option<String>,
    pub event: Event,
}

impl Inbound {
    pub fn new(user: UserId, chat: ChatId, event: Event) -> Self {
        Self {
            user,
            chat,
            message: None,
            callback_id: None,
            event,
        }
    }

    /// A button press on `message`
    pub fn callback(
        user: UserId,
        chat: ChatId,
        message: MessageId,
        callback_id: impl Into<String>,
        event: Event,
    ) -> Self {
        Self {
            message: Some(message),
            callback_id: Some(callback_id.into()),
            ..Self::new(user, chat, event)
        }
    }
}

/// Owns the runtime and the background session janitor
pub struct RuntimeManager {
    runtime: Arc<ConversationRuntime>,
    session_ttl: Option<Duration>,
}

impl RuntimeManager {
    pub fn new(runtime: ConversationRuntime, session_ttl: Option<Duration>) -> Self {
        Self {
            runtime: Arc::new(runtime),
            session_ttl,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        self.runtime.sessions()
    }

    /// Process `inbound` on its own task
    pub fn dispatch(&self, inbound: Inbound) -> JoinHandle<()> {
        let runtime = Arc::clone(&self.runtime);
        tokio::spawn(async move {
            let user = inbound.user;
            if let Err(e) = runtime.process_event(inbound).await {
                tracing::error!(user_id = %user, error = %e, "Error handling event");
            }
        })
    }

    /// Periodically evict idle sessions until `shutdown`.
    ///
    /// Returns immediately when no TTL is configured.
    pub async fn run_janitor(self: Arc<Self>, shutdown: CancellationToken) {
        let Some(ttl) = self.session_ttl else {
            tracing::debug!("Session eviction disabled");
            return;
        };
        let interval = (ttl / 2).clamp(Duration::from_secs(1), Duration::from_secs(60));
        tracing::info!(ttl_secs = ttl.as_secs(), "Session janitor started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(interval) => {
                    let evicted = self.sessions().evict_idle(Utc::now(), ttl).await;
                    if evicted > 0 {
                        tracing::info!(evicted, "Evicted idle sessions");
                    }
                }
            }
        }
    }
}
