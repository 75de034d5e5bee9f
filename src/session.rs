//! Per-user session state and the store that isolates it
//!
//! Each user's [`Session`] lives behind its own async mutex. The map from
//! user to session is only locked for lookup and insertion, so different
//! users never contend and one user's events are serialized.

use crate::state_machine::{ConvState, Mode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// Number of past turns replayed into every prompt
pub const REPLAY_WINDOW: usize = 5;

/// Stable identifier of a chat participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Destination for messages (private chat, group or channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Transport-assigned message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Bounded ring buffer of turns: `capacity` retained, [`REPLAY_WINDOW`] replayed
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    turns: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ConversationHistory {
    /// Capacity is never allowed below the replay window
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(REPLAY_WINDOW);
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// The last `n` turns, oldest first
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &ConversationTurn> {
        self.turns.iter().skip(self.turns.len().saturating_sub(n))
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// The user's single in-progress post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub owner: UserId,
    pub content: String,
    pub selected_channels: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

impl PostDraft {
    pub fn new(owner: UserId, content: impl Into<String>) -> Self {
        Self {
            owner,
            content: content.into(),
            selected_channels: BTreeSet::new(),
            created_at: Utc::now(),
        }
    }
}

/// Everything the bot remembers about one user
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserId,
    /// Private chat used for replies
    pub chat: ChatId,
    pub state: ConvState,
    pub mode: Mode,
    pub history: ConversationHistory,
    pub draft: Option<PostDraft>,
    pub last_active: DateTime<Utc>,
    /// Set once the store has dropped this session
    evicted: bool,
}

impl Session {
    pub fn new(user: UserId, chat: ChatId, history_capacity: usize) -> Self {
        Self {
            user,
            chat,
            state: ConvState::Menu,
            mode: Mode::Chat,
            history: ConversationHistory::new(history_capacity),
            draft: None,
            last_active: Utc::now(),
            evicted: false,
        }
    }

    /// Switch persona and start from an empty history
    pub fn reset_conversation(&mut self, mode: Mode) {
        self.mode = mode;
        self.history.clear();
    }
}

pub type SessionRef = Arc<Mutex<Session>>;

/// Concurrent map of sessions with per-user locking
pub struct SessionStore {
    sessions: RwLock<HashMap<UserId, SessionRef>>,
    history_capacity: usize,
}

impl SessionStore {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            history_capacity,
        }
    }

    /// Fetch the user's session, creating it on first contact
    pub async fn get_or_create(&self, user: UserId, chat: ChatId) -> SessionRef {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(&user) {
                return Arc::clone(session);
            }
        }

        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(user).or_insert_with(|| {
            tracing::debug!(user_id = %user, "Creating session");
            Arc::new(Mutex::new(Session::new(user, chat, self.history_capacity)))
        }))
    }

    /// Lock the user's live session.
    ///
    /// A session evicted between lookup and lock is no longer in the store,
    /// so the lookup is retried instead of mutating the orphan.
    pub async fn lock(&self, user: UserId, chat: ChatId) -> OwnedMutexGuard<Session> {
        loop {
            let session = self.get_or_create(user, chat).await.lock_owned().await;
            if !session.evicted {
                return session;
            }
            tracing::debug!(user_id = %user, "Session evicted while waiting, retrying");
        }
    }

    pub async fn get(&self, user: UserId) -> Option<SessionRef> {
        self.sessions.read().await.get(&user).cloned()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for longer than `ttl`.
    ///
    /// Sessions whose lock is held (an event is in flight) are kept.
    pub async fn evict_idle(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|user, session| match session.try_lock() {
            Ok(mut s) => {
                let keep = now - s.last_active <= ttl;
                if !keep {
                    tracing::info!(user_id = %user, "Evicting idle session");
                    s.evicted = true;
                }
                keep
            }
            Err(_) => true,
        });
        before - sessions.len()
    }
}
