//! Deferred broadcast of post snapshots
//!
//! Pending posts sit in a min-heap keyed by due time. [`BroadcastScheduler::run_due`]
//! claims due posts under the lock (so each is dispatched at most once), delivers
//! them with the lock released, then records the outcome and tells the owner.

mod due_time;

pub use due_time::parse_due_time;

use crate::posts::{DeliveryReport, Publisher};
use crate::session::{ChatId, UserId};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Pending,
    Dispatching,
    Done,
    PartialFailure,
    Cancelled,
}

/// A post snapshot waiting for (or past) its due time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledPost {
    pub id: Uuid,
    pub owner: UserId,
    /// Where the delivery report goes
    pub owner_chat: ChatId,
    pub content: String,
    pub channels: BTreeSet<String>,
    pub due_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: ScheduleStatus,
    /// When the post reached a finished status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<DeliveryReport>,
}

impl ScheduledPost {
    pub fn new(
        owner: UserId,
        owner_chat: ChatId,
        content: String,
        channels: BTreeSet<String>,
        due_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            owner_chat,
            content,
            channels,
            due_at,
            created_at: Utc::now(),
            status: ScheduleStatus::Pending,
            finished_at: None,
            report: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("Scheduled post {0} not found")]
    NotFound(Uuid),
    #[error("Scheduled post {id} is {status:?} and can no longer be cancelled")]
    NotPending { id: Uuid, status: ScheduleStatus },
}

#[derive(Default)]
struct Queue {
    posts: HashMap<Uuid, ScheduledPost>,
    /// May hold entries for posts that were cancelled; those are skipped
    due: BinaryHeap<Reverse<(DateTime<Utc>, Uuid)>>,
}

pub struct BroadcastScheduler {
    queue: Mutex<Queue>,
    wake: Notify,
    publisher: Arc<Publisher>,
    poll_interval: Duration,
    /// Finished posts stay visible this long before they are dropped
    retention: Duration,
}

impl BroadcastScheduler {
    pub fn new(publisher: Arc<Publisher>, poll_interval: Duration, retention: Duration) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            wake: Notify::new(),
            publisher,
            poll_interval,
            retention,
        }
    }

    fn queue(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept a pending post and wake the loop so it can re-plan its sleep
    pub fn schedule(&self, post: ScheduledPost) -> Uuid {
        let id = post.id;
        {
            let mut queue = self.queue();
            queue.due.push(Reverse((post.due_at, id)));
            tracing::info!(
                post_id = %id,
                user_id = %post.owner,
                due_at = %post.due_at,
                channels = post.channels.len(),
                "Post scheduled"
            );
            queue.posts.insert(id, post);
        }
        self.wake.notify_one();
        id
    }

    pub fn cancel(&self, id: Uuid) -> Result<ScheduledPost, ScheduleError> {
        self.cancel_where(id, None)
    }

    /// Cancel on behalf of `owner`; other users' posts look nonexistent
    pub fn cancel_owned(&self, id: Uuid, owner: UserId) -> Result<ScheduledPost, ScheduleError> {
        self.cancel_where(id, Some(owner))
    }

    fn cancel_where(
        &self,
        id: Uuid,
        owner: Option<UserId>,
    ) -> Result<ScheduledPost, ScheduleError> {
        let mut queue = self.queue();
        let post = queue
            .posts
            .get_mut(&id)
            .filter(|p| owner.map_or(true, |o| p.owner == o))
            .ok_or(ScheduleError::NotFound(id))?;
        if post.status != ScheduleStatus::Pending {
            return Err(ScheduleError::NotPending {
                id,
                status: post.status,
            });
        }
        post.status = ScheduleStatus::Cancelled;
        post.finished_at = Some(Utc::now());
        tracing::info!(post_id = %id, "Scheduled post cancelled");
        Ok(post.clone())
    }

    pub fn get(&self, id: Uuid) -> Option<ScheduledPost> {
        self.queue().posts.get(&id).cloned()
    }

    /// All posts, soonest due first
    pub fn list(&self) -> Vec<ScheduledPost> {
        let mut posts: Vec<_> = self.queue().posts.values().cloned().collect();
        posts.sort_by_key(|p| (p.due_at, p.id));
        posts
    }

    /// Claim every pending post due at `now`
    fn claim_due(&self, now: DateTime<Utc>) -> Vec<ScheduledPost> {
        let mut queue = self.queue();
        let mut claimed = Vec::new();
        while let Some(&Reverse((due_at, id))) = queue.due.peek() {
            if due_at > now {
                break;
            }
            queue.due.pop();
            if let Some(post) = queue.posts.get_mut(&id) {
                if post.status == ScheduleStatus::Pending {
                    post.status = ScheduleStatus::Dispatching;
                    claimed.push(post.clone());
                }
            }
        }
        claimed
    }

    /// Dispatch every pending post with `due_at <= now`. Returns the ids dispatched.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        let claimed = self.claim_due(now);
        if claimed.is_empty() {
            return vec![];
        }

        let reports = join_all(claimed.iter().map(|post| {
            tracing::info!(post_id = %post.id, "Dispatching scheduled post");
            self.publisher.deliver(&post.content, &post.channels)
        }))
        .await;

        let mut dispatched = Vec::with_capacity(claimed.len());
        for (post, report) in claimed.into_iter().zip(reports) {
            let status = if report.all_succeeded() {
                ScheduleStatus::Done
            } else {
                ScheduleStatus::PartialFailure
            };
            let summary = report.summary();
            {
                let mut queue = self.queue();
                if let Some(stored) = queue.posts.get_mut(&post.id) {
                    stored.status = status;
                    stored.finished_at = Some(now);
                    stored.report = Some(report);
                }
            }
            tracing::info!(post_id = %post.id, status = ?status, "Scheduled post finished");

            let notice = format!("⏰ Scheduled post delivered\n\n{summary}");
            if let Err(e) = self
                .publisher
                .transport()
                .send_message(post.owner_chat, &notice, None)
                .await
            {
                tracing::warn!(post_id = %post.id, chat_id = %post.owner_chat, error = %e, "Failed to notify owner");
            }
            dispatched.push(post.id);
        }
        dispatched
    }

    /// Drop finished posts older than the retention window. Returns how many went.
    pub fn prune_finished(&self, now: DateTime<Utc>) -> usize {
        let Ok(retention) = chrono::Duration::from_std(self.retention) else {
            return 0;
        };
        let mut queue = self.queue();
        let before = queue.posts.len();
        queue.posts.retain(|_, post| {
            post.finished_at
                .and_then(|finished| finished.checked_add_signed(retention))
                .map_or(true, |expires| expires > now)
        });
        let pruned = before - queue.posts.len();
        if pruned > 0 {
            let Queue { posts, due } = &mut *queue;
            due.retain(|Reverse((_, id))| posts.contains_key(id));
        }
        pruned
    }

    /// How long the loop may sleep before the next post is due
    fn next_sleep(&self, now: DateTime<Utc>) -> Duration {
        let next = self.queue().due.peek().map(|Reverse((due_at, _))| *due_at);
        match next {
            Some(due_at) => (due_at - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.poll_interval),
            None => self.poll_interval,
        }
    }

    /// Background loop; returns once `shutdown` is cancelled
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        tracing::info!(poll_secs = self.poll_interval.as_secs(), "Broadcast scheduler started");
        loop {
            self.run_due(Utc::now()).await;
            let pruned = self.prune_finished(Utc::now());
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned finished scheduled posts");
            }
            let sleep_for = self.next_sleep(Utc::now());
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = self.wake.notified() => {}
                () = tokio::time::sleep(sleep_for) => {}
            }
        }
        tracing::info!("Broadcast scheduler stopped");
    }
}
