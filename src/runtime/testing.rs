//! Mock implementations for testing
//!
//! These mocks enable end-to-end testing of the runtime without real I/O.

use super::traits::*;
use super::{ConversationRuntime, Inbound};
use crate::channels::{Channel, ChannelRegistry};
use crate::llm::LlmError;
use crate::posts::{Publisher, RetryPolicy};
use crate::render::Keyboard;
use crate::scheduler::BroadcastScheduler;
use crate::session::{ChatId, MessageId, SessionStore, UserId};
use crate::state_machine::{Action, ConvState, Event};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

// ============================================================================
// Mock AI Client
// ============================================================================

/// Mock AI client that returns queued replies
#[allow(dead_code)]
pub struct MockAiClient {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    /// Record of all prompts received
    pub prompts: Mutex<Vec<String>>,
    /// When set, each reply waits for one permit
    gate: Mutex<Option<Arc<Semaphore>>>,
}

#[allow(dead_code)]
impl MockAiClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    /// Hold every reply until a permit is added to the returned semaphore
    pub fn hold_replies(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
    }

    /// Queue an error
    pub fn queue_error(&self, error: LlmError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AiClient for MockAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock reply queued")))
    }
}

// ============================================================================
// Recording Transport
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat: ChatId,
    pub message: MessageId,
    pub text: String,
    pub keyboard: Option<Keyboard>,
}

/// Transport that records every send and edit.
///
/// Destinations can be set to always fail, or to fail a fixed number of
/// times with a retryable error before succeeding.
#[allow(dead_code)]
pub struct RecordingTransport {
    next_id: AtomicI64,
    sent: Mutex<Vec<SentMessage>>,
    edits: Mutex<Vec<SentMessage>>,
    typing: Mutex<Vec<ChatId>>,
    answered: Mutex<Vec<String>>,
    failing: HashSet<ChatId>,
    flaky: Mutex<HashMap<ChatId, u32>>,
    gates: HashMap<ChatId, Arc<Semaphore>>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            sent: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            typing: Mutex::new(Vec::new()),
            answered: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            flaky: Mutex::new(HashMap::new()),
            gates: HashMap::new(),
        }
    }

    /// Every send to `chat` fails permanently
    pub fn failing_for(mut self, chat: ChatId) -> Self {
        self.failing.insert(chat);
        self
    }

    /// The first `failures` sends to `chat` fail with a network error
    pub fn flaky_for(self, chat: ChatId, failures: u32) -> Self {
        self.flaky.lock().unwrap().insert(chat, failures);
        self
    }

    /// Each send to `chat` waits for one permit of `gate`
    pub fn gated_for(mut self, chat: ChatId, gate: Arc<Semaphore>) -> Self {
        self.gates.insert(chat, gate);
        self
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<SentMessage> {
        self.edits.lock().unwrap().clone()
    }

    /// Texts successfully sent to `chat`, in order
    pub fn sent_to(&self, chat: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.chat == chat)
            .map(|m| m.text.clone())
            .collect()
    }

    /// Most recent send or edit to `chat`
    pub fn last_to(&self, chat: ChatId) -> Option<SentMessage> {
        let sent = self.sent.lock().unwrap();
        let edits = self.edits.lock().unwrap();
        sent.iter()
            .chain(edits.iter())
            .filter(|m| m.chat == chat)
            .max_by_key(|m| m.message.0)
            .cloned()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.lock().unwrap().len()
    }

    pub fn answered(&self) -> Vec<String> {
        self.answered.lock().unwrap().clone()
    }

    fn next_message_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn check(&self, chat: ChatId) -> Result<(), TransportError> {
        if self.failing.contains(&chat) {
            return Err(TransportError::Api {
                code: 403,
                description: "Forbidden: bot is not a member of the channel chat".into(),
            });
        }
        let mut flaky = self.flaky.lock().unwrap();
        if let Some(remaining) = flaky.get_mut(&chat) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(TransportError::Network("connection reset".into()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        if let Some(gate) = self.gates.get(&chat) {
            gate.acquire().await.unwrap().forget();
        }
        self.check(chat)?;
        let message = self.next_message_id();
        self.sent.lock().unwrap().push(SentMessage {
            chat,
            message,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(message)
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        _message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        self.check(chat)?;
        // Edits get a fresh sequence number so last_to orders them with sends
        let message = self.next_message_id();
        self.edits.lock().unwrap().push(SentMessage {
            chat,
            message,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn send_typing(&self, chat: ChatId) -> Result<(), TransportError> {
        self.typing.lock().unwrap().push(chat);
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        self.answered.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }
}

// ============================================================================
// Test Runtime
// ============================================================================

/// A runtime wired to mocks, plus handles to inspect them
#[allow(dead_code)]
pub struct TestRuntime {
    pub runtime: ConversationRuntime,
    pub ai: Arc<MockAiClient>,
    pub transport: Arc<RecordingTransport>,
    pub scheduler: Arc<BroadcastScheduler>,
    pub sessions: Arc<SessionStore>,
}

pub struct TestRuntimeBuilder {
    channels: Vec<Channel>,
    transport: RecordingTransport,
    history_capacity: usize,
}

#[allow(dead_code)]
impl TestRuntimeBuilder {
    pub fn channel(mut self, key: &str, chat_id: i64) -> Self {
        self.channels.push(Channel {
            key: key.to_string(),
            chat_id: ChatId(chat_id),
        });
        self
    }

    pub fn transport(mut self, transport: RecordingTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn build(self) -> TestRuntime {
        let ai = Arc::new(MockAiClient::new());
        let transport = Arc::new(self.transport);
        let sessions = Arc::new(SessionStore::new(self.history_capacity));
        let publisher = Arc::new(Publisher::new(
            transport.clone(),
            Arc::new(ChannelRegistry::new(self.channels)),
            RetryPolicy {
                attempts: 2,
                base_delay: Duration::from_millis(1),
            },
        ));
        let scheduler = Arc::new(BroadcastScheduler::new(
            publisher.clone(),
            Duration::from_secs(30),
            Duration::from_secs(3600),
        ));
        let runtime = ConversationRuntime::new(
            sessions.clone(),
            ai.clone(),
            publisher,
            scheduler.clone(),
        );
        TestRuntime {
            runtime,
            ai,
            transport,
            scheduler,
            sessions,
        }
    }
}

impl Default for TestRuntimeBuilder {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            transport: RecordingTransport::new(),
            history_capacity: 50,
        }
    }
}

#[allow(dead_code)]
impl TestRuntime {
    pub fn builder() -> TestRuntimeBuilder {
        TestRuntimeBuilder::default()
    }

    /// Private chat id used for `user` in tests
    pub fn chat(user: i64) -> ChatId {
        ChatId(user)
    }

    pub async fn send(&self, user: i64, event: Event) {
        self.runtime
            .process_event(Inbound::new(UserId(user), Self::chat(user), event))
            .await
            .unwrap();
    }

    pub async fn start(&self, user: i64) {
        self.send(user, Event::Start).await;
    }

    pub async fn press(&self, user: i64, token: &str) {
        self.send(user, Event::Selection(Action::parse(token))).await;
    }

    pub async fn text(&self, user: i64, text: &str) {
        self.send(user, Event::Text(text.to_string())).await;
    }

    pub async fn state(&self, user: i64) -> ConvState {
        self.sessions.get(UserId(user)).await.unwrap().lock().await.state
    }

    pub async fn history_len(&self, user: i64) -> usize {
        self.sessions
            .get(UserId(user))
            .await
            .unwrap()
            .lock()
            .await
            .history
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ScheduleStatus;
    use crate::state_machine::{Mode, PostAction};
    use chrono::Utc;

    #[tokio::test]
    async fn test_start_shows_menu() {
        let rt = TestRuntime::builder().build();
        rt.start(1).await;

        assert_eq!(rt.state(1).await, ConvState::Menu);
        let last = rt.transport.last_to(ChatId(1)).unwrap();
        let keyboard = last.keyboard.unwrap();
        assert!(keyboard.actions().any(|a| *a == Action::AiChat));
    }

    #[tokio::test]
    async fn test_chat_round_trip_records_history() {
        let rt = TestRuntime::builder().build();
        rt.start(1).await;
        rt.press(1, "ai_chat").await;
        rt.ai.queue_reply("Hello there!");
        rt.text(1, "hi").await;

        assert_eq!(rt.state(1).await, ConvState::ChatMode);
        assert_eq!(rt.ai.recorded_prompts(), vec!["user: hi\n".to_string()]);
        assert_eq!(rt.transport.sent_to(ChatId(1)).last().unwrap(), "Hello there!");
        assert_eq!(rt.history_len(1).await, 2);
        assert_eq!(rt.transport.typing_count(), 1);
    }

    #[tokio::test]
    async fn test_entering_mode_clears_history() {
        let rt = TestRuntime::builder().build();
        rt.press(1, "ai_chat").await;
        rt.ai.queue_reply("a1");
        rt.text(1, "q1").await;
        assert_eq!(rt.history_len(1).await, 2);

        rt.press(1, "back_menu").await;
        rt.press(1, "ai_learning").await;
        assert_eq!(rt.history_len(1).await, 0);

        rt.ai.queue_reply("a2");
        rt.text(1, "q2").await;
        let prompts = rt.ai.recorded_prompts();
        assert_eq!(
            prompts[1],
            "You are an expert educator. Explain clearly and educatingly. user: q2\n"
        );
    }

    #[tokio::test]
    async fn test_prompt_replays_last_five_turns() {
        let rt = TestRuntime::builder().build();
        rt.press(1, "ai_chat").await;
        for i in 1..=10 {
            rt.ai.queue_reply(format!("a{i}"));
            rt.text(1, &format!("q{i}")).await;
        }
        // 20 stored turns; the next prompt replays turns 16-20
        rt.ai.queue_reply("a11");
        rt.text(1, "q11").await;

        let prompt = rt.ai.recorded_prompts().pop().unwrap();
        assert_eq!(
            prompt,
            "assistant: a8\nuser: q9\nassistant: a9\nuser: q10\nassistant: a10\nuser: q11\n"
        );
    }

    #[tokio::test]
    async fn test_ai_failure_replies_with_error() {
        let rt = TestRuntime::builder().build();
        rt.press(1, "ask_ai").await;
        rt.ai.queue_error(LlmError::server_error("upstream exploded"));
        rt.text(1, "why?").await;

        assert_eq!(
            rt.transport.sent_to(ChatId(1)).last().unwrap(),
            "❌ Error: upstream exploded"
        );
        // User turn kept, no assistant turn
        assert_eq!(rt.history_len(1).await, 1);
        assert_eq!(rt.state(1).await, ConvState::ChatMode);
    }

    #[tokio::test]
    async fn test_long_reply_is_chunked() {
        let rt = TestRuntime::builder().build();
        rt.press(1, "ai_writing").await;
        rt.ai.queue_reply("x".repeat(4097));
        rt.text(1, "write a lot").await;

        let sent = rt.transport.sent_to(ChatId(1));
        let parts = &sent[sent.len() - 2..];
        assert_eq!(parts[0].chars().count(), 4096);
        assert_eq!(parts[1], "x");
    }

    #[tokio::test]
    async fn test_invalid_token_in_chat_mode() {
        let rt = TestRuntime::builder().build();
        rt.press(1, "ai_chat").await;
        let sends_before = rt.transport.sent().len();

        rt.press(1, "select_channels").await;
        rt.press(1, "not_a_token").await;

        assert_eq!(rt.state(1).await, ConvState::ChatMode);
        assert_eq!(rt.transport.sent().len(), sends_before + 2);
        assert!(rt.ai.recorded_prompts().is_empty());
    }

    #[tokio::test]
    async fn test_generate_and_publish_scenario() {
        let rt = TestRuntime::builder()
            .channel("news", -100)
            .channel("updates", -200)
            .build();

        rt.start(1).await;
        rt.press(1, "create_posts").await;
        rt.press(1, "ai_generate_post").await;
        assert_eq!(
            rt.state(1).await,
            ConvState::PostMode {
                action: Some(PostAction::Generate)
            }
        );

        rt.ai.queue_reply("Tech is trending 🚀");
        rt.text(1, "technology trends").await;
        assert_eq!(
            rt.ai.recorded_prompts(),
            vec![
                "You are a creative writing expert. Help with creative content. \
                 user: Write a professional social media post about: technology trends\n"
                    .to_string()
            ]
        );
        assert_eq!(rt.state(1).await, ConvState::PostMode { action: None });

        rt.press(1, "select_channels").await;
        rt.press(1, "toggle_channel:news").await;
        rt.press(1, "toggle_channel:updates").await;
        rt.press(1, "channels_done").await;
        rt.press(1, "post_now").await;

        assert_eq!(rt.transport.sent_to(ChatId(-100)), vec!["Tech is trending 🚀".to_string()]);
        assert_eq!(rt.transport.sent_to(ChatId(-200)), vec!["Tech is trending 🚀".to_string()]);
        let report = rt
            .transport
            .sent_to(ChatId(1))
            .into_iter()
            .find(|t| t.starts_with("📤"))
            .unwrap();
        assert!(report.contains("2 of 2"));
        assert_eq!(rt.state(1).await, ConvState::PostMode { action: None });
    }

    #[tokio::test]
    async fn test_publish_partial_failure_scenario() {
        let rt = TestRuntime::builder()
            .channel("a", -1)
            .channel("b", -2)
            .transport(RecordingTransport::new().failing_for(ChatId(-2)))
            .build();

        rt.press(1, "create_posts").await;
        rt.press(1, "write_post").await;
        rt.text(1, "Hello channels").await;
        rt.press(1, "select_channels").await;
        rt.press(1, "toggle_channel:a").await;
        rt.press(1, "toggle_channel:b").await;
        rt.press(1, "post_now").await;

        assert_eq!(rt.transport.sent_to(ChatId(-1)), vec!["Hello channels".to_string()]);
        let report = rt
            .transport
            .sent_to(ChatId(1))
            .into_iter()
            .find(|t| t.starts_with("📤"))
            .unwrap();
        assert!(report.contains("✅ a"));
        assert!(report.contains("❌ b"));
    }

    #[tokio::test]
    async fn test_generation_failure_creates_no_draft() {
        let rt = TestRuntime::builder().channel("news", -100).build();
        rt.press(1, "create_posts").await;
        rt.press(1, "ai_generate_post").await;
        rt.ai.queue_error(LlmError::rate_limit("slow down"));
        rt.text(1, "anything").await;

        let session = rt.sessions.get(UserId(1)).await.unwrap();
        assert!(session.lock().await.draft.is_none());
        assert!(rt
            .transport
            .sent_to(ChatId(1))
            .iter()
            .any(|t| t == "❌ Error: slow down"));

        // Draft actions stay unavailable
        rt.press(1, "post_now").await;
        assert!(rt.transport.sent_to(ChatId(-100)).is_empty());
    }

    #[tokio::test]
    async fn test_back_menu_clears_generate_flag() {
        let rt = TestRuntime::builder().build();
        rt.press(1, "create_posts").await;
        rt.press(1, "ai_generate_post").await;
        rt.press(1, "back_menu").await;
        assert_eq!(rt.state(1).await, ConvState::Menu);

        rt.press(1, "create_posts").await;
        rt.text(1, "written by hand").await;
        assert!(rt.ai.recorded_prompts().is_empty());
        let session = rt.sessions.get(UserId(1)).await.unwrap();
        assert_eq!(
            session.lock().await.draft.as_ref().unwrap().content,
            "written by hand"
        );
    }

    #[tokio::test]
    async fn test_unknown_channel_toggle_rejected() {
        let rt = TestRuntime::builder().channel("news", -100).build();
        rt.press(1, "create_posts").await;
        rt.text(1, "post").await;
        rt.press(1, "select_channels").await;
        rt.press(1, "toggle_channel:ghost").await;

        let session = rt.sessions.get(UserId(1)).await.unwrap();
        assert!(session
            .lock()
            .await
            .draft
            .as_ref()
            .unwrap()
            .selected_channels
            .is_empty());
        assert!(rt
            .transport
            .sent_to(ChatId(1))
            .iter()
            .any(|t| t.contains("Unknown channel 'ghost'")));
    }

    #[tokio::test]
    async fn test_schedule_scenario() {
        let rt = TestRuntime::builder().channel("news", -100).build();
        rt.press(1, "create_posts").await;
        rt.text(1, "Later news").await;
        rt.press(1, "select_channels").await;
        rt.press(1, "toggle_channel:news").await;
        rt.press(1, "schedule_post").await;
        assert_eq!(rt.state(1).await, ConvState::ScheduleMode);

        rt.text(1, "1h").await;
        assert_eq!(rt.state(1).await, ConvState::PostMode { action: None });

        let posts = rt.scheduler.list();
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.status, ScheduleStatus::Pending);
        let offset = post.due_at - Utc::now();
        assert!(offset > chrono::Duration::minutes(59));
        assert!(offset <= chrono::Duration::hours(1));

        // Editing the draft afterwards does not touch the snapshot
        rt.press(1, "back_menu").await;
        rt.press(1, "create_posts").await;
        rt.text(1, "Different text").await;

        assert!(rt.scheduler.run_due(Utc::now()).await.is_empty());
        assert!(rt.transport.sent_to(ChatId(-100)).is_empty());

        let dispatched = rt
            .scheduler
            .run_due(post.due_at + chrono::Duration::seconds(1))
            .await;
        assert_eq!(dispatched, vec![post.id]);
        assert_eq!(rt.scheduler.get(post.id).unwrap().status, ScheduleStatus::Done);
        assert_eq!(rt.transport.sent_to(ChatId(-100)), vec!["Later news".to_string()]);
    }

    #[tokio::test]
    async fn test_cancel_from_chat() {
        let rt = TestRuntime::builder().channel("news", -100).build();
        rt.press(1, "create_posts").await;
        rt.text(1, "Maybe later").await;
        rt.press(1, "select_channels").await;
        rt.press(1, "toggle_channel:news").await;
        rt.press(1, "schedule_post").await;
        rt.text(1, "30m").await;

        let id = rt.scheduler.list()[0].id;
        let cancel = rt
            .transport
            .sent()
            .into_iter()
            .filter_map(|m| m.keyboard)
            .flat_map(|k| k.actions().cloned().collect::<Vec<_>>())
            .find(|a| matches!(a, Action::CancelSchedule(_)))
            .unwrap();
        assert_eq!(cancel, Action::CancelSchedule(id));

        // Another user cannot cancel it
        rt.press(2, &cancel.token()).await;
        assert_eq!(rt.scheduler.get(id).unwrap().status, ScheduleStatus::Pending);

        rt.press(1, &cancel.token()).await;
        assert_eq!(rt.scheduler.get(id).unwrap().status, ScheduleStatus::Cancelled);
        assert!(rt
            .scheduler
            .run_due(Utc::now() + chrono::Duration::hours(1))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_schedule_rejects_bad_time() {
        let rt = TestRuntime::builder().channel("news", -100).build();
        rt.press(1, "create_posts").await;
        rt.text(1, "post").await;
        rt.press(1, "schedule_post").await;
        rt.text(1, "whenever").await;

        assert_eq!(rt.state(1).await, ConvState::ScheduleMode);
        assert!(rt.scheduler.list().is_empty());
        assert!(rt
            .transport
            .sent_to(ChatId(1))
            .last()
            .unwrap()
            .starts_with("⚠️"));
    }

    #[tokio::test]
    async fn test_callback_edits_pressed_message() {
        let rt = TestRuntime::builder().build();
        rt.start(1).await;
        let menu = rt.transport.sent()[0].message;

        rt.runtime
            .process_event(Inbound::callback(
                UserId(1),
                ChatId(1),
                menu,
                "cb-1",
                Event::Selection(Action::AiChat),
            ))
            .await
            .unwrap();

        assert_eq!(rt.transport.answered(), vec!["cb-1".to_string()]);
        assert_eq!(rt.transport.edits().len(), 1);
        assert_eq!(rt.transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let rt = TestRuntime::builder().build();
        rt.press(1, "ai_writing").await;
        rt.press(2, "create_posts").await;

        assert_eq!(rt.state(1).await, ConvState::ChatMode);
        assert_eq!(rt.state(2).await, ConvState::PostMode { action: None });
        let s1 = rt.sessions.get(UserId(1)).await.unwrap();
        assert_eq!(s1.lock().await.mode, Mode::Writing);
    }

    #[tokio::test]
    async fn test_concurrent_events_for_one_user_serialize() {
        let rt = Arc::new(TestRuntime::builder().build());
        rt.press(1, "ai_chat").await;
        for i in 0..8 {
            rt.ai.queue_reply(format!("r{i}"));
        }

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let rt = Arc::clone(&rt);
                tokio::spawn(async move { rt.text(1, &format!("m{i}")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        // Every exchange recorded both turns with nothing interleaved
        assert_eq!(rt.history_len(1).await, 16);
        let session = rt.sessions.get(UserId(1)).await.unwrap();
        let session = session.lock().await;
        let turns: Vec<_> = session.history.recent(16).collect();
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].role, crate::session::Role::User);
            assert_eq!(pair[1].role, crate::session::Role::Assistant);
        }
    }

    #[tokio::test]
    async fn test_other_users_progress_while_ai_call_pending() {
        let rt = TestRuntime::builder().build();
        rt.press(1, "ai_chat").await;
        let gate = rt.ai.hold_replies();
        rt.ai.queue_reply("slow answer");

        let slow = rt.text(1, "take your time");
        let other = async {
            rt.start(2).await;
            rt.press(2, "create_posts").await;
            assert_eq!(rt.state(2).await, ConvState::PostMode { action: None });
            assert!(!rt
                .transport
                .sent_to(ChatId(1))
                .contains(&"slow answer".to_string()));
            gate.add_permits(1);
        };
        tokio::time::timeout(Duration::from_secs(5), async { tokio::join!(slow, other) })
            .await
            .unwrap();

        assert_eq!(
            rt.transport.sent_to(ChatId(1)).last().unwrap(),
            "slow answer"
        );
    }
}
