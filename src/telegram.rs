//! Telegram Bot API adapter
//!
//! Outbound: a [`Transport`] over `sendMessage`, `editMessageText`,
//! `sendChatAction` and `answerCallbackQuery`. Inbound: webhook [`Update`]s
//! decoded into runtime events.

use crate::render::Keyboard;
use crate::runtime::{Inbound, Transport, TransportError};
use crate::session::{ChatId, MessageId, UserId};
use crate::state_machine::{Action, Event};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(default)]
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup {
    inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton {
    text: String,
    callback_data: String,
}

impl From<&Keyboard> for InlineKeyboardMarkup {
    fn from(keyboard: &Keyboard) -> Self {
        Self {
            inline_keyboard: keyboard
                .rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| InlineKeyboardButton {
                            text: b.label.clone(),
                            callback_data: b.action.token(),
                        })
                        .collect()
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct EditMessageRequest<'a> {
    chat_id: i64,
    message_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct ChatActionRequest {
    chat_id: i64,
    action: &'static str,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackRequest<'a> {
    callback_query_id: &'a str,
}

/// Envelope every Bot API method returns
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

// ============================================================================
// Inbound decoding
// ============================================================================

/// Turn a webhook update into a runtime event.
///
/// Returns `None` for updates the bot ignores (no sender, no text, no data).
pub fn to_inbound(update: Update) -> Option<Inbound> {
    if let Some(query) = update.callback_query {
        let message = query.message?;
        let data = query.data?;
        return Some(Inbound::callback(
            UserId(query.from.id),
            ChatId(message.chat.id),
            MessageId(message.message_id),
            query.id,
            Event::Selection(Action::parse(&data)),
        ));
    }

    let message = update.message?;
    let user = message.from?;
    let text = message.text?;
    let trimmed = text.trim();
    let is_start =
        trimmed == "/start" || trimmed.starts_with("/start ") || trimmed.starts_with("/start@");
    let event = if is_start {
        Event::Start
    } else {
        Event::Text(text)
    };
    Some(Inbound::new(UserId(user.id), ChatId(message.chat.id), event))
}

// ============================================================================
// Outbound transport
// ============================================================================

/// Bot API client
pub struct TelegramTransport {
    client: Client,
    base_url: String,
}

impl TelegramTransport {
    pub fn new(token: &str, api_base: Option<&str>) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{token}",
                api_base.unwrap_or(DEFAULT_API_BASE).trim_end_matches('/')
            ),
        })
    }

    async fn call<B: Serialize + Sync, T: DeserializeOwned + Send>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;

        let status = response.status();
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            if status.is_success() {
                TransportError::Network(format!("Invalid response: {}", e.without_url()))
            } else {
                TransportError::Api {
                    code: status.as_u16(),
                    description: status.canonical_reason().unwrap_or("unknown").to_string(),
                }
            }
        })?;

        match envelope {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                error_code,
                description,
                ..
            } => {
                let error = TransportError::Api {
                    code: error_code.unwrap_or_else(|| status.as_u16()),
                    description: description.unwrap_or_else(|| "no description".into()),
                };
                tracing::debug!(method, error = %error, "Bot API call failed");
                Err(error)
            }
        }
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        let sent: SentMessage = self
            .call(
                "sendMessage",
                &SendMessageRequest {
                    chat_id: chat.0,
                    text,
                    reply_markup: keyboard.map(InlineKeyboardMarkup::from),
                },
            )
            .await?;
        Ok(MessageId(sent.message_id))
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        // Returns the edited Message, or `true` for inline messages
        let _: serde_json::Value = self
            .call(
                "editMessageText",
                &EditMessageRequest {
                    chat_id: chat.0,
                    message_id: message.0,
                    text,
                    reply_markup: keyboard.map(InlineKeyboardMarkup::from),
                },
            )
            .await?;
        Ok(())
    }

    async fn send_typing(&self, chat: ChatId) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "sendChatAction",
                &ChatActionRequest {
                    chat_id: chat.0,
                    action: "typing",
                },
            )
            .await?;
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &AnswerCallbackRequest {
                    callback_query_id: callback_id,
                },
            )
            .await?;
        Ok(())
    }
}
