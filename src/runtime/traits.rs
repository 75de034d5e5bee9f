//! Trait abstractions for runtime I/O
//!
//! These traits enable testing the executor with mock implementations.

use crate::llm::{LlmError, LlmRequest, LlmService};
use crate::render::Keyboard;
use crate::session::{ChatId, MessageId};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Failure talking to the chat transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error {code}: {description}")]
    Api { code: u16, description: String },
}

impl TransportError {
    /// Whether a later attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Network(_) => true,
            TransportError::Api { code, .. } => *code == 429 || *code >= 500,
        }
    }
}

/// Outbound side of the chat platform
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a new message, returning its id
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError>;

    /// Replace the text and keyboard of an existing message
    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError>;

    /// Show the typing indicator
    async fn send_typing(&self, chat: ChatId) -> Result<(), TransportError>;

    /// Acknowledge a button press so the client stops its spinner
    async fn answer_callback(&self, _callback_id: &str) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Single-prompt text generation
#[async_trait]
pub trait AiClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_message(
        &self,
        chat: ChatId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageId, TransportError> {
        (**self).send_message(chat, text, keyboard).await
    }

    async fn edit_message(
        &self,
        chat: ChatId,
        message: MessageId,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), TransportError> {
        (**self).edit_message(chat, message, text, keyboard).await
    }

    async fn send_typing(&self, chat: ChatId) -> Result<(), TransportError> {
        (**self).send_typing(chat).await
    }

    async fn answer_callback(&self, callback_id: &str) -> Result<(), TransportError> {
        (**self).answer_callback(callback_id).await
    }
}

#[async_trait]
impl<T: AiClient + ?Sized> AiClient for Arc<T> {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        (**self).generate(prompt).await
    }
}

// ============================================================================
// Production Adapters
// ============================================================================

/// Adapter to use an optional [`LlmService`] as [`AiClient`]
pub struct LlmAiClient {
    service: Option<Arc<dyn LlmService>>,
}

impl LlmAiClient {
    pub fn new(service: Option<Arc<dyn LlmService>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl AiClient for LlmAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let service = self.service.as_ref().ok_or_else(LlmError::unavailable)?;
        let response = service.complete(&LlmRequest::from_prompt(prompt)).await?;
        Ok(response.text)
    }
}
