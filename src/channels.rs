//! Static registry of broadcast destinations

use crate::session::ChatId;
use crate::state_machine::event::MAX_CHANNEL_KEY_LEN;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// A named broadcast destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub key: String,
    pub chat_id: ChatId,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelParseError {
    #[error("entry '{0}' is not of the form key=chat_id")]
    MalformedEntry(String),
    #[error("chat id '{value}' for channel '{key}' is not an integer")]
    InvalidChatId { key: String, value: String },
    #[error("channel '{0}' is listed more than once")]
    Duplicate(String),
    #[error("channel key '{key}' is longer than {max} bytes")]
    KeyTooLong { key: String, max: usize },
}

/// Immutable map from channel key to destination, ordered by key
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    channels: BTreeMap<String, Channel>,
}

impl ChannelRegistry {
    pub fn new(channels: impl IntoIterator<Item = Channel>) -> Self {
        Self {
            channels: channels
                .into_iter()
                .map(|c| (c.key.clone(), c))
                .collect(),
        }
    }

    /// Parse `key=chat_id,key=chat_id`. Blank input yields an empty registry.
    pub fn parse(raw: &str) -> Result<Self, ChannelParseError> {
        let mut channels = BTreeMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, value) = entry
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .filter(|(k, _)| !k.is_empty())
                .ok_or_else(|| ChannelParseError::MalformedEntry(entry.to_string()))?;
            if key.len() > MAX_CHANNEL_KEY_LEN {
                return Err(ChannelParseError::KeyTooLong {
                    key: key.to_string(),
                    max: MAX_CHANNEL_KEY_LEN,
                });
            }

            let chat_id = value
                .parse::<i64>()
                .map_err(|_| ChannelParseError::InvalidChatId {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;

            let channel = Channel {
                key: key.to_string(),
                chat_id: ChatId(chat_id),
            };
            if channels.insert(key.to_string(), channel).is_some() {
                return Err(ChannelParseError::Duplicate(key.to_string()));
            }
        }
        Ok(Self { channels })
    }

    pub fn get(&self, key: &str) -> Option<&Channel> {
        self.channels.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.channels.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
