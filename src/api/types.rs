//! API request and response types

use crate::channels::Channel;
use crate::scheduler::ScheduledPost;
use serde::Serialize;

/// Response with the configured channels
#[derive(Debug, Serialize)]
pub struct ChannelListResponse {
    pub channels: Vec<Channel>,
}

/// Response with scheduled posts, soonest first
#[derive(Debug, Serialize)]
pub struct ScheduledListResponse {
    pub posts: Vec<ScheduledPost>,
}

/// Response with a single scheduled post
#[derive(Debug, Serialize)]
pub struct ScheduledPostResponse {
    pub post: ScheduledPost,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
