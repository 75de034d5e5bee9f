//! HTTP API: Telegram webhook and admin endpoints

mod auth;
mod handlers;
mod types;

pub use handlers::create_router;

use crate::channels::ChannelRegistry;
use crate::runtime::RuntimeManager;
use crate::scheduler::BroadcastScheduler;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<RuntimeManager>,
    pub scheduler: Arc<BroadcastScheduler>,
    pub channels: Arc<ChannelRegistry>,
    /// Expected `X-Telegram-Bot-Api-Secret-Token`; unchecked when `None`
    pub webhook_secret: Option<Arc<str>>,
    /// Bearer token for `/api/*`; the admin API is closed when `None`
    pub admin_token: Option<Arc<str>>,
}
