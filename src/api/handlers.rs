//! HTTP request handlers

use super::types::{
    ChannelListResponse, ErrorResponse, ScheduledListResponse, ScheduledPostResponse,
};
use super::auth::require_admin;
use super::AppState;
use crate::scheduler::ScheduleError;
use crate::telegram::{to_inbound, Update};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/channels", get(list_channels))
        .route("/scheduled", get(list_scheduled))
        .route(
            "/scheduled/:id",
            get(get_scheduled).delete(cancel_scheduled),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        // Bot updates
        .route("/telegram/webhook", post(telegram_webhook))
        // Admin
        .nest("/api", admin)
        // Version
        .route("/version", get(get_version))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================
// Webhook
// ============================================================

/// Accept an update and process it in the background.
///
/// Anything that passes the secret check gets 200 so Telegram does not
/// redeliver updates the bot chose to ignore.
async fn telegram_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    if let Some(expected) = &state.webhook_secret {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected.as_ref()) {
            tracing::warn!("Webhook call with bad secret token");
            return Err(AppError::Unauthorized("Invalid secret token".into()));
        }
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "Undecodable webhook update");
            return Ok(StatusCode::OK);
        }
    };

    let update_id = update.update_id;
    match to_inbound(update) {
        Some(inbound) => {
            tracing::debug!(update_id, user_id = %inbound.user, "Dispatching update");
            state.runtime.dispatch(inbound);
        }
        None => tracing::debug!(update_id, "Ignoring update"),
    }
    Ok(StatusCode::OK)
}

// ============================================================
// Channels
// ============================================================

async fn list_channels(State(state): State<AppState>) -> Json<ChannelListResponse> {
    Json(ChannelListResponse {
        channels: state.channels.iter().cloned().collect(),
    })
}

// ============================================================
// Scheduled Posts
// ============================================================

async fn list_scheduled(State(state): State<AppState>) -> Json<ScheduledListResponse> {
    Json(ScheduledListResponse {
        posts: state.scheduler.list(),
    })
}

async fn get_scheduled(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledPostResponse>, AppError> {
    let post = state
        .scheduler
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Scheduled post {id} not found")))?;
    Ok(Json(ScheduledPostResponse { post }))
}

async fn cancel_scheduled(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScheduledPostResponse>, AppError> {
    let post = state.scheduler.cancel(id)?;
    Ok(Json(ScheduledPostResponse { post }))
}

async fn get_version() -> &'static str {
    concat!("herald ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
pub(super) enum AppError {
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
}

impl From<ScheduleError> for AppError {
    fn from(e: ScheduleError) -> Self {
        match e {
            ScheduleError::NotFound(_) => AppError::NotFound(e.to_string()),
            ScheduleError::NotPending { .. } => AppError::Conflict(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
