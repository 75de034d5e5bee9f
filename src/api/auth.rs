//! Bearer-token guard for the admin endpoints

use super::handlers::AppError;
use super::AppState;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Require `Authorization: Bearer <HERALD_ADMIN_TOKEN>`.
///
/// With no token configured every request is rejected.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match (&state.admin_token, provided) {
        (Some(expected), Some(token)) if token == expected.as_ref() => next.run(req).await,
        (None, _) => AppError::Unauthorized("Admin API is disabled".into()).into_response(),
        (Some(_), None) => {
            AppError::Unauthorized("Missing bearer token".into()).into_response()
        }
        (Some(_), Some(_)) => {
            tracing::warn!(path = %req.uri().path(), "Admin call with bad token");
            AppError::Unauthorized("Invalid bearer token".into()).into_response()
        }
    }
}
