//! Shared-secret guards for the worker and operator route groups.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::infra::app_state::AppState;

pub const API_SECRET_HEADER: &str = "X-Fleet-Secret";

fn unauthorised() -> Response {
    (StatusCode::UNAUTHORIZED, "Unauthorised").into_response()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
}

/// Worker routes: `Authorization: Bearer <token>` when a token is configured.
pub async fn require_device_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(token) = state.config().general.bearer_token.as_deref() {
        let received = header_value(request.headers(), header::AUTHORIZATION.as_str());
        let presented = received.strip_prefix("Bearer ");
        if presented != Some(token) {
            error!(path = %request.uri().path(), "incorrect device authorisation received");
            return unauthorised();
        }
    }
    next.run(request).await
}

/// Operator routes: the api secret header when a secret is configured.
pub async fn require_api_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(secret) = state.config().general.api_secret.as_deref()
        && header_value(request.headers(), API_SECRET_HEADER) != secret
    {
        error!(path = %request.uri().path(), "incorrect api secret received");
        return unauthorised();
    }
    next.run(request).await
}
