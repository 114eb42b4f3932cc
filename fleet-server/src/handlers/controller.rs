//! Worker controller: one POST endpoint dispatching on the event `type`.
//!
//! Protocol outcomes are always HTTP 200 with a `status` envelope. Only a
//! malformed body, an unknown event type or a missing username on an
//! account event are HTTP errors.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use fleet_core::FleetError;
use fleet_core::fleet::AccountEvent;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::ClientHost;
use crate::infra::app_state::AppState;
use crate::infra::errors::{AppError, AppResult};

pub const PROVIDER: &str = "fleet-controller";

#[derive(Debug, Clone, Deserialize)]
pub struct ControllerBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub uuid: String,
    #[serde(default)]
    pub username: String,
}

/// Error codes understood by the worker client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControllerErrorCode {
    AccountNotFound,
    NoAccountLeft,
    DeviceNotFound,
    InstanceNotFound,
    NoTaskLeft,
}

impl ControllerErrorCode {
    /// Protocol-level outcomes. Anything else is a server failure.
    fn from_fleet_error(err: &FleetError) -> Option<Self> {
        match err {
            FleetError::AccountNotFound(_) => Some(Self::AccountNotFound),
            FleetError::NoAccountAvailable => Some(Self::NoAccountLeft),
            FleetError::DeviceNotFound(_) => Some(Self::DeviceNotFound),
            FleetError::NoAreaAllocated(_)
            | FleetError::NoAreaNeedsWorkers
            | FleetError::AreaNotFound(_) => Some(Self::InstanceNotFound),
            FleetError::NoTaskAvailable(_) => Some(Self::NoTaskLeft),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ControllerReply {
    Ok,
    Data(Value),
    Error(ControllerErrorCode),
    UnknownEvent,
}

impl IntoResponse for ControllerReply {
    fn into_response(self) -> Response {
        let body = match self {
            Self::Ok => json!({ "status": "ok" }),
            Self::Data(data) => json!({ "status": "ok", "data": data }),
            Self::Error(code) => json!({ "status": "error", "error": code }),
            Self::UnknownEvent => {
                return (StatusCode::BAD_REQUEST, Json(json!({ "status": "error" }))).into_response();
            }
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

fn reply(result: fleet_core::Result<ControllerReply>) -> AppResult<ControllerReply> {
    match result {
        Ok(reply) => Ok(reply),
        Err(err) => match ControllerErrorCode::from_fleet_error(&err) {
            Some(code) => {
                debug!(error = %err, ?code, "controller event refused");
                Ok(ControllerReply::Error(code))
            }
            None => Err(AppError::from(err)),
        },
    }
}

fn account_event(kind: &str) -> Option<AccountEvent> {
    match kind {
        "account_banned" => Some(AccountEvent::Banned),
        "account_suspended" => Some(AccountEvent::Suspended),
        "account_warning" => Some(AccountEvent::Warned),
        "account_invalid_credentials" => Some(AccountEvent::InvalidCredentials),
        "account_unknown_error" => Some(AccountEvent::UnknownError),
        _ => None,
    }
}

pub async fn controller_handler(
    State(state): State<AppState>,
    host: ClientHost,
    body: Result<Json<ControllerBody>, JsonRejection>,
) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "controller request in wrong format");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": rejection.body_text() })),
            )
                .into_response();
        }
    };
    debug!(worker = %body.uuid, kind = %body.kind, host = ?host.as_deref(), "controller event");

    match dispatch(&state, &body, host.as_deref()).await {
        Ok(reply) => reply.into_response(),
        Err(err) => err.into_response(),
    }
}

async fn dispatch(
    state: &AppState,
    body: &ControllerBody,
    host: Option<&str>,
) -> AppResult<ControllerReply> {
    let fleet = state.fleet();
    let now = Utc::now();
    let worker = body.uuid.as_str();

    if let Some(event) = account_event(&body.kind) {
        if body.username.is_empty() {
            return Err(AppError::bad_request("username is required"));
        }
        return reply(
            fleet
                .report_account(&body.username, event, now)
                .await
                .map(|()| ControllerReply::Ok),
        );
    }

    match body.kind.as_str() {
        "init" => {
            let assigned = match fleet.init_worker(worker, host, now).await {
                Ok(area) => {
                    info!(worker, area_id = %area.id(), area = %area.name(), "allocated area to worker");
                    true
                }
                Err(err) => {
                    warn!(worker, error = %err, "failed to allocate area");
                    false
                }
            };
            Ok(ControllerReply::Data(json!({
                "assigned": assigned,
                "version": env!("CARGO_PKG_VERSION"),
                "commit": option_env!("FLEET_GIT_COMMIT").unwrap_or("unknown"),
                "provider": PROVIDER,
            })))
        }
        "heartbeat" => {
            fleet.heartbeat(worker, host, now).await;
            Ok(ControllerReply::Ok)
        }
        "get_account" => reply(
            fleet
                .assign_account(worker, host, now)
                .await
                .map(|credentials| {
                    ControllerReply::Data(json!({
                        "username": credentials.username,
                        "password": credentials.password,
                    }))
                }),
        ),
        "get_job" => {
            let username = Some(body.username.as_str()).filter(|name| !name.is_empty());
            match fleet.next_job(worker, username, host, now).await {
                Ok(job) => {
                    info!(worker, ?job, "sending task");
                    Ok(ControllerReply::Data(serde_json::to_value(job).map_err(FleetError::from)?))
                }
                Err(err) => reply(Err(err)),
            }
        }
        "tutorial_done" => reply(fleet.tutorial_done(worker).await.map(|()| ControllerReply::Ok)),
        "logged_out" => reply(fleet.logout(worker, now).await.map(|()| ControllerReply::Ok)),
        other => {
            warn!(worker, kind = other, "unknown controller event");
            Ok(ControllerReply::UnknownEvent)
        }
    }
}
