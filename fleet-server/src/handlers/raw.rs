//! Raw telemetry intake. The body is counted against the usage ceilings
//! and relayed unchanged to the configured data processors.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use fleet_core::fleet::RawReport;
use fleet_core::sessions::MessageType;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::ClientHost;
use crate::infra::app_state::AppState;

#[derive(Debug, Deserialize)]
struct RawContent {
    #[serde(default)]
    method: MessageType,
}

#[derive(Debug, Deserialize)]
struct RawBody {
    uuid: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    trainerlvl: i32,
    #[serde(default)]
    contents: Vec<RawContent>,
}

impl RawBody {
    fn into_report(self) -> RawReport {
        RawReport {
            worker_id: self.uuid,
            username: Some(self.username).filter(|name| !name.is_empty()),
            trainer_level: self.trainerlvl,
            methods: self.contents.into_iter().map(|content| content.method).collect(),
        }
    }
}

pub async fn raw_handler(State(state): State<AppState>, host: ClientHost, payload: Bytes) -> Response {
    let body: RawBody = match serde_json::from_slice(&payload) {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, "raw payload in wrong format");
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() })))
                .into_response();
        }
    };

    let report = body.into_report();
    debug!(worker = %report.worker_id, contents = report.methods.len(), "raw received");

    state.raw_forwarder.forward(payload);

    let outcome = state
        .fleet()
        .record_raw(&report, host.as_deref(), Utc::now())
        .await;
    if let Some(username) = outcome.disabled_account {
        warn!(worker = %report.worker_id, username = %username, "account disabled after exceeding usage limits");
    }

    StatusCode::OK.into_response()
}
