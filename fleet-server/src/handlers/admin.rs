//! Operator actions: hot reloads, quest start and account import.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use fleet_core::accounts::NewAccount;
use fleet_core::areas::AreaId;
use fleet_core::fleet::AreaReloadSummary;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::infra::app_state::AppState;
use crate::infra::errors::{AppError, AppResult};

pub async fn reload_areas(State(state): State<AppState>) -> AppResult<Json<AreaReloadSummary>> {
    let summary = state.fleet().reload_areas(Utc::now()).await?;
    Ok(Json(summary))
}

pub async fn reload_accounts(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let reload = state.fleet().reload_accounts().await?;
    Ok(Json(json!({
        "added": reload.added,
        "updated": reload.updated,
        "removed": reload.removed,
    })))
}

pub async fn start_quest(
    State(state): State<AppState>,
    Path(area_id): Path<AreaId>,
) -> AppResult<Json<Value>> {
    let started = state.fleet().start_questing(area_id).await?;
    info!(area_id = %area_id, started, "quest pass requested");
    Ok(Json(json!({ "status": "ok", "started": started })))
}

#[derive(Debug, Deserialize)]
pub struct ImportCredential {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportAccountsRequest {
    pub accounts: Vec<ImportCredential>,
    #[serde(default)]
    pub default_level: i32,
}

/// Bulk insert. Existing usernames are left untouched and the pool is
/// reloaded so new credentials become allocatable.
pub async fn import_accounts(
    State(state): State<AppState>,
    Json(request): Json<ImportAccountsRequest>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let accounts: Vec<NewAccount> = request
        .accounts
        .into_iter()
        .filter(|credential| !credential.username.is_empty())
        .map(|credential| NewAccount {
            username: credential.username,
            password: credential.password,
            level: request.default_level,
        })
        .collect();
    if accounts.is_empty() {
        return Err(AppError::bad_request("no accounts to import"));
    }

    let updated = state.fleet().accounts().import(&accounts).await?;
    info!(submitted = accounts.len(), updated, "accounts imported");
    Ok((StatusCode::ACCEPTED, Json(json!({ "updated": updated }))))
}
