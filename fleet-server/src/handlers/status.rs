//! Read-only listings for operators.

use axum::{Json, extract::State};
use chrono::Utc;
use fleet_core::fleet::{AccountsOverview, AreaStatus};
use fleet_core::sessions::SessionSnapshot;

use crate::infra::app_state::AppState;

pub async fn list_areas(State(state): State<AppState>) -> Json<Vec<AreaStatus>> {
    Json(state.fleet().area_statuses(Utc::now()))
}

pub async fn list_workers(State(state): State<AppState>) -> Json<Vec<SessionSnapshot>> {
    Json(state.fleet().worker_statuses())
}

pub async fn list_accounts(State(state): State<AppState>) -> Json<AccountsOverview> {
    Json(state.fleet().accounts_overview(Utc::now()))
}
