use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::handlers::{admin, status};
use crate::infra::{app_state::AppState, auth::require_api_secret};

pub const AREAS: &str = "/areas";
pub const AREAS_RELOAD: &str = "/areas/reload";
pub const AREA_QUEST: &str = "/areas/{id}/quest";
pub const WORKERS: &str = "/workers";
pub const ACCOUNTS: &str = "/accounts";
pub const ACCOUNTS_RELOAD: &str = "/accounts/reload";

/// Operator routes, guarded by the api secret header.
pub fn create_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(AREAS, get(status::list_areas))
        .route(AREAS_RELOAD, post(admin::reload_areas))
        .route(AREA_QUEST, post(admin::start_quest))
        .route(WORKERS, get(status::list_workers))
        .route(
            ACCOUNTS,
            get(status::list_accounts).post(admin::import_accounts),
        )
        .route(ACCOUNTS_RELOAD, post(admin::reload_accounts))
        .route_layer(middleware::from_fn_with_state(state, require_api_secret))
}
