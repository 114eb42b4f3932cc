pub mod api;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{controller::controller_handler, health::health_handler, raw::raw_handler};
use crate::infra::{app_state::AppState, auth::require_device_token};

pub const CONTROLLER: &str = "/controler";
pub const CONTROLLER_ALIAS: &str = "/controller";
pub const RAW: &str = "/raw";
pub const HEALTH: &str = "/health";

/// Worker routes, guarded by the device bearer token.
fn device_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(CONTROLLER, post(controller_handler))
        .route(CONTROLLER_ALIAS, post(controller_handler))
        .route(RAW, post(raw_handler))
        .route_layer(middleware::from_fn_with_state(state, require_device_token))
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route(HEALTH, get(health_handler))
        .merge(device_router(state.clone()))
        .nest("/api", api::create_api_router(state.clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
