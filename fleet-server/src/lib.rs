//! # Fleet Server
//!
//! HTTP transport for the fleet coordination engine: the worker controller
//! protocol, raw telemetry intake and relay, and the operator API.

pub mod clients;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use infra::app_state::AppState;
pub use routes::create_app;
