use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use fleet_core::FleetError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<FleetError> for AppError {
    fn from(err: FleetError) -> Self {
        match err {
            FleetError::AccountNotFound(_)
            | FleetError::AreaNotFound(_)
            | FleetError::DeviceNotFound(_) => Self::not_found(err.to_string()),
            FleetError::NoAccountAvailable
            | FleetError::NoAreaNeedsWorkers
            | FleetError::NoAreaAllocated(_)
            | FleetError::NoTaskAvailable(_) => Self::new(StatusCode::CONFLICT, err.to_string()),
            FleetError::MalformedRoute { .. } | FleetError::Serialization(_) => {
                Self::bad_request(err.to_string())
            }
            FleetError::RouteCalculation(_) | FleetError::QuestNotifier(_) => {
                Self::bad_gateway(err.to_string())
            }
            FleetError::Store(_) => {
                tracing::error!(error = %err, "store operation failed");
                Self::internal("Store operation failed")
            }
            FleetError::StepOutOfRange { .. } | FleetError::Internal(_) => {
                Self::internal(err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}
