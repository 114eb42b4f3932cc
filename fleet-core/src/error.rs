use thiserror::Error;

use crate::areas::AreaId;

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("No account available")]
    NoAccountAvailable,

    #[error("No area needs workers")]
    NoAreaNeedsWorkers,

    #[error("No task available for worker {0}")]
    NoTaskAvailable(String),

    #[error("No area allocated to worker {0}")]
    NoAreaAllocated(String),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Area not found: {0}")]
    AreaNotFound(AreaId),

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Step {step} is outside the {mode} route of area {area} (length {len})")]
    StepOutOfRange {
        area: AreaId,
        mode: &'static str,
        step: usize,
        len: usize,
    },

    #[error("Malformed {field} in area {area}: {reason}")]
    MalformedRoute {
        area: AreaId,
        field: &'static str,
        reason: String,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("Route calculation failed: {0}")]
    RouteCalculation(String),

    #[error("Quest notifier failed: {0}")]
    QuestNotifier(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, FleetError>;
