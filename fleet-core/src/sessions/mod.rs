//! Worker sessions: per-connection assignment, route cursor, liveness and
//! usage counters.

mod registry;
mod session;
mod usage;

pub use registry::SessionRegistry;
pub use session::{SessionSnapshot, WorkerSession};
pub use usage::{MessageType, UsageCounter, UsageLimits};
