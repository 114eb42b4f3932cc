//! Areas: route partitioning, quest scheduling and per-area dedup caches.

mod area;
pub mod cache;
mod definition;
mod partition;
mod quest;
mod registry;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use area::{AreaSnapshot, WorkerArea};
pub use cache::{AreaCaches, EncounterKey, PokestopHandle, PokestopQuestInfo, TtlCache};
pub use definition::AreaDefinition;
pub use partition::{RoutePart, partition};
pub use quest::QuestSchedule;
pub use registry::{AreaRegistry, ReloadOutcome};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AreaId(pub i32);

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which route of an area a job is served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerMode {
    Pokemon,
    Quest,
}

impl WorkerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerMode::Pokemon => "pokemon",
            WorkerMode::Quest => "quest",
        }
    }
}
