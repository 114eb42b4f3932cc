//! Ports for the external services the fleet calls out to.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};

use crate::error::Result;
use crate::geo::{Geofence, Location};

/// Computes a short covering route through the points inside a polygon.
#[async_trait]
pub trait RouteCalculator: Send + Sync {
    /// `fence` is closed: its first and last points are equal.
    async fn calculate_route(&self, instance: &str, fence: &[Location]) -> Result<Vec<Location>>;
}

/// Asks the upstream data processor to forget quest state inside a fence.
#[async_trait]
pub trait QuestNotifier: Send + Sync {
    async fn clear_quests(&self, fence: &Geofence) -> Result<()>;
}

/// Resolves the local UTC offset at a location.
pub trait TimezoneResolver: Send + Sync {
    fn offset_at(&self, location: Location, now: DateTime<Utc>) -> Option<FixedOffset>;
}

/// Same offset everywhere. Used by tests and when no timezone data is wanted.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimezone(pub FixedOffset);

impl TimezoneResolver for FixedTimezone {
    fn offset_at(&self, _location: Location, _now: DateTime<Utc>) -> Option<FixedOffset> {
        Some(self.0)
    }
}

impl Default for FixedTimezone {
    fn default() -> Self {
        Self(Utc.fix())
    }
}
