use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::cache::{AreaCaches, EncounterKey, PokestopHandle};
use super::definition::AreaDefinition;
use super::partition::partition;
use super::quest::QuestSchedule;
use super::{AreaId, WorkerMode};
use crate::error::{FleetError, Result};
use crate::geo::{Geofence, Location};
use crate::providers::{QuestNotifier, RouteCalculator, TimezoneResolver};
use crate::sessions::WorkerSession;

#[derive(Debug)]
struct AreaState {
    name: String,
    target_workers: usize,
    route: Vec<Location>,
    quest_route: Vec<Location>,
    quest_fence: Geofence,
    quest: QuestSchedule,
    /// Next quest-route step to hand out while a quest pass is running.
    quest_pass: Option<usize>,
    last_recalculated: Option<DateTime<Utc>>,
}

/// A geographic work unit with its routes, quest schedule and caches.
///
/// The area lock serializes route recalculation. Session locks are only
/// ever taken while holding it, never the other way round.
pub struct WorkerArea {
    id: AreaId,
    state: Mutex<AreaState>,
    caches: OnceCell<AreaCaches>,
}

impl fmt::Debug for WorkerArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerArea")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AreaSnapshot {
    pub id: AreaId,
    pub name: String,
    pub target_workers: usize,
    pub route_len: usize,
    pub quest_route_len: usize,
    pub quest_hours: BTreeSet<u8>,
    pub has_quest_fence: bool,
    pub mode: WorkerMode,
    pub last_recalculated: Option<DateTime<Utc>>,
}

impl WorkerArea {
    pub fn new(definition: AreaDefinition) -> Self {
        Self {
            id: definition.id,
            state: Mutex::new(AreaState {
                name: definition.name,
                target_workers: definition.target_workers,
                route: definition.route,
                quest_route: definition.quest_route,
                quest_fence: definition.quest_fence,
                quest: QuestSchedule::new(definition.quest_hours),
                quest_pass: None,
                last_recalculated: None,
            }),
            caches: OnceCell::new(),
        }
    }

    pub fn id(&self) -> AreaId {
        self.id
    }

    pub fn name(&self) -> String {
        self.state.lock().name.clone()
    }

    pub fn target_workers(&self) -> usize {
        self.state.lock().target_workers
    }

    pub fn route_len(&self) -> usize {
        self.state.lock().route.len()
    }

    pub fn quest_route(&self) -> Vec<Location> {
        self.state.lock().quest_route.clone()
    }

    pub fn quest_fence(&self) -> Geofence {
        self.state.lock().quest_fence.clone()
    }

    pub fn quest_hours(&self) -> BTreeSet<u8> {
        self.state.lock().quest.hours().clone()
    }

    pub fn mode(&self) -> WorkerMode {
        if self.state.lock().quest_pass.is_some() {
            WorkerMode::Quest
        } else {
            WorkerMode::Pokemon
        }
    }

    /// Re-slices the pokemon route across the live sessions of
    /// `sessions`, which must be the sessions bound to this area in
    /// creation order. Stale sessions lose their segment. With no live
    /// session nothing changes. Returns the number of live sessions.
    pub fn recalculate_route_parts(
        &self,
        sessions: &[Arc<WorkerSession>],
        now: DateTime<Utc>,
        unseen_threshold: Duration,
    ) -> usize {
        let mut state = self.state.lock();
        let (live, stale): (Vec<_>, Vec<_>) = sessions
            .iter()
            .partition(|session| session.is_live(now, unseen_threshold));

        if live.is_empty() {
            warn!(area_id = %self.id, area = %state.name, "no active workers to recalculate area");
            return 0;
        }

        for session in &stale {
            session.clear_route_part();
        }

        let parts = partition(state.route.len(), live.len());
        if parts.is_empty() {
            warn!(area_id = %self.id, area = %state.name, "area has an empty route, nothing to partition");
            for session in &live {
                session.clear_route_part();
            }
            return live.len();
        }

        for (session, part) in live.iter().zip(parts) {
            session.assign_route_part(part);
        }
        state.last_recalculated = Some(now);

        debug!(
            area_id = %self.id,
            live = live.len(),
            stale = stale.len(),
            route_len = state.route.len(),
            "route parts recalculated"
        );
        live.len()
    }

    pub fn location_at_step(&self, mode: WorkerMode, step: usize) -> Result<Location> {
        let state = self.state.lock();
        let route = match mode {
            WorkerMode::Pokemon => &state.route,
            WorkerMode::Quest => &state.quest_route,
        };
        route.get(step).copied().ok_or(FleetError::StepOutOfRange {
            area: self.id,
            mode: mode.as_str(),
            step,
            len: route.len(),
        })
    }

    /// Where local time is taken for the quest schedule: the first quest
    /// waypoint, or the centre of the quest fence.
    fn quest_anchor(state: &AreaState) -> Option<Location> {
        state.quest_route.first().copied().or_else(|| {
            state
                .quest_fence
                .bounding_box()
                .map(|bbox| bbox.centre())
        })
    }

    /// True when quest scanning should start now. See [`QuestSchedule`].
    pub fn check_quests(&self, now: DateTime<Utc>, timezone: &dyn TimezoneResolver) -> bool {
        let mut state = self.state.lock();
        if state.quest.hours().is_empty() {
            return false;
        }
        let Some(anchor) = Self::quest_anchor(&state) else {
            return false;
        };
        let Some(offset) = timezone.offset_at(anchor, now) else {
            warn!(area_id = %self.id, area = %state.name, location = %anchor, "failed to resolve timezone for area");
            return false;
        };

        state.quest.check(now.with_timezone(&offset))
    }

    /// Prepares the area for a quest pass: asks the notifier to forget
    /// old quest state, computes a quest route if none is cached and
    /// clears the pokestop cache. Returns whether a quest route exists.
    pub async fn start_questing(
        &self,
        route_calculator: Option<&dyn RouteCalculator>,
        notifier: Option<&dyn QuestNotifier>,
    ) -> bool {
        let (name, fence, needs_route) = {
            let state = self.state.lock();
            (
                state.name.clone(),
                state.quest_fence.clone(),
                state.quest_route.is_empty(),
            )
        };

        if !fence.is_empty()
            && let Some(notifier) = notifier
            && let Err(err) = notifier.clear_quests(&fence).await
        {
            warn!(area_id = %self.id, area = %name, error = %err, "failed to clear quests upstream");
        }

        if needs_route {
            match route_calculator {
                Some(calculator) if !fence.is_empty() => {
                    info!(area_id = %self.id, area = %name, "calculating quest route");
                    match calculator.calculate_route(&name, &fence.closed()).await {
                        Ok(route) if !route.is_empty() => {
                            info!(area_id = %self.id, steps = route.len(), "quest route calculated");
                            self.state.lock().quest_route = route;
                        }
                        Ok(_) => {
                            warn!(area_id = %self.id, area = %name, "route calculator returned an empty quest route")
                        }
                        Err(err) => {
                            warn!(area_id = %self.id, area = %name, error = %err, "unable to calculate quest route")
                        }
                    }
                }
                _ => {
                    info!(area_id = %self.id, area = %name, "quest route is empty and cannot be calculated")
                }
            }
        }

        self.clear_quest_cache();

        let mut state = self.state.lock();
        if state.quest_route.is_empty() {
            return false;
        }
        state.quest_pass = Some(0);
        true
    }

    /// Next quest step of the running pass. The pass ends once every
    /// step of the quest route has been handed out.
    pub fn next_quest_step(&self) -> Option<usize> {
        let mut state = self.state.lock();
        let step = state.quest_pass?;
        if step >= state.quest_route.len() {
            state.quest_pass = None;
            info!(area_id = %self.id, area = %state.name, "quest pass finished");
            return None;
        }
        state.quest_pass = Some(step + 1);
        Some(step)
    }

    pub fn adjust_name(&self, name: String) {
        self.state.lock().name = name;
    }

    /// Replaces the pokemon route. Callers recalculate route parts.
    pub fn adjust_route(&self, route: Vec<Location>) {
        self.state.lock().route = route;
    }

    pub fn adjust_quest_route(&self, route: Vec<Location>) {
        let mut state = self.state.lock();
        if let Some(step) = state.quest_pass
            && step >= route.len()
        {
            state.quest_pass = None;
        }
        state.quest_route = route;
    }

    pub fn adjust_quest_fence(&self, fence: Geofence) {
        self.state.lock().quest_fence = fence;
    }

    pub fn adjust_workers(&self, target_workers: usize) {
        let mut state = self.state.lock();
        if state.target_workers != target_workers {
            debug!(
                area_id = %self.id,
                from = state.target_workers,
                to = target_workers,
                "area worker target changed"
            );
            state.target_workers = target_workers;
        }
    }

    pub fn adjust_quest_hours(&self, hours: BTreeSet<u8>) {
        self.state.lock().quest.set_hours(hours);
    }

    /// Applies the fields of `definition` that differ from the live area.
    /// Returns true when the route partition inputs changed.
    pub fn apply_definition(&self, definition: AreaDefinition) -> bool {
        let (name, route, quest_route, fence, target, hours) = {
            let state = self.state.lock();
            (
                state.name != definition.name,
                state.route != definition.route,
                state.quest_route != definition.quest_route,
                state.quest_fence != definition.quest_fence,
                state.target_workers != definition.target_workers,
                *state.quest.hours() != definition.quest_hours,
            )
        };

        if name {
            info!(area_id = %self.id, to = %definition.name, "reload: area name change");
            self.adjust_name(definition.name);
        }
        if fence {
            info!(area_id = %self.id, "reload: area quest fence change");
            self.adjust_quest_fence(definition.quest_fence);
        }
        if route {
            info!(area_id = %self.id, steps = definition.route.len(), "reload: area route change");
            self.adjust_route(definition.route);
        }
        if quest_route {
            info!(area_id = %self.id, steps = definition.quest_route.len(), "reload: area quest route change");
            self.adjust_quest_route(definition.quest_route);
        }
        if target {
            info!(area_id = %self.id, to = definition.target_workers, "reload: area worker change");
            self.adjust_workers(definition.target_workers);
        }
        if hours {
            info!(area_id = %self.id, "reload: area quest check hours change");
            self.adjust_quest_hours(definition.quest_hours);
        }

        route || target || fence
    }

    pub fn caches(&self) -> &AreaCaches {
        self.caches.get_or_init(AreaCaches::default)
    }

    pub fn pokestop_status(&self, stop_id: &str, now: DateTime<Utc>) -> PokestopHandle {
        self.caches().pokestop(stop_id, now)
    }

    pub fn record_encounter(&self, key: EncounterKey, now: DateTime<Utc>) -> bool {
        self.caches().record_encounter(key, now)
    }

    pub fn clear_quest_cache(&self) {
        self.caches().clear_pokestops();
    }

    /// Drops expired cache entries. Caches never touched stay uninitialized.
    pub fn purge_caches(&self, now: DateTime<Utc>) -> usize {
        self.caches
            .get()
            .map(|caches| caches.purge_expired(now))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> AreaSnapshot {
        let state = self.state.lock();
        AreaSnapshot {
            id: self.id,
            name: state.name.clone(),
            target_workers: state.target_workers,
            route_len: state.route.len(),
            quest_route_len: state.quest_route.len(),
            quest_hours: state.quest.hours().clone(),
            has_quest_fence: !state.quest_fence.is_empty(),
            mode: if state.quest_pass.is_some() {
                WorkerMode::Quest
            } else {
                WorkerMode::Pokemon
            },
            last_recalculated: state.last_recalculated,
        }
    }
}
