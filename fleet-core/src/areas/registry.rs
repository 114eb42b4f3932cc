use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use super::area::WorkerArea;
use super::definition::AreaDefinition;
use super::AreaId;
use crate::error::{FleetError, Result};
use crate::sessions::{SessionRegistry, WorkerSession};

/// Result of applying a fresh set of area definitions.
#[derive(Debug, Default)]
pub struct ReloadOutcome {
    pub added: Vec<AreaId>,
    /// Areas whose route or worker target changed.
    pub changed: Vec<AreaId>,
    /// Areas no longer defined. Their worker target is already zero.
    pub removed: Vec<Arc<WorkerArea>>,
}

impl ReloadOutcome {
    pub fn needs_recalculation(&self) -> impl Iterator<Item = AreaId> + '_ {
        self.added.iter().chain(self.changed.iter()).copied()
    }
}

#[derive(Debug, Default)]
pub struct AreaRegistry {
    areas: RwLock<HashMap<AreaId, Arc<WorkerArea>>>,
}

impl AreaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: Vec<AreaDefinition>) -> Self {
        let registry = Self::new();
        for definition in definitions {
            registry.register(definition);
        }
        registry
    }

    pub fn register(&self, definition: AreaDefinition) -> Arc<WorkerArea> {
        let area = Arc::new(WorkerArea::new(definition));
        self.areas.write().insert(area.id(), Arc::clone(&area));
        area
    }

    pub fn remove(&self, area_id: AreaId) -> Option<Arc<WorkerArea>> {
        self.areas.write().remove(&area_id)
    }

    pub fn get(&self, area_id: AreaId) -> Option<Arc<WorkerArea>> {
        self.areas.read().get(&area_id).cloned()
    }

    /// All areas ordered by id.
    pub fn list(&self) -> Vec<Arc<WorkerArea>> {
        let mut areas: Vec<_> = self.areas.read().values().cloned().collect();
        areas.sort_by_key(|area| area.id());
        areas
    }

    pub fn len(&self) -> usize {
        self.areas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.read().is_empty()
    }

    /// Binds `session` to the area with the fewest live workers among
    /// those still below their target, lowest id first on ties. A
    /// session already bound to a registered area keeps it.
    ///
    /// Returns the area and whether the binding is new.
    pub fn allocate_area(
        &self,
        session: &WorkerSession,
        sessions: &SessionRegistry,
        now: DateTime<Utc>,
        unseen_threshold: Duration,
    ) -> Result<(Arc<WorkerArea>, bool)> {
        // Write lock: concurrent allocations must see each other's bindings.
        let areas = self.areas.write();

        if let Some(bound) = session.area_id()
            && let Some(area) = areas.get(&bound)
        {
            return Ok((Arc::clone(area), false));
        }

        let mut candidates: Vec<_> = areas.values().collect();
        candidates.sort_by_key(|area| area.id());

        let mut best: Option<(&Arc<WorkerArea>, usize)> = None;
        for area in candidates {
            let live = sessions.count_live_in_area(area.id(), now, unseen_threshold);
            if live >= area.target_workers() {
                continue;
            }
            if best.is_none_or(|(_, fewest)| live < fewest) {
                best = Some((area, live));
            }
        }

        let (area, live) = best.ok_or(FleetError::NoAreaNeedsWorkers)?;
        session.set_area(area.id());
        info!(
            worker = session.id(),
            area_id = %area.id(),
            area = %area.name(),
            workers = live + 1,
            target = area.target_workers(),
            "worker allocated to area"
        );
        Ok((Arc::clone(area), true))
    }

    /// Reconciles the registry with `definitions`: new areas are added,
    /// existing ones are updated field by field and missing ones are
    /// drained to zero workers and evicted.
    pub fn apply(&self, definitions: Vec<AreaDefinition>) -> ReloadOutcome {
        let mut outcome = ReloadOutcome::default();
        let mut areas = self.areas.write();
        let incoming: HashSet<AreaId> = definitions.iter().map(|d| d.id).collect();

        for definition in definitions {
            let id = definition.id;
            match areas.get(&id) {
                Some(existing) => {
                    if existing.apply_definition(definition) {
                        outcome.changed.push(id);
                    }
                }
                None => {
                    info!(area_id = %id, area = %definition.name, "reload: new area");
                    areas.insert(id, Arc::new(WorkerArea::new(definition)));
                    outcome.added.push(id);
                }
            }
        }

        let stale: Vec<AreaId> = areas
            .keys()
            .filter(|id| !incoming.contains(id))
            .copied()
            .collect();
        for id in stale {
            if let Some(area) = areas.remove(&id) {
                info!(area_id = %id, area = %area.name(), "reload: area removed");
                area.adjust_workers(0);
                outcome.removed.push(area);
            }
        }

        outcome.added.sort();
        outcome.changed.sort();
        outcome.removed.sort_by_key(|area| area.id());
        debug!(
            added = outcome.added.len(),
            changed = outcome.changed.len(),
            removed = outcome.removed.len(),
            "area reload applied"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Geofence, Location};
    use crate::sessions::UsageLimits;

    fn definition(id: i32, target_workers: usize) -> AreaDefinition {
        AreaDefinition {
            id: AreaId(id),
            name: format!("area-{id}"),
            target_workers,
            route: vec![Location::new(1.0, 1.0), Location::new(2.0, 2.0)],
            quest_route: Vec::new(),
            quest_fence: Geofence::default(),
            quest_hours: Default::default(),
        }
    }

    const UNSEEN: Duration = Duration::seconds(300);

    #[test]
    fn test_allocate_prefers_fewest_workers() {
        let areas = AreaRegistry::from_definitions(vec![definition(1, 2), definition(2, 2)]);
        let sessions = SessionRegistry::new(UsageLimits::default());
        let now = Utc::now();

        let allocate = |id: &str| {
            let session = sessions.get_or_create(id, now);
            areas
                .allocate_area(&session, &sessions, now, UNSEEN)
                .map(|(area, _)| area.id())
        };

        assert_eq!(allocate("a").unwrap(), AreaId(1));
        assert_eq!(allocate("b").unwrap(), AreaId(2));
        assert_eq!(allocate("c").unwrap(), AreaId(1));
        assert_eq!(allocate("d").unwrap(), AreaId(2));
        assert!(matches!(allocate("e"), Err(FleetError::NoAreaNeedsWorkers)));
        // already bound
        assert_eq!(allocate("a").unwrap(), AreaId(1));
    }

    #[test]
    fn test_allocate_ignores_stale_workers() {
        let areas = AreaRegistry::from_definitions(vec![definition(1, 1)]);
        let sessions = SessionRegistry::new(UsageLimits::default());
        let start = Utc::now();
        let first = sessions.get_or_create("a", start);
        areas.allocate_area(&first, &sessions, start, UNSEEN).unwrap();

        let later = start + Duration::seconds(301);
        let second = sessions.get_or_create("b", later);
        let (area, newly) = areas.allocate_area(&second, &sessions, later, UNSEEN).unwrap();
        assert_eq!(area.id(), AreaId(1));
        assert!(newly);
    }

    #[test]
    fn test_apply_reports_added_changed_removed() {
        let areas = AreaRegistry::from_definitions(vec![definition(1, 2), definition(2, 2)]);
        let removed_handle = areas.get(AreaId(2)).unwrap();

        let outcome = areas.apply(vec![definition(1, 4), definition(3, 1)]);
        assert_eq!(outcome.added, vec![AreaId(3)]);
        assert_eq!(outcome.changed, vec![AreaId(1)]);
        assert_eq!(outcome.removed.len(), 1);
        assert_eq!(removed_handle.target_workers(), 0);
        assert!(areas.get(AreaId(2)).is_none());
        assert_eq!(
            outcome.needs_recalculation().collect::<Vec<_>>(),
            vec![AreaId(3), AreaId(1)]
        );
        assert_eq!(areas.list().iter().map(|a| a.id()).collect::<Vec<_>>(), vec![AreaId(1), AreaId(3)]);
    }
}
