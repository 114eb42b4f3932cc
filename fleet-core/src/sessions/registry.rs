use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::debug;

use super::session::WorkerSession;
use super::usage::UsageLimits;
use crate::areas::AreaId;

/// Maps worker identities to their sessions.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<WorkerSession>>>,
    limits: Arc<UsageLimits>,
    next_seq: AtomicU64,
}

impl SessionRegistry {
    pub fn new(limits: UsageLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            limits: Arc::new(limits),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn get_or_create(
        &self,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Arc<WorkerSession> {
        if let Some(existing) = self.sessions.read().get(worker_id) {
            return Arc::clone(existing);
        }

        let mut sessions = self.sessions.write();
        let session = sessions.entry(worker_id.to_string()).or_insert_with(|| {
            debug!(worker = worker_id, "creating worker session");
            Arc::new(WorkerSession::new(
                worker_id.to_string(),
                self.next_seq.fetch_add(1, Ordering::Relaxed),
                Arc::clone(&self.limits),
                now,
            ))
        });
        Arc::clone(session)
    }

    pub fn get(&self, worker_id: &str) -> Option<Arc<WorkerSession>> {
        self.sessions.read().get(worker_id).cloned()
    }

    pub fn touch(
        &self,
        worker_id: &str,
        host: Option<&str>,
        now: DateTime<Utc>,
    ) -> Arc<WorkerSession> {
        let session = self.get_or_create(worker_id, now);
        session.touch(host, now);
        session
    }

    pub fn reset_username(&self, worker_id: &str) -> Option<String> {
        self.get(worker_id)?.reset_username()
    }

    pub fn reset_area_and_route(&self, worker_id: &str) -> Option<AreaId> {
        self.get(worker_id)?.reset_area_and_route()
    }

    pub fn remove(&self, worker_id: &str) -> Option<Arc<WorkerSession>> {
        self.sessions.write().remove(worker_id)
    }

    /// Sessions bound to `area_id` in creation order.
    pub fn list_by_area(&self, area_id: AreaId) -> Vec<Arc<WorkerSession>> {
        let mut sessions: Vec<_> = self
            .sessions
            .read()
            .values()
            .filter(|session| session.area_id() == Some(area_id))
            .cloned()
            .collect();
        sessions.sort_by_key(|session| session.seq());
        sessions
    }

    pub fn list_all(&self) -> Vec<Arc<WorkerSession>> {
        let mut sessions: Vec<_> =
            self.sessions.read().values().cloned().collect();
        sessions.sort_by_key(|session| session.seq());
        sessions
    }

    pub fn count_live_in_area(
        &self,
        area_id: AreaId,
        now: DateTime<Utc>,
        unseen_threshold: Duration,
    ) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|session| {
                session.area_id() == Some(area_id)
                    && session.is_live(now, unseen_threshold)
            })
            .count()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry = SessionRegistry::new(UsageLimits::default());
        let now = Utc::now();
        let first = registry.get_or_create("w1", now);
        let second = registry.get_or_create("w1", now);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.area_id(), None);
        assert_eq!(first.last_seen(), now);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_list_by_area_follows_creation_order() {
        let registry = SessionRegistry::new(UsageLimits::default());
        let now = Utc::now();
        for id in ["c", "a", "b", "d"] {
            registry.get_or_create(id, now).set_area(AreaId(1));
        }
        registry.get_or_create("other", now).set_area(AreaId(2));

        let ids: Vec<_> = registry
            .list_by_area(AreaId(1))
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_count_live_excludes_stale_sessions() {
        let registry = SessionRegistry::new(UsageLimits::default());
        let now = Utc::now();
        let threshold = Duration::seconds(300);
        registry.get_or_create("fresh", now).set_area(AreaId(7));
        registry
            .get_or_create("stale", now - Duration::seconds(301))
            .set_area(AreaId(7));

        assert_eq!(registry.count_live_in_area(AreaId(7), now, threshold), 1);
        assert_eq!(registry.count_live_in_area(AreaId(8), now, threshold), 0);
    }

    #[test]
    fn test_remove_and_resets() {
        let registry = SessionRegistry::new(UsageLimits::default());
        let now = Utc::now();
        let session = registry.get_or_create("w1", now);
        session.set_area(AreaId(3));
        session.set_username("acc");

        assert_eq!(registry.reset_username("w1"), Some("acc".into()));
        assert_eq!(registry.reset_area_and_route("w1"), Some(AreaId(3)));
        assert!(registry.remove("w1").is_some());
        assert!(registry.get("w1").is_none());
        assert!(registry.is_empty());
    }
}
