use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use super::usage::{MessageType, UsageCounter, UsageLimits};
use crate::areas::{AreaId, RoutePart};

#[derive(Debug, Clone)]
struct SessionState {
    area_id: Option<AreaId>,
    username: Option<String>,
    start_step: usize,
    end_step: usize,
    step: usize,
    host: Option<String>,
    last_seen: DateTime<Utc>,
    has_route_part: bool,
}

/// Ephemeral state of one connected worker.
///
/// Mutable fields sit behind the session's own lock so that traffic from
/// one worker never waits on another.
pub struct WorkerSession {
    id: String,
    seq: u64,
    state: Mutex<SessionState>,
    usage: UsageCounter,
}

impl fmt::Debug for WorkerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSession")
            .field("id", &self.id)
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

/// Point-in-time copy of a session for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub uuid: String,
    pub area_id: Option<AreaId>,
    pub username: Option<String>,
    pub start_step: usize,
    pub end_step: usize,
    pub step: usize,
    pub host: Option<String>,
    pub last_seen: DateTime<Utc>,
    pub usage: HashMap<MessageType, u64>,
}

impl WorkerSession {
    pub(crate) fn new(
        id: String,
        seq: u64,
        limits: Arc<UsageLimits>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            seq,
            state: Mutex::new(SessionState {
                area_id: None,
                username: None,
                start_step: 0,
                end_step: 0,
                step: 0,
                host: None,
                last_seen: now,
                has_route_part: false,
            }),
            usage: UsageCounter::new(limits),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Creation order within the registry.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn usage(&self) -> &UsageCounter {
        &self.usage
    }

    pub fn area_id(&self) -> Option<AreaId> {
        self.state.lock().area_id
    }

    pub fn set_area(&self, area_id: AreaId) {
        self.state.lock().area_id = Some(area_id);
    }

    pub fn username(&self) -> Option<String> {
        self.state.lock().username.clone()
    }

    /// Binds a credential, returning the one previously bound if it differs.
    pub fn set_username(&self, username: &str) -> Option<String> {
        let mut state = self.state.lock();
        match state.username.replace(username.to_string()) {
            Some(previous) if previous != username => Some(previous),
            _ => None,
        }
    }

    pub fn touch(&self, host: Option<&str>, now: DateTime<Utc>) {
        let mut state = self.state.lock();
        state.last_seen = now;
        if let Some(host) = host {
            state.host = Some(host.to_string());
        }
    }

    pub fn host(&self) -> Option<String> {
        self.state.lock().host.clone()
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.state.lock().last_seen
    }

    pub fn is_live(&self, now: DateTime<Utc>, unseen_threshold: Duration) -> bool {
        now - self.last_seen() <= unseen_threshold
    }

    pub fn has_route_part(&self) -> bool {
        self.state.lock().has_route_part
    }

    /// Current segment bounds and cursor.
    pub fn route_part(&self) -> (RoutePart, usize) {
        let state = self.state.lock();
        (
            RoutePart {
                start: state.start_step,
                end: state.end_step,
            },
            state.step,
        )
    }

    pub(crate) fn assign_route_part(&self, part: RoutePart) {
        let mut state = self.state.lock();
        state.start_step = part.start;
        state.end_step = part.end;
        if !part.contains(state.step) {
            state.step = part.start;
        }
        state.has_route_part = true;
    }

    pub(crate) fn clear_route_part(&self) {
        let mut state = self.state.lock();
        state.start_step = 0;
        state.end_step = 0;
        state.step = 0;
        state.has_route_part = false;
    }

    /// Returns the step to scan and moves the cursor to the next step of
    /// the segment, wrapping from the end back to the start.
    pub fn advance_step(&self) -> usize {
        let mut state = self.state.lock();
        let current = state.step;
        state.step = if current >= state.end_step {
            state.start_step
        } else {
            current + 1
        };
        current
    }

    pub fn reset_username(&self) -> Option<String> {
        self.state.lock().username.take()
    }

    pub fn reset_area_and_route(&self) -> Option<AreaId> {
        let mut state = self.state.lock();
        state.start_step = 0;
        state.end_step = 0;
        state.step = 0;
        state.has_route_part = false;
        state.area_id.take()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().clone();
        SessionSnapshot {
            uuid: self.id.clone(),
            area_id: state.area_id,
            username: state.username,
            start_step: state.start_step,
            end_step: state.end_step,
            step: state.step,
            host: state.host,
            last_seen: state.last_seen,
            usage: self.usage.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> WorkerSession {
        WorkerSession::new(
            "worker-1".into(),
            0,
            Arc::new(UsageLimits::default()),
            Utc::now(),
        )
    }

    #[test]
    fn test_advance_step_wraps_inside_segment() {
        let session = session();
        session.assign_route_part(RoutePart { start: 4, end: 6 });
        let steps: Vec<usize> = (0..5).map(|_| session.advance_step()).collect();
        assert_eq!(steps, vec![4, 5, 6, 4, 5]);
    }

    #[test]
    fn test_assign_keeps_cursor_inside_new_segment() {
        let session = session();
        session.assign_route_part(RoutePart { start: 0, end: 9 });
        session.advance_step();
        session.advance_step();
        session.assign_route_part(RoutePart { start: 0, end: 3 });
        assert_eq!(session.route_part().1, 2);

        session.assign_route_part(RoutePart { start: 7, end: 9 });
        assert_eq!(session.route_part().1, 7);
    }

    #[test]
    fn test_set_username_reports_replaced_credential() {
        let session = session();
        assert_eq!(session.set_username("alpha"), None);
        assert_eq!(session.set_username("alpha"), None);
        assert_eq!(session.set_username("beta"), Some("alpha".to_string()));
        assert_eq!(session.reset_username(), Some("beta".to_string()));
        assert_eq!(session.username(), None);
    }

    #[test]
    fn test_touch_keeps_cursor() {
        let session = session();
        session.assign_route_part(RoutePart { start: 2, end: 5 });
        session.advance_step();
        let later = Utc::now() + Duration::seconds(30);
        session.touch(Some("10.0.0.2"), later);
        assert_eq!(session.route_part().1, 3);
        assert_eq!(session.last_seen(), later);
        assert_eq!(session.snapshot().host.as_deref(), Some("10.0.0.2"));
    }
}
