//! Long-running maintenance loops: the liveness sweep and the nightly
//! quest route rebuild. Both stop when the shutdown token is cancelled.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::fleet::Fleet;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct FleetScheduler {
    shutdown: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for FleetScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetScheduler")
            .field("shutdown_cancelled", &self.shutdown.is_cancelled())
            .field("tasks", &self.handles.lock().len())
            .finish()
    }
}

impl FleetScheduler {
    /// Starts both loops. Their first run is one interval after startup.
    pub fn spawn(fleet: Arc<Fleet>, shutdown: CancellationToken) -> Self {
        let handles = vec![
            tokio::spawn(liveness_loop(Arc::clone(&fleet), shutdown.clone())),
            tokio::spawn(quest_rebuild_loop(fleet, shutdown.clone())),
        ];
        Self {
            shutdown,
            handles: Mutex::new(handles),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancels the loops and waits for them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("maintenance task failed: {:?}", e),
                Err(_) => warn!("maintenance task timed out during shutdown"),
            }
        }
        info!("fleet scheduler stopped");
    }
}

async fn liveness_loop(fleet: Arc<Fleet>, shutdown: CancellationToken) {
    let period = fleet.settings().recalc_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = period.as_secs(), "liveness sweep started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("liveness sweep shutting down");
                break;
            }
            _ = ticker.tick() => {
                let recalculated = fleet.sweep_stale_sessions(Utc::now());
                debug!(recalculated, "liveness sweep finished");
            }
        }
    }
}

async fn quest_rebuild_loop(fleet: Arc<Fleet>, shutdown: CancellationToken) {
    let period = fleet.settings().quest_rebuild_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_secs = period.as_secs(), "quest route rebuild loop started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("quest route rebuild loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                rebuild_due_quest_routes(&fleet).await;
            }
        }
    }
}

/// Rebuilds the quest route of every area at its rebuild hour.
pub async fn rebuild_due_quest_routes(fleet: &Fleet) -> usize {
    let candidates = fleet.quest_rebuild_candidates(Utc::now());
    if candidates.is_empty() {
        return 0;
    }

    let results = join_all(candidates.iter().map(|area| async move {
        match fleet.rebuild_quest_route(area).await {
            Ok(_) => true,
            Err(err) => {
                warn!(area_id = %area.id(), area = %area.name(), error = %err, "quest route rebuild failed");
                false
            }
        }
    }))
    .await;
    results.into_iter().filter(|rebuilt| *rebuilt).count()
}
