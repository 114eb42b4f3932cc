//! The coordination facade the transport layer talks to.
//!
//! `Fleet` owns the credential pool, the session registry and the area
//! registry and wires them to the store and the external services. Each
//! method is one worker or operator event.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::accounts::{AccountPool, AccountReload, AccountStats, AccountStatus, Credentials, level_between};
use crate::areas::{AreaDefinition, AreaId, AreaRegistry, AreaSnapshot, ReloadOutcome, WorkerArea, WorkerMode};
use crate::database::FleetStores;
use crate::database::ports::devices::DeviceRecord;
use crate::error::{FleetError, Result};
use crate::geo::Location;
use crate::providers::{FixedTimezone, QuestNotifier, RouteCalculator, TimezoneResolver};
use crate::sessions::{MessageType, SessionRegistry, SessionSnapshot, UsageLimits, WorkerSession};

/// Tunables of the coordination engine.
#[derive(Debug, Clone)]
pub struct FleetSettings {
    /// A session not seen for longer than this is stale.
    pub unseen_threshold: Duration,
    pub usage_limits: UsageLimits,
    pub recalc_interval: std::time::Duration,
    pub quest_rebuild_interval: std::time::Duration,
    /// Local hour at which quest routes are rebuilt.
    pub quest_rebuild_hour: u32,
    pub min_level: i32,
    pub max_level: i32,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            unseen_threshold: Duration::seconds(300),
            usage_limits: UsageLimits::default(),
            recalc_interval: std::time::Duration::from_secs(5 * 60),
            quest_rebuild_interval: std::time::Duration::from_secs(60 * 60),
            quest_rebuild_hour: 23,
            min_level: 30,
            max_level: 40,
        }
    }
}

/// External services. Absent ones are skipped where they are optional.
#[derive(Clone)]
pub struct FleetServices {
    pub route_calculator: Option<Arc<dyn RouteCalculator>>,
    pub quest_notifier: Option<Arc<dyn QuestNotifier>>,
    pub timezone: Arc<dyn TimezoneResolver>,
}

impl fmt::Debug for FleetServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FleetServices")
            .field("route_calculator", &self.route_calculator.is_some())
            .field("quest_notifier", &self.quest_notifier.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for FleetServices {
    fn default() -> Self {
        Self {
            route_calculator: None,
            quest_notifier: None,
            timezone: Arc::new(FixedTimezone::default()),
        }
    }
}

/// Work handed to a worker by `get_job`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Job {
    ScanPokemon {
        lat: f64,
        lon: f64,
        min_level: i32,
        max_level: i32,
    },
    ScanQuest {
        lat: f64,
        lon: f64,
        quest_type: &'static str,
        min_level: i32,
        max_level: i32,
    },
    SwitchAccount {
        min_level: i32,
        max_level: i32,
    },
}

/// Account problems a worker can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountEvent {
    Banned,
    Suspended,
    Warned,
    InvalidCredentials,
    UnknownError,
}

/// One raw telemetry submission, reduced to what the engine needs.
#[derive(Debug, Clone, Default)]
pub struct RawReport {
    pub worker_id: String,
    pub username: Option<String>,
    pub trainer_level: i32,
    pub methods: Vec<MessageType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawOutcome {
    /// Set when a usage ceiling tripped and the credential was disabled.
    pub disabled_account: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AreaStatus {
    #[serde(flatten)]
    pub area: AreaSnapshot,
    pub bound_workers: usize,
    pub live_workers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountsOverview {
    pub stats: AccountStats,
    pub accounts: Vec<AccountStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapSummary {
    pub accounts: usize,
    pub areas: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AreaReloadSummary {
    pub added: Vec<AreaId>,
    pub changed: Vec<AreaId>,
    pub removed: Vec<AreaId>,
}

impl From<&ReloadOutcome> for AreaReloadSummary {
    fn from(outcome: &ReloadOutcome) -> Self {
        Self {
            added: outcome.added.clone(),
            changed: outcome.changed.clone(),
            removed: outcome.removed.iter().map(|area| area.id()).collect(),
        }
    }
}

pub struct Fleet {
    settings: FleetSettings,
    accounts: AccountPool,
    sessions: SessionRegistry,
    areas: AreaRegistry,
    stores: FleetStores,
    services: FleetServices,
}

impl fmt::Debug for Fleet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fleet")
            .field("settings", &self.settings)
            .field("accounts", &self.accounts.len())
            .field("sessions", &self.sessions.len())
            .field("areas", &self.areas.len())
            .finish_non_exhaustive()
    }
}

impl Fleet {
    pub fn new(settings: FleetSettings, stores: FleetStores, services: FleetServices) -> Self {
        Self {
            accounts: AccountPool::new(Arc::clone(&stores.accounts)),
            sessions: SessionRegistry::new(settings.usage_limits.clone()),
            areas: AreaRegistry::new(),
            settings,
            stores,
            services,
        }
    }

    pub fn settings(&self) -> &FleetSettings {
        &self.settings
    }

    pub fn accounts(&self) -> &AccountPool {
        &self.accounts
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn areas(&self) -> &AreaRegistry {
        &self.areas
    }

    /// Startup load. Accounts never released are stamped released so the
    /// allocator can pick them; a malformed area row aborts startup.
    pub async fn bootstrap(&self, now: DateTime<Utc>) -> Result<BootstrapSummary> {
        match self.stores.accounts.mark_all_released(now).await {
            Ok(updated) if updated > 0 => info!(updated, "marked unreleased accounts as released"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "failed to mark unreleased accounts as released"),
        }

        self.accounts.reload().await?;

        let records = self.stores.areas.load_areas().await?;
        for record in &records {
            let definition = AreaDefinition::from_record_strict(record)?;
            info!(
                area_id = %definition.id,
                area = %definition.name,
                workers = definition.target_workers,
                steps = definition.route.len(),
                "area loaded"
            );
            self.areas.register(definition);
        }

        let summary = BootstrapSummary {
            accounts: self.accounts.len(),
            areas: self.areas.len(),
        };
        info!(accounts = summary.accounts, areas = summary.areas, "fleet bootstrapped");
        Ok(summary)
    }

    fn level_predicate(&self) -> impl Fn(&crate::accounts::Account) -> bool + Send + Sync {
        level_between(self.settings.min_level, self.settings.max_level)
    }

    /// Re-slices an area's route over its currently bound sessions.
    pub fn recalculate_area(&self, area: &WorkerArea, now: DateTime<Utc>) -> usize {
        let sessions = self.sessions.list_by_area(area.id());
        area.recalculate_route_parts(&sessions, now, self.settings.unseen_threshold)
    }

    fn bound_area(&self, session: &WorkerSession) -> Result<Arc<WorkerArea>> {
        session
            .area_id()
            .and_then(|id| self.areas.get(id))
            .ok_or_else(|| FleetError::NoAreaAllocated(session.id().to_string()))
    }

    async fn persist_device(&self, session: &WorkerSession, now: DateTime<Utc>) {
        let device = DeviceRecord {
            uuid: session.id().to_string(),
            area_id: session.area_id(),
            account_username: session.username(),
            last_host: session.host(),
            last_seen: now,
        };
        if let Err(err) = self.stores.devices.touch_device(&device).await {
            warn!(worker = session.id(), error = %err, "failed to persist device");
        }
    }

    /// `init`: binds the worker to an area. A new binding triggers a
    /// route recalculation of that area.
    pub async fn init_worker(
        &self,
        worker_id: &str,
        host: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Arc<WorkerArea>> {
        let session = self.sessions.touch(worker_id, host, now);
        let (area, newly_bound) =
            self.areas
                .allocate_area(&session, &self.sessions, now, self.settings.unseen_threshold)?;
        if newly_bound {
            self.recalculate_area(&area, now);
        }
        self.persist_device(&session, now).await;
        Ok(area)
    }

    pub async fn heartbeat(&self, worker_id: &str, host: Option<&str>, now: DateTime<Utc>) {
        let session = self.sessions.touch(worker_id, host, now);
        self.persist_device(&session, now).await;
    }

    /// `get_account`: hands the worker a credential within the configured
    /// level range. A different credential held before is released.
    pub async fn assign_account(
        &self,
        worker_id: &str,
        host: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Credentials> {
        let session = self.sessions.touch(worker_id, host, now);
        let area = self.bound_area(&session)?;

        let credentials = self
            .accounts
            .allocate(self.level_predicate(), now)
            .await
            .ok_or(FleetError::NoAccountAvailable)?;

        if let Some(previous) = session.set_username(&credentials.username) {
            debug!(worker = worker_id, previous = %previous, username = %credentials.username, "worker switched account");
            self.accounts.release(&previous, now).await;
        }

        self.recalculate_area(&area, now);
        self.persist_device(&session, now).await;
        Ok(credentials)
    }

    /// `get_job`: a switch request when the credential can no longer be
    /// used, a quest step while the area runs a quest pass, otherwise the
    /// next step of the worker's route segment.
    pub async fn next_job(
        &self,
        worker_id: &str,
        username: Option<&str>,
        host: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Job> {
        let session = self.sessions.touch(worker_id, host, now);
        let (min_level, max_level) = (self.settings.min_level, self.settings.max_level);

        let username = match username.filter(|name| !name.is_empty()) {
            Some(name) => name.to_string(),
            None => session
                .username()
                .ok_or_else(|| FleetError::AccountNotFound(String::new()))?,
        };
        if !self.accounts.is_valid(&username, now)? {
            info!(worker = worker_id, username = %username, "account no longer usable, requesting switch");
            return Ok(Job::SwitchAccount { min_level, max_level });
        }

        let area = self.bound_area(&session)?;

        if area.check_quests(now, self.services.timezone.as_ref()) {
            info!(area_id = %area.id(), area = %area.name(), "quest hour reached, starting quest pass");
            self.start_questing_area(&area).await;
        }

        if let Some(step) = area.next_quest_step() {
            let location = area.location_at_step(WorkerMode::Quest, step)?;
            debug!(worker = worker_id, step, %location, "sending quest task");
            return Ok(Job::ScanQuest {
                lat: location.latitude,
                lon: location.longitude,
                quest_type: "normal",
                min_level,
                max_level,
            });
        }

        if !session.has_route_part() {
            self.recalculate_area(&area, now);
            if !session.has_route_part() {
                return Err(FleetError::NoTaskAvailable(worker_id.to_string()));
            }
        }

        let step = session.advance_step();
        let location = area.location_at_step(WorkerMode::Pokemon, step)?;
        debug!(worker = worker_id, step, %location, "sending pokemon task");
        Ok(Job::ScanPokemon {
            lat: location.latitude,
            lon: location.longitude,
            min_level,
            max_level,
        })
    }

    /// Applies a reported account problem. Unknown usernames are a miss.
    pub async fn report_account(
        &self,
        username: &str,
        event: AccountEvent,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.accounts.exists(username) {
            return Err(FleetError::AccountNotFound(username.to_string()));
        }
        info!(username, ?event, "account event reported");
        match event {
            AccountEvent::Banned => {
                self.accounts.mark_banned(username, now).await;
            }
            AccountEvent::Suspended => {
                self.accounts.mark_suspended(username, now).await;
            }
            AccountEvent::Warned => {
                self.accounts.mark_warned(username, now).await;
            }
            AccountEvent::InvalidCredentials => {
                self.accounts.mark_invalid(username).await;
                self.accounts.mark_disabled(username, now).await;
            }
            AccountEvent::UnknownError => {
                self.accounts.mark_disabled(username, now).await;
            }
        }
        Ok(())
    }

    /// `tutorial_done`: the credential is taken from the session, or from
    /// the persisted device when the session is gone.
    pub async fn tutorial_done(&self, worker_id: &str) -> Result<()> {
        let username = match self.sessions.get(worker_id).and_then(|s| s.username()) {
            Some(username) => username,
            None => {
                let device = self
                    .stores
                    .devices
                    .get_device(worker_id)
                    .await?
                    .ok_or_else(|| FleetError::DeviceNotFound(worker_id.to_string()))?;
                device
                    .account_username
                    .ok_or_else(|| FleetError::AccountNotFound(String::new()))?
            }
        };
        if !self.accounts.exists(&username) {
            return Err(FleetError::AccountNotFound(username));
        }
        self.accounts.mark_tutorial_done(&username).await;
        Ok(())
    }

    /// `logged_out`: releases the credential, forgets the session and
    /// rebalances the area it was working.
    pub async fn logout(&self, worker_id: &str, now: DateTime<Utc>) -> Result<()> {
        let Some(session) = self.sessions.remove(worker_id) else {
            if self.stores.devices.get_device(worker_id).await?.is_none() {
                return Err(FleetError::DeviceNotFound(worker_id.to_string()));
            }
            if let Err(err) = self.stores.devices.set_device_account(worker_id, None).await {
                warn!(worker = worker_id, error = %err, "failed to clear device account");
            }
            return Ok(());
        };

        if let Some(username) = session.reset_username() {
            self.accounts.release(&username, now).await;
        }
        if let Some(area_id) = session.reset_area_and_route()
            && let Some(area) = self.areas.get(area_id)
        {
            self.recalculate_area(&area, now);
        }
        if let Err(err) = self.stores.devices.set_device_account(worker_id, None).await {
            warn!(worker = worker_id, error = %err, "failed to clear device account");
        }
        info!(worker = worker_id, "worker logged out");
        Ok(())
    }

    /// Raw telemetry: counts the reported methods against the usage
    /// ceilings and disables the credential when one is exceeded.
    pub async fn record_raw(
        &self,
        report: &RawReport,
        host: Option<&str>,
        now: DateTime<Utc>,
    ) -> RawOutcome {
        let session = self.sessions.touch(&report.worker_id, host, now);
        let username = report
            .username
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| session.username());

        if report.trainer_level > 0
            && let Some(username) = &username
        {
            self.accounts.set_level(username, report.trainer_level).await;
        }

        for method in &report.methods {
            session.usage().increment(*method);
        }

        if !session.usage().limit_exceeded() {
            return RawOutcome::default();
        }

        let counts = session.usage().snapshot();
        session.usage().reset();
        let bound = session.reset_username();
        let held = bound.is_some();
        let Some(username) = bound.or(username) else {
            warn!(worker = %report.worker_id, ?counts, "usage limit exceeded without a bound account");
            return RawOutcome::default();
        };
        warn!(
            worker = %report.worker_id,
            username = %username,
            ?counts,
            "usage limit exceeded, disabling account"
        );
        self.accounts.mark_disabled(&username, now).await;
        // the session no longer holds it, the disable cooldown gates reuse
        if held {
            self.accounts.release(&username, now).await;
        }
        RawOutcome {
            disabled_account: Some(username),
        }
    }

    /// Hot reload of the area list. Malformed fields are logged and
    /// treated as empty. Sessions of removed areas become unassigned.
    pub async fn reload_areas(&self, now: DateTime<Utc>) -> Result<AreaReloadSummary> {
        let records = self.stores.areas.load_areas().await?;
        let definitions = records
            .iter()
            .map(AreaDefinition::from_record_lenient)
            .collect();

        let outcome = self.areas.apply(definitions);
        for area in &outcome.removed {
            for session in self.sessions.list_by_area(area.id()) {
                session.reset_area_and_route();
            }
        }
        for area_id in outcome.needs_recalculation() {
            if let Some(area) = self.areas.get(area_id) {
                self.recalculate_area(&area, now);
            }
        }

        let summary = AreaReloadSummary::from(&outcome);
        info!(
            added = summary.added.len(),
            changed = summary.changed.len(),
            removed = summary.removed.len(),
            "areas reloaded"
        );
        Ok(summary)
    }

    pub async fn reload_accounts(&self) -> Result<AccountReload> {
        self.accounts.reload().await
    }

    pub async fn start_questing(&self, area_id: AreaId) -> Result<bool> {
        let area = self.areas.get(area_id).ok_or(FleetError::AreaNotFound(area_id))?;
        Ok(self.start_questing_area(&area).await)
    }

    async fn start_questing_area(&self, area: &WorkerArea) -> bool {
        area.start_questing(
            self.services.route_calculator.as_deref(),
            self.services.quest_notifier.as_deref(),
        )
        .await
    }

    /// Areas with a quest fence whose local hour is the rebuild hour.
    pub fn quest_rebuild_candidates(&self, now: DateTime<Utc>) -> Vec<Arc<WorkerArea>> {
        self.areas
            .list()
            .into_iter()
            .filter(|area| {
                let Some(centre) = area.quest_fence().bounding_box().map(|b| b.centre()) else {
                    return false;
                };
                match self.services.timezone.offset_at(centre, now) {
                    Some(offset) => {
                        now.with_timezone(&offset).hour() == self.settings.quest_rebuild_hour
                    }
                    None => {
                        warn!(area_id = %area.id(), location = %centre, "failed to resolve timezone for area");
                        false
                    }
                }
            })
            .collect()
    }

    /// Recomputes an area's quest route from its fence and persists it.
    /// On failure the previous route stays in place.
    pub async fn rebuild_quest_route(&self, area: &WorkerArea) -> Result<Vec<Location>> {
        let calculator = self
            .services
            .route_calculator
            .as_ref()
            .ok_or_else(|| FleetError::RouteCalculation("no route calculator configured".into()))?;
        let fence = area.quest_fence();
        if fence.is_empty() {
            return Err(FleetError::RouteCalculation(format!(
                "area {} has no quest fence",
                area.id()
            )));
        }

        let route = calculator.calculate_route(&area.name(), &fence.closed()).await?;
        if route.is_empty() {
            return Err(FleetError::RouteCalculation(format!(
                "empty quest route for area {}",
                area.id()
            )));
        }

        area.adjust_quest_route(route.clone());
        if let Err(err) = self
            .stores
            .areas
            .update_area_quest_route(area.id(), &route)
            .await
        {
            error!(area_id = %area.id(), error = %err, "failed to persist quest route");
        }
        info!(area_id = %area.id(), area = %area.name(), steps = route.len(), "quest route rebuilt");
        Ok(route)
    }

    /// Recalculates every area with a stale session that still holds a
    /// segment and drops expired cache entries. Returns the number of
    /// areas recalculated.
    pub fn sweep_stale_sessions(&self, now: DateTime<Utc>) -> usize {
        let mut recalculated = 0;
        for area in self.areas.list() {
            let purged = area.purge_caches(now);
            if purged > 0 {
                debug!(area_id = %area.id(), purged, "expired cache entries dropped");
            }

            let sessions = self.sessions.list_by_area(area.id());
            let has_stale = sessions.iter().any(|session| {
                session.has_route_part() && !session.is_live(now, self.settings.unseen_threshold)
            });
            if has_stale {
                info!(area_id = %area.id(), area = %area.name(), "stale workers found, recalculating route");
                area.recalculate_route_parts(&sessions, now, self.settings.unseen_threshold);
                recalculated += 1;
            }
        }
        recalculated
    }

    pub fn area_statuses(&self, now: DateTime<Utc>) -> Vec<AreaStatus> {
        self.areas
            .list()
            .iter()
            .map(|area| {
                let bound = self.sessions.list_by_area(area.id());
                let live = bound
                    .iter()
                    .filter(|session| session.is_live(now, self.settings.unseen_threshold))
                    .count();
                AreaStatus {
                    area: area.snapshot(),
                    bound_workers: bound.len(),
                    live_workers: live,
                }
            })
            .collect()
    }

    pub fn worker_statuses(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .list_all()
            .iter()
            .map(|session| session.snapshot())
            .collect()
    }

    pub fn accounts_overview(&self, now: DateTime<Utc>) -> AccountsOverview {
        AccountsOverview {
            stats: self.accounts.stats(now),
            accounts: self.accounts.snapshot(),
        }
    }
}
