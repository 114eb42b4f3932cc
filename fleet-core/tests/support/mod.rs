#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fleet_core::accounts::Account;
use fleet_core::database::ports::areas::AreaRecord;
use fleet_core::database::{FleetStores, InMemoryStore};
use fleet_core::fleet::{Fleet, FleetServices, FleetSettings};
use fleet_core::geo::{Geofence, Location, format_route};
use fleet_core::providers::{QuestNotifier, RouteCalculator};
use fleet_core::{FleetError, Result};
use parking_lot::Mutex;

pub fn at(seconds: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_717_200_000 + seconds, 0).expect("valid timestamp")
}

pub fn account(username: &str, level: i32, released: Option<DateTime<Utc>>) -> Account {
    Account {
        last_released: released,
        ..Account::new(username, format!("{username}-secret"), level)
    }
}

pub fn route(len: usize) -> Vec<Location> {
    (0..len)
        .map(|i| Location::new(47.0 + i as f64 * 0.001, 11.0))
        .collect()
}

pub fn square_fence() -> Geofence {
    Geofence::new(vec![
        Location::new(47.0, 11.0),
        Location::new(47.0, 11.1),
        Location::new(47.1, 11.1),
        Location::new(47.1, 11.0),
    ])
}

pub fn area_record(id: i32, workers: i32, route_len: usize) -> AreaRecord {
    AreaRecord {
        id,
        name: format!("area-{id}"),
        pokemon_mode_workers: workers,
        pokemon_mode_route: Some(format_route(&route(route_len))),
        geofence: Some(format_route(square_fence().points())),
        ..AreaRecord::default()
    }
}

pub fn settings() -> FleetSettings {
    FleetSettings::default()
}

pub fn fleet(store: &Arc<InMemoryStore>, services: FleetServices) -> Fleet {
    fleet_with(store, settings(), services)
}

pub fn fleet_with(
    store: &Arc<InMemoryStore>,
    settings: FleetSettings,
    services: FleetServices,
) -> Fleet {
    Fleet::new(settings, FleetStores::in_memory(Arc::clone(store)), services)
}

/// Returns a fixed route and counts the calls it receives.
#[derive(Debug, Default)]
pub struct ScriptedRouteCalculator {
    route: Vec<Location>,
    fail: bool,
    calls: AtomicUsize,
}

impl ScriptedRouteCalculator {
    pub fn returning(route: Vec<Location>) -> Self {
        Self {
            route,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteCalculator for ScriptedRouteCalculator {
    async fn calculate_route(&self, _instance: &str, fence: &[Location]) -> Result<Vec<Location>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(fence.first(), fence.last(), "fence must be closed");
        if self.fail {
            return Err(FleetError::RouteCalculation("scripted failure".into()));
        }
        Ok(self.route.clone())
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    fences: Mutex<Vec<Geofence>>,
}

impl RecordingNotifier {
    pub fn fences(&self) -> Vec<Geofence> {
        self.fences.lock().clone()
    }
}

#[async_trait]
impl QuestNotifier for RecordingNotifier {
    async fn clear_quests(&self, fence: &Geofence) -> Result<()> {
        self.fences.lock().push(fence.clone());
        Ok(())
    }
}
