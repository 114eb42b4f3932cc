#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum_test::TestServer;
use chrono::{Duration, Utc};
use fleet_core::accounts::Account;
use fleet_core::database::ports::areas::AreaRecord;
use fleet_core::database::{FleetStores, InMemoryStore};
use fleet_core::fleet::{Fleet, FleetServices};
use fleet_core::geo::{Location, format_route};
use fleet_core::sessions::UsageLimits;
use fleet_server::clients::RawForwarder;
use fleet_server::create_app;
use fleet_server::infra::{
    app_state::AppState,
    config::{Config, loader::compose_config, sources::EnvConfig},
};
use serde_json::{Value, json};

pub const DEVICE_TOKEN: &str = "device-token";
pub const API_SECRET: &str = "operator-secret";

pub fn config_from_env(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    let (config, _warnings) =
        compose_config(None, EnvConfig::from_lookup(|key| vars.get(key).cloned()), None)
            .expect("test config composes");
    config
}

pub fn open_config() -> Config {
    config_from_env(&[])
}

pub fn guarded_config() -> Config {
    config_from_env(&[
        ("FLEET_BEARER_TOKEN", DEVICE_TOKEN),
        ("FLEET_API_SECRET", API_SECRET),
    ])
}

pub fn seasoned_account(username: &str, level: i32) -> Account {
    Account {
        last_released: Some(Utc::now() - Duration::days(2)),
        ..Account::new(username, format!("{username}-pw"), level)
    }
}

pub fn area_record(id: i32, workers: i32, steps: usize) -> AreaRecord {
    let route: Vec<Location> = (0..steps)
        .map(|i| Location::new(47.26 + i as f64 * 0.001, 11.40))
        .collect();
    AreaRecord {
        id,
        name: format!("area-{id}"),
        pokemon_mode_workers: workers,
        pokemon_mode_route: Some(format_route(&route)),
        ..AreaRecord::default()
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryStore>,
    pub fleet: Arc<Fleet>,
}

pub async fn spawn_app(config: Config, store: Arc<InMemoryStore>) -> TestApp {
    let config = Arc::new(config);
    let fleet = Arc::new(Fleet::new(
        config.fleet_settings(),
        FleetStores::in_memory(Arc::clone(&store)),
        FleetServices::default(),
    ));
    fleet.bootstrap(Utc::now()).await.expect("bootstrap");

    let forwarder = RawForwarder::new(Vec::new(), "fleet-tests").expect("forwarder");
    let state = AppState::new(Arc::clone(&fleet), config, Arc::new(forwarder));
    let server = TestServer::new(create_app(state)).expect("test server");
    TestApp {
        server,
        store,
        fleet,
    }
}

/// One area with two slots over a ten step route and two level 30 accounts.
pub fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.seed_accounts([seasoned_account("alpha", 30), seasoned_account("bravo", 31)]);
    store.upsert_area(area_record(1, 2, 10));
    store
}

pub fn limited_config(message_type: u32, ceiling: u64) -> Config {
    let mut config = open_config();
    config.usage_limits = UsageLimits::default().with_limit(message_type, ceiling);
    config
}

pub async fn controller(app: &TestApp, kind: &str, uuid: &str, username: &str) -> Value {
    let response = app
        .server
        .post("/controler")
        .json(&json!({ "type": kind, "uuid": uuid, "username": username }))
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}
