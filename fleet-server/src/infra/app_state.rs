use std::{fmt, sync::Arc};

use fleet_core::database::PostgresDatabase;
use fleet_core::fleet::Fleet;

use crate::clients::RawForwarder;
use crate::infra::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub fleet: Arc<Fleet>,
    pub config: Arc<Config>,
    pub raw_forwarder: Arc<RawForwarder>,
    /// Absent when the fleet runs on the in-memory store.
    pub database: Option<Arc<PostgresDatabase>>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("fleet", &self.fleet)
            .field("raw_targets", &self.raw_forwarder.targets().len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(fleet: Arc<Fleet>, config: Arc<Config>, raw_forwarder: Arc<RawForwarder>) -> Self {
        Self {
            fleet,
            config,
            raw_forwarder,
            database: None,
        }
    }

    pub fn with_database(mut self, database: Arc<PostgresDatabase>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
