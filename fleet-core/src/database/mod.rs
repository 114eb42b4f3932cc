#[cfg(feature = "database")]
pub mod infrastructure;
pub mod memory;
pub mod ports;

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "database")]
pub use infrastructure::postgres::{PoolStats, PostgresDatabase};
pub use memory::InMemoryStore;

use ports::accounts::AccountRepository;
use ports::areas::AreaRepository;
use ports::devices::DeviceRepository;

/// The store ports the fleet talks to, bundled for wiring.
#[derive(Clone)]
pub struct FleetStores {
    pub accounts: Arc<dyn AccountRepository>,
    pub areas: Arc<dyn AreaRepository>,
    pub devices: Arc<dyn DeviceRepository>,
}

impl fmt::Debug for FleetStores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FleetStores").finish_non_exhaustive()
    }
}

impl FleetStores {
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            accounts: store.clone(),
            areas: store.clone(),
            devices: store,
        }
    }

    #[cfg(feature = "database")]
    pub fn postgres(database: &PostgresDatabase) -> Self {
        Self {
            accounts: database.accounts(),
            areas: database.areas(),
            devices: database.devices(),
        }
    }
}
