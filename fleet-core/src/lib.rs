//! # Fleet Core
//!
//! Coordination engine for a fleet of remote scanning workers: a shared
//! credential pool, per-worker sessions, geographic areas whose routes are
//! sliced across the workers currently alive, usage soft limits and the
//! per-area dedup caches.
//!
//! ## Feature Flags
//!
//! - `database`: Enables the PostgreSQL store adapter and embedded migrations
//!
//! ## Architecture
//!
//! - [`accounts`]: credential records and the [`accounts::AccountPool`] allocator
//! - [`sessions`]: [`sessions::SessionRegistry`] and usage counters
//! - [`areas`]: [`areas::AreaRegistry`], route partitioning, quest gate, caches
//! - [`database`]: store ports, the in-memory store and the Postgres adapter
//! - [`providers`]: ports for the route calculator, quest notifier and timezones
//! - [`fleet`]: the [`fleet::Fleet`] facade used by the transport layer
//! - [`scheduler`]: background liveness and quest rebuild loops
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use fleet_core::database::{FleetStores, InMemoryStore};
//! use fleet_core::fleet::{Fleet, FleetServices, FleetSettings};
//!
//! async fn first_job() -> fleet_core::Result<()> {
//!     let store = Arc::new(InMemoryStore::new());
//!     let fleet = Fleet::new(
//!         FleetSettings::default(),
//!         FleetStores::in_memory(store),
//!         FleetServices::default(),
//!     );
//!     let now = Utc::now();
//!     fleet.bootstrap(now).await?;
//!     fleet.init_worker("device-1", Some("10.0.0.7"), now).await?;
//!     let credentials = fleet.assign_account("device-1", None, now).await?;
//!     let job = fleet.next_job("device-1", Some(&credentials.username), None, now).await?;
//!     println!("{job:?}");
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Credential pool
pub mod accounts;

/// Areas, route partitioning and dedup caches
pub mod areas;

/// Store ports and implementations
pub mod database;

#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Error types and error handling utilities
pub mod error;

/// Coordination facade
pub mod fleet;

/// Geographic primitives and route string codec
pub mod geo;

/// External service ports
pub mod providers;

/// Background maintenance loops
pub mod scheduler;

/// Worker sessions and usage counters
pub mod sessions;

pub use error::{FleetError, Result};
