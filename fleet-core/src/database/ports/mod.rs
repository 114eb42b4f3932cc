//! Repository ports (interfaces) for the persistent store.
//! Implementations live in [`super::memory`] and, behind the `database`
//! feature, in the Postgres adapter under `database::infrastructure`.

pub mod accounts;
pub mod areas;
pub mod devices;
