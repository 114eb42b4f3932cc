pub mod accounts;
pub mod areas;
pub mod devices;
