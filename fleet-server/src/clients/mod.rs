//! Outbound HTTP clients: route calculation, quest clearing and raw
//! telemetry fan-out.

pub mod golbat;
pub mod koji;
pub mod raw_forwarder;

pub use golbat::GolbatClient;
pub use koji::KojiClient;
pub use raw_forwarder::RawForwarder;
