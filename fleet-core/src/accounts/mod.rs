//! Credential pool: account records, allocation and status tracking.

mod account;
mod pool;

pub use account::{
    Account, Credentials, DISABLE_COOLDOWN, NewAccount, RECENT_RELEASE_WINDOW, WARN_DURATION,
    level_between, min_level,
};
pub use pool::{AccountPool, AccountReload, AccountStats, AccountStatus};
