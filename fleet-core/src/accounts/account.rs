use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long a disabled account stays out of rotation.
pub const DISABLE_COOLDOWN: Duration = Duration::hours(24);
/// Releases more recent than this are allowed but logged.
pub const RECENT_RELEASE_WINDOW: Duration = Duration::hours(24);
/// Warning period applied by [`AccountPool::mark_warned`](super::AccountPool::mark_warned).
pub const WARN_DURATION: Duration = Duration::days(7);

/// One reusable game credential as persisted.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub level: i32,
    pub warn: bool,
    pub warn_expiration: Option<DateTime<Utc>>,
    pub suspended: bool,
    pub banned: bool,
    pub invalid: bool,
    pub disabled: bool,
    pub last_selected: Option<DateTime<Utc>>,
    /// `None` both for "selected right now" and "never released".
    pub last_released: Option<DateTime<Utc>>,
    pub last_disabled: Option<DateTime<Utc>>,
    pub last_banned: Option<DateTime<Utc>>,
    pub last_suspended: Option<DateTime<Utc>>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("username", &self.username)
            .field("level", &self.level)
            .field("warn", &self.warn)
            .field("suspended", &self.suspended)
            .field("banned", &self.banned)
            .field("disabled", &self.disabled)
            .field("last_released", &self.last_released)
            .finish_non_exhaustive()
    }
}

impl Account {
    pub fn new(username: impl Into<String>, password: impl Into<String>, level: i32) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            level,
            ..Self::default()
        }
    }

    pub fn warn_active(&self, now: DateTime<Utc>) -> bool {
        self.warn_expiration.is_some_and(|expires| expires > now)
    }

    pub fn disabled_recently(&self, now: DateTime<Utc>) -> bool {
        self.last_disabled
            .is_some_and(|disabled| disabled > now - DISABLE_COOLDOWN)
    }

    /// Status part of allocation eligibility: not suspended, not banned,
    /// no running warning and not disabled within the cooldown.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        !self.suspended && !self.banned && !self.warn_active(now) && !self.disabled_recently(now)
    }
}

/// Username and password handed to a worker.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Row for bulk account import.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub level: i32,
}

pub fn min_level(level: i32) -> impl Fn(&Account) -> bool + Send + Sync {
    move |account| account.level >= level
}

/// Inclusive level range.
pub fn level_between(min: i32, max: i32) -> impl Fn(&Account) -> bool + Send + Sync {
    move |account| (min..=max).contains(&account.level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_respects_cooldowns() {
        let now = Utc::now();
        let mut account = Account::new("ash", "pikachu", 30);
        assert!(account.is_usable(now));

        account.last_disabled = Some(now - Duration::hours(23));
        assert!(!account.is_usable(now));
        account.last_disabled = Some(now - Duration::hours(25));
        assert!(account.is_usable(now));

        account.warn_expiration = Some(now + Duration::minutes(1));
        assert!(!account.is_usable(now));
        account.warn_expiration = Some(now);
        assert!(account.is_usable(now));

        account.banned = true;
        assert!(!account.is_usable(now));
    }

    #[test]
    fn test_level_predicates() {
        let low = Account::new("low", "x", 12);
        let high = Account::new("high", "x", 35);
        assert!(!min_level(30)(&low));
        assert!(min_level(30)(&high));
        assert!(level_between(30, 40)(&high));
        assert!(!level_between(30, 34)(&high));
    }

    #[test]
    fn test_debug_hides_password() {
        let credentials = Credentials {
            username: "misty".into(),
            password: "starmie".into(),
        };
        assert!(!format!("{credentials:?}").contains("starmie"));
        assert!(!format!("{:?}", Account::new("misty", "starmie", 1)).contains("starmie"));
    }
}
