use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

use super::account::{Account, Credentials, NewAccount, RECENT_RELEASE_WINDOW, WARN_DURATION};
use crate::database::ports::accounts::AccountRepository;
use crate::error::{FleetError, Result};

/// Accounts and their in-use flags. Both vectors always have the same
/// length and are only touched together under the pool lock.
#[derive(Debug, Default)]
struct PoolInner {
    accounts: Vec<Account>,
    in_use: Vec<bool>,
}

impl PoolInner {
    fn position(&self, username: &str) -> Option<usize> {
        self.accounts.iter().position(|a| a.username == username)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountStatus {
    #[serde(flatten)]
    pub account: Account,
    pub in_use: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountStats {
    pub total: usize,
    pub in_use: usize,
    pub banned: usize,
    pub suspended: usize,
    pub warned: usize,
    pub disabled: usize,
    pub invalid: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountReload {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

/// The shared credential pool.
///
/// Every read-modify-write runs under one lock. Store writes are issued
/// after the lock is released; their failures are logged and the
/// in-memory state stays authoritative until the next reload.
pub struct AccountPool {
    inner: Mutex<PoolInner>,
    store: Arc<dyn AccountRepository>,
}

impl fmt::Debug for AccountPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountPool")
            .field("accounts", &self.inner.lock().accounts.len())
            .finish_non_exhaustive()
    }
}

impl AccountPool {
    pub fn new(store: Arc<dyn AccountRepository>) -> Self {
        Self {
            inner: Mutex::new(PoolInner::default()),
            store,
        }
    }

    /// Picks the least recently released eligible account satisfying
    /// `predicate` and marks it in use.
    ///
    /// Accounts without a release timestamp are skipped: the same empty
    /// value marks an account that is currently selected.
    pub async fn allocate<P>(&self, predicate: P, now: DateTime<Utc>) -> Option<Credentials>
    where
        P: Fn(&Account) -> bool,
    {
        let credentials = {
            let mut inner = self.inner.lock();
            let mut best: Option<(usize, DateTime<Utc>)> = None;

            for (index, account) in inner.accounts.iter().enumerate() {
                if inner.in_use[index] || !account.is_usable(now) || !predicate(account) {
                    continue;
                }
                let Some(released) = account.last_released else {
                    continue;
                };
                if best.is_none_or(|(_, oldest)| released < oldest) {
                    best = Some((index, released));
                }
            }

            let (index, released) = best?;
            let account = &mut inner.accounts[index];
            if released > now - RECENT_RELEASE_WINDOW {
                warn!(
                    username = %account.username,
                    released_minutes_ago = (now - released).num_minutes(),
                    "selected account was released less than 24 hours ago"
                );
            }
            account.last_released = None;
            account.last_selected = Some(now);
            let credentials = Credentials {
                username: account.username.clone(),
                password: account.password.clone(),
            };
            inner.in_use[index] = true;
            credentials
        };

        if let Err(err) = self.store.mark_selected(&credentials.username, now).await {
            error!(username = %credentials.username, error = %err, "failed to persist account selection");
        }
        Some(credentials)
    }

    pub async fn release(&self, username: &str, now: DateTime<Utc>) {
        let found = {
            let mut inner = self.inner.lock();
            match inner.position(username) {
                Some(index) => {
                    inner.in_use[index] = false;
                    inner.accounts[index].last_released = Some(now);
                    true
                }
                None => false,
            }
        };
        if !found {
            warn!(username, "released account is not in the pool");
        }

        if let Err(err) = self.store.mark_released(username, now).await {
            error!(username, error = %err, "failed to persist account release");
        }
    }

    /// Applies `update` to the named account. Returns false and logs when
    /// the username is unknown.
    fn update<F>(&self, username: &str, action: &'static str, update: F) -> bool
    where
        F: FnOnce(&mut Account),
    {
        let mut inner = self.inner.lock();
        match inner.position(username) {
            Some(index) => {
                update(&mut inner.accounts[index]);
                true
            }
            None => {
                warn!(username, action, "account not found in pool");
                false
            }
        }
    }

    fn log_store_failure(username: &str, action: &'static str, result: Result<()>) {
        if let Err(err) = result {
            error!(username, action, error = %err, "failed to persist account status");
        }
    }

    pub async fn mark_suspended(&self, username: &str, now: DateTime<Utc>) -> bool {
        let found = self.update(username, "suspended", |account| {
            account.suspended = true;
            account.last_suspended = Some(now);
        });
        Self::log_store_failure(username, "suspended", self.store.mark_suspended(username, now).await);
        found
    }

    pub async fn mark_banned(&self, username: &str, now: DateTime<Utc>) -> bool {
        let found = self.update(username, "banned", |account| {
            account.banned = true;
            account.last_banned = Some(now);
        });
        Self::log_store_failure(username, "banned", self.store.mark_banned(username, now).await);
        found
    }

    /// Takes the account out of rotation for the disable cooldown.
    pub async fn mark_disabled(&self, username: &str, now: DateTime<Utc>) -> bool {
        let found = self.update(username, "disabled", |account| {
            account.disabled = true;
            account.last_disabled = Some(now);
        });
        Self::log_store_failure(username, "disabled", self.store.mark_disabled(username, now).await);
        found
    }

    /// Flags bad credentials. The flag is informational; allocation does
    /// not consult it.
    pub async fn mark_invalid(&self, username: &str) -> bool {
        let found = self.update(username, "invalid", |account| account.invalid = true);
        Self::log_store_failure(username, "invalid", self.store.mark_invalid(username).await);
        found
    }

    pub async fn mark_warned(&self, username: &str, now: DateTime<Utc>) -> bool {
        let expiration = now + WARN_DURATION;
        let found = self.update(username, "warned", |account| {
            account.warn = true;
            account.warn_expiration = Some(expiration);
        });
        Self::log_store_failure(
            username,
            "warned",
            self.store.mark_warned(username, expiration).await,
        );
        found
    }

    /// Level 0 becomes 1; higher levels are left alone.
    pub async fn mark_tutorial_done(&self, username: &str) -> bool {
        let mut level = None;
        let found = self.update(username, "tutorial done", |account| {
            if account.level == 0 {
                account.level = 1;
            }
            level = Some(account.level);
        });
        if let Some(level) = level {
            Self::log_store_failure(username, "tutorial done", self.store.set_level(username, level).await);
        }
        found
    }

    /// Records a level reported by the game. Only persists on change.
    pub async fn set_level(&self, username: &str, level: i32) -> bool {
        let mut changed = false;
        let found = self.update(username, "set level", |account| {
            if account.level != level {
                account.level = level;
                changed = true;
            }
        });
        if changed {
            Self::log_store_failure(username, "set level", self.store.set_level(username, level).await);
        }
        found
    }

    pub fn exists(&self, username: &str) -> bool {
        self.inner.lock().position(username).is_some()
    }

    /// Whether the account may keep working right now.
    pub fn is_valid(&self, username: &str, now: DateTime<Utc>) -> Result<bool> {
        let inner = self.inner.lock();
        let index = inner
            .position(username)
            .ok_or_else(|| FleetError::AccountNotFound(username.to_string()))?;
        Ok(inner.accounts[index].is_usable(now))
    }

    pub fn is_in_use(&self, username: &str) -> bool {
        let inner = self.inner.lock();
        inner
            .position(username)
            .is_some_and(|index| inner.in_use[index])
    }

    /// Re-reads the store and merges by username: known accounts are
    /// updated in place, new ones are appended unused and missing ones
    /// are dropped along with their in-use flag.
    pub async fn reload(&self) -> Result<AccountReload> {
        let fresh = self.store.load_accounts().await?;
        let mut summary = AccountReload::default();

        let mut inner = self.inner.lock();
        let mut incoming: HashMap<String, Account> = fresh
            .into_iter()
            .map(|account| (account.username.clone(), account))
            .collect();

        let PoolInner { accounts, in_use } = &mut *inner;
        let mut kept_accounts = Vec::with_capacity(accounts.len());
        let mut kept_in_use = Vec::with_capacity(accounts.len());
        for (account, used) in accounts.drain(..).zip(in_use.drain(..)) {
            match incoming.remove(&account.username) {
                Some(updated) => {
                    if updated != account {
                        summary.updated += 1;
                    }
                    kept_accounts.push(updated);
                    kept_in_use.push(used);
                }
                None => {
                    info!(username = %account.username, "account no longer exists");
                    summary.removed += 1;
                }
            }
        }

        let mut added: Vec<Account> = incoming.into_values().collect();
        added.sort_by(|a, b| a.username.cmp(&b.username));
        for account in added {
            info!(username = %account.username, "found new account");
            kept_accounts.push(account);
            kept_in_use.push(false);
            summary.added += 1;
        }

        *accounts = kept_accounts;
        *in_use = kept_in_use;
        info!(
            total = accounts.len(),
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            "accounts reloaded"
        );
        Ok(summary)
    }

    /// Inserts new accounts into the store and reloads the pool.
    pub async fn import(&self, accounts: &[NewAccount]) -> Result<u64> {
        let inserted = self.store.insert_accounts(accounts).await?;
        self.reload().await?;
        Ok(inserted)
    }

    pub fn snapshot(&self) -> Vec<AccountStatus> {
        let inner = self.inner.lock();
        inner
            .accounts
            .iter()
            .zip(&inner.in_use)
            .map(|(account, in_use)| AccountStatus {
                account: account.clone(),
                in_use: *in_use,
            })
            .collect()
    }

    pub fn stats(&self, now: DateTime<Utc>) -> AccountStats {
        let inner = self.inner.lock();
        let mut stats = AccountStats {
            total: inner.accounts.len(),
            in_use: inner.in_use.iter().filter(|used| **used).count(),
            ..AccountStats::default()
        };
        for account in &inner.accounts {
            stats.banned += usize::from(account.banned);
            stats.suspended += usize::from(account.suspended);
            stats.warned += usize::from(account.warn_active(now));
            stats.disabled += usize::from(account.disabled_recently(now));
            stats.invalid += usize::from(account.invalid);
        }
        stats
    }

    pub fn len(&self) -> usize {
        self.inner.lock().accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::min_level;
    use crate::database::memory::InMemoryStore;
    use chrono::Duration;

    fn released(username: &str, at: Option<DateTime<Utc>>) -> Account {
        Account {
            last_released: at,
            ..Account::new(username, format!("{username}-pw"), 30)
        }
    }

    async fn pool_with(accounts: Vec<Account>) -> (AccountPool, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        store.seed_accounts(accounts);
        let pool = AccountPool::new(store.clone());
        pool.reload().await.unwrap();
        (pool, store)
    }

    #[tokio::test]
    async fn test_allocate_picks_oldest_release_and_skips_unreleased() {
        let now = Utc::now();
        let (pool, _) = pool_with(vec![
            released("a", Some(now - Duration::days(3))),
            released("b", Some(now - Duration::days(5))),
            released("c", None),
        ])
        .await;

        let first = pool.allocate(|_| true, now).await.unwrap();
        assert_eq!(first.username, "b");
        assert_eq!(first.password, "b-pw");
        let second = pool.allocate(|_| true, now).await.unwrap();
        assert_eq!(second.username, "a");
        assert!(pool.allocate(|_| true, now).await.is_none());
    }

    #[tokio::test]
    async fn test_allocate_honours_predicate_and_status() {
        let now = Utc::now();
        let mut banned = released("banned", Some(now - Duration::days(9)));
        banned.banned = true;
        let mut low = released("low", Some(now - Duration::days(8)));
        low.level = 5;
        let (pool, _) = pool_with(vec![banned, low, released("ok", Some(now - Duration::days(1)))]).await;

        let picked = pool.allocate(min_level(30), now).await.unwrap();
        assert_eq!(picked.username, "ok");
        assert!(pool.allocate(min_level(30), now).await.is_none());
    }

    #[tokio::test]
    async fn test_release_makes_account_selectable_again() {
        let now = Utc::now();
        let (pool, store) = pool_with(vec![released("a", Some(now - Duration::days(2)))]).await;

        pool.allocate(|_| true, now).await.unwrap();
        assert!(pool.is_in_use("a"));
        let later = now + Duration::minutes(5);
        pool.release("a", later).await;
        assert!(!pool.is_in_use("a"));

        let again_at = later + Duration::minutes(1);
        assert_eq!(pool.allocate(|_| true, again_at).await.unwrap().username, "a");
        let snapshot = pool.snapshot();
        assert_eq!(snapshot[0].account.last_selected, Some(again_at));
        assert_eq!(snapshot[0].account.last_released, None);
        assert_eq!(store.account("a").unwrap().last_selected, Some(again_at));
    }

    #[tokio::test]
    async fn test_status_marks_and_validity() {
        let now = Utc::now();
        let (pool, store) = pool_with(vec![released("a", Some(now - Duration::days(2)))]).await;

        assert!(pool.is_valid("a", now).unwrap());
        assert!(pool.mark_warned("a", now).await);
        assert!(!pool.is_valid("a", now).unwrap());
        assert!(pool.is_valid("a", now + WARN_DURATION + Duration::seconds(1)).unwrap());
        assert!(store.account("a").unwrap().warn);

        assert!(!pool.mark_banned("ghost", now).await);
        assert!(matches!(
            pool.is_valid("ghost", now),
            Err(FleetError::AccountNotFound(name)) if name == "ghost"
        ));
    }

    #[tokio::test]
    async fn test_tutorial_done_only_lifts_level_zero() {
        let now = Utc::now();
        let mut fresh = released("fresh", Some(now));
        fresh.level = 0;
        let (pool, _) = pool_with(vec![fresh, released("vet", Some(now))]).await;

        pool.mark_tutorial_done("fresh").await;
        pool.mark_tutorial_done("vet").await;
        let levels: Vec<i32> = pool.snapshot().iter().map(|s| s.account.level).collect();
        assert_eq!(levels, vec![1, 30]);
    }

    #[tokio::test]
    async fn test_reload_merges_by_username() {
        let now = Utc::now();
        let (pool, store) = pool_with(vec![
            released("keep", Some(now - Duration::days(2))),
            released("drop", Some(now - Duration::days(2))),
        ])
        .await;
        pool.allocate(|_| true, now).await.unwrap();
        let held = pool.snapshot().into_iter().find(|s| s.in_use).unwrap().account.username;

        store.remove_account("drop");
        store.seed_accounts(vec![released("new", Some(now))]);
        let summary = pool.reload().await.unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.removed, 1);

        let snapshot = pool.snapshot();
        let names: Vec<_> = snapshot.iter().map(|s| s.account.username.as_str()).collect();
        assert_eq!(names, vec!["keep", "new"]);
        assert_eq!(pool.is_in_use("keep"), held == "keep");
        assert!(!pool.is_in_use("new"));
    }

    #[tokio::test]
    async fn test_stats_counts_flags() {
        let now = Utc::now();
        let mut banned = released("b", Some(now));
        banned.banned = true;
        let (pool, _) = pool_with(vec![banned, released("ok", Some(now - Duration::days(1)))]).await;
        pool.allocate(|_| true, now).await.unwrap();
        pool.mark_disabled("b", now).await;

        let stats = pool.stats(now);
        assert_eq!(
            stats,
            AccountStats {
                total: 2,
                in_use: 1,
                banned: 1,
                disabled: 1,
                ..AccountStats::default()
            }
        );
    }
}
