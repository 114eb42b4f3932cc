//! In-memory implementation of every store port, used by the tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::accounts::{Account, NewAccount};
use crate::areas::AreaId;
use crate::database::ports::accounts::AccountRepository;
use crate::database::ports::areas::{AreaRecord, AreaRepository};
use crate::database::ports::devices::{DeviceRecord, DeviceRepository};
use crate::error::{FleetError, Result};
use crate::geo::{Location, format_route};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    accounts: Mutex<BTreeMap<String, Account>>,
    areas: Mutex<BTreeMap<i32, AreaRecord>>,
    devices: Mutex<HashMap<String, DeviceRecord>>,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_accounts(&self, accounts: impl IntoIterator<Item = Account>) {
        let mut stored = self.accounts.lock();
        for account in accounts {
            stored.insert(account.username.clone(), account);
        }
    }

    pub fn remove_account(&self, username: &str) -> Option<Account> {
        self.accounts.lock().remove(username)
    }

    pub fn account(&self, username: &str) -> Option<Account> {
        self.accounts.lock().get(username).cloned()
    }

    pub fn upsert_area(&self, record: AreaRecord) {
        self.areas.lock().insert(record.id, record);
    }

    pub fn remove_area(&self, id: i32) -> Option<AreaRecord> {
        self.areas.lock().remove(&id)
    }

    pub fn area(&self, id: i32) -> Option<AreaRecord> {
        self.areas.lock().get(&id).cloned()
    }

    pub fn device(&self, uuid: &str) -> Option<DeviceRecord> {
        self.devices.lock().get(uuid).cloned()
    }

    /// Makes every subsequent write fail, to exercise best-effort paths.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(FleetError::Store("store is read-only".into()));
        }
        Ok(())
    }

    fn with_account<F>(&self, username: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut Account),
    {
        self.check_writable()?;
        if let Some(account) = self.accounts.lock().get_mut(username) {
            update(account);
        }
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn load_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.lock().values().cloned().collect())
    }

    async fn insert_accounts(&self, accounts: &[NewAccount]) -> Result<u64> {
        self.check_writable()?;
        let mut stored = self.accounts.lock();
        let mut inserted = 0;
        for new in accounts {
            if stored.contains_key(&new.username) {
                continue;
            }
            stored.insert(
                new.username.clone(),
                Account::new(new.username.clone(), new.password.clone(), new.level),
            );
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn mark_all_released(&self, now: DateTime<Utc>) -> Result<u64> {
        self.check_writable()?;
        let mut updated = 0;
        for account in self.accounts.lock().values_mut() {
            if account.last_released.is_none() {
                account.last_released = Some(now);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn mark_selected(&self, username: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_account(username, |account| {
            account.last_selected = Some(now);
            account.last_released = None;
        })
    }

    async fn mark_released(&self, username: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_account(username, |account| account.last_released = Some(now))
    }

    async fn mark_suspended(&self, username: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_account(username, |account| {
            account.suspended = true;
            account.last_suspended = Some(now);
        })
    }

    async fn mark_banned(&self, username: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_account(username, |account| {
            account.banned = true;
            account.last_banned = Some(now);
        })
    }

    async fn mark_disabled(&self, username: &str, now: DateTime<Utc>) -> Result<()> {
        self.with_account(username, |account| {
            account.disabled = true;
            account.last_disabled = Some(now);
        })
    }

    async fn mark_invalid(&self, username: &str) -> Result<()> {
        self.with_account(username, |account| account.invalid = true)
    }

    async fn mark_warned(&self, username: &str, expiration: DateTime<Utc>) -> Result<()> {
        self.with_account(username, |account| {
            account.warn = true;
            account.warn_expiration = Some(expiration);
        })
    }

    async fn set_level(&self, username: &str, level: i32) -> Result<()> {
        self.with_account(username, |account| account.level = level)
    }
}

#[async_trait]
impl AreaRepository for InMemoryStore {
    async fn load_areas(&self) -> Result<Vec<AreaRecord>> {
        Ok(self.areas.lock().values().cloned().collect())
    }

    async fn update_area_quest_route(&self, area_id: AreaId, route: &[Location]) -> Result<()> {
        self.check_writable()?;
        if let Some(record) = self.areas.lock().get_mut(&area_id.0) {
            record.quest_mode_route = Some(format_route(route));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceRepository for InMemoryStore {
    async fn get_device(&self, uuid: &str) -> Result<Option<DeviceRecord>> {
        Ok(self.devices.lock().get(uuid).cloned())
    }

    async fn touch_device(&self, device: &DeviceRecord) -> Result<()> {
        self.check_writable()?;
        self.devices
            .lock()
            .insert(device.uuid.clone(), device.clone());
        Ok(())
    }

    async fn set_device_account(&self, uuid: &str, username: Option<&str>) -> Result<()> {
        self.check_writable()?;
        if let Some(device) = self.devices.lock().get_mut(uuid) {
            device.account_username = username.map(str::to_string);
        }
        Ok(())
    }
}
