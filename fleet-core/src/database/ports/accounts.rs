use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::accounts::{Account, NewAccount};
use crate::error::Result;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn load_accounts(&self) -> Result<Vec<Account>>;

    /// Inserts accounts that do not exist yet. Returns the number inserted.
    async fn insert_accounts(&self, accounts: &[NewAccount]) -> Result<u64>;

    /// Sets `last_released = now` on every account that has none.
    async fn mark_all_released(&self, now: DateTime<Utc>) -> Result<u64>;

    async fn mark_selected(&self, username: &str, now: DateTime<Utc>) -> Result<()>;
    async fn mark_released(&self, username: &str, now: DateTime<Utc>) -> Result<()>;
    async fn mark_suspended(&self, username: &str, now: DateTime<Utc>) -> Result<()>;
    async fn mark_banned(&self, username: &str, now: DateTime<Utc>) -> Result<()>;
    async fn mark_disabled(&self, username: &str, now: DateTime<Utc>) -> Result<()>;
    async fn mark_invalid(&self, username: &str) -> Result<()>;
    async fn mark_warned(
        &self,
        username: &str,
        expiration: DateTime<Utc>,
    ) -> Result<()>;
    async fn set_level(&self, username: &str, level: i32) -> Result<()>;
}
