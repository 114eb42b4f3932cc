use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::accounts::{Account, NewAccount};
use crate::database::ports::accounts::AccountRepository;
use crate::error::{FleetError, Result};

#[derive(Debug, Clone)]
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<Account> {
        let read = |e: sqlx::Error| FleetError::Store(format!("Failed to read account row: {e}"));
        Ok(Account {
            username: row.try_get("username").map_err(read)?,
            password: row.try_get("password").map_err(read)?,
            level: row.try_get("level").map_err(read)?,
            warn: row.try_get("warn").map_err(read)?,
            warn_expiration: row.try_get("warn_expiration").map_err(read)?,
            suspended: row.try_get("suspended").map_err(read)?,
            banned: row.try_get("banned").map_err(read)?,
            invalid: row.try_get("invalid").map_err(read)?,
            disabled: row.try_get("disabled").map_err(read)?,
            last_selected: row.try_get("last_selected").map_err(read)?,
            last_released: row.try_get("last_released").map_err(read)?,
            last_disabled: row.try_get("last_disabled").map_err(read)?,
            last_banned: row.try_get("last_banned").map_err(read)?,
            last_suspended: row.try_get("last_suspended").map_err(read)?,
        })
    }

    async fn execute_for_user(
        &self,
        action: &str,
        query: sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<()> {
        query
            .execute(self.pool())
            .await
            .map_err(|e| FleetError::Store(format!("Failed to mark account {action}: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn load_accounts(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT
                username,
                password,
                level,
                warn,
                warn_expiration,
                suspended,
                banned,
                invalid,
                disabled,
                last_selected,
                last_released,
                last_disabled,
                last_banned,
                last_suspended
            FROM account
            ORDER BY username
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(|e| FleetError::Store(format!("Failed to load accounts: {e}")))?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn insert_accounts(&self, accounts: &[NewAccount]) -> Result<u64> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| FleetError::Store(format!("Failed to begin transaction: {e}")))?;

        let mut inserted = 0;
        for account in accounts {
            let result = sqlx::query(
                r#"
                INSERT INTO account (username, password, level)
                VALUES ($1, $2, $3)
                ON CONFLICT (username) DO NOTHING
                "#,
            )
            .bind(&account.username)
            .bind(&account.password)
            .bind(account.level)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                FleetError::Store(format!("Failed to insert account {}: {e}", account.username))
            })?;
            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| FleetError::Store(format!("Failed to commit account import: {e}")))?;
        Ok(inserted)
    }

    async fn mark_all_released(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE account
            SET last_released = $1
            WHERE last_released IS NULL
            "#,
        )
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| FleetError::Store(format!("Failed to mark accounts released: {e}")))?;
        Ok(result.rows_affected())
    }

    async fn mark_selected(&self, username: &str, now: DateTime<Utc>) -> Result<()> {
        self.execute_for_user(
            "selected",
            sqlx::query(
                r#"
                UPDATE account
                SET last_selected = $2, last_released = NULL
                WHERE username = $1
                "#,
            )
            .bind(username)
            .bind(now),
        )
        .await
    }

    async fn mark_released(&self, username: &str, now: DateTime<Utc>) -> Result<()> {
        self.execute_for_user(
            "released",
            sqlx::query("UPDATE account SET last_released = $2 WHERE username = $1")
                .bind(username)
                .bind(now),
        )
        .await
    }

    async fn mark_suspended(&self, username: &str, now: DateTime<Utc>) -> Result<()> {
        self.execute_for_user(
            "suspended",
            sqlx::query(
                "UPDATE account SET suspended = TRUE, last_suspended = $2 WHERE username = $1",
            )
            .bind(username)
            .bind(now),
        )
        .await
    }

    async fn mark_banned(&self, username: &str, now: DateTime<Utc>) -> Result<()> {
        self.execute_for_user(
            "banned",
            sqlx::query("UPDATE account SET banned = TRUE, last_banned = $2 WHERE username = $1")
                .bind(username)
                .bind(now),
        )
        .await
    }

    async fn mark_disabled(&self, username: &str, now: DateTime<Utc>) -> Result<()> {
        self.execute_for_user(
            "disabled",
            sqlx::query(
                "UPDATE account SET disabled = TRUE, last_disabled = $2 WHERE username = $1",
            )
            .bind(username)
            .bind(now),
        )
        .await
    }

    async fn mark_invalid(&self, username: &str) -> Result<()> {
        self.execute_for_user(
            "invalid",
            sqlx::query("UPDATE account SET invalid = TRUE WHERE username = $1").bind(username),
        )
        .await
    }

    async fn mark_warned(&self, username: &str, expiration: DateTime<Utc>) -> Result<()> {
        self.execute_for_user(
            "warned",
            sqlx::query("UPDATE account SET warn = TRUE, warn_expiration = $2 WHERE username = $1")
                .bind(username)
                .bind(expiration),
        )
        .await
    }

    async fn set_level(&self, username: &str, level: i32) -> Result<()> {
        self.execute_for_user(
            "levelled",
            sqlx::query("UPDATE account SET level = $2 WHERE username = $1")
                .bind(username)
                .bind(level),
        )
        .await
    }
}
