use async_trait::async_trait;
use sqlx::{PgPool, Row};

use crate::areas::AreaId;
use crate::database::ports::devices::{DeviceRecord, DeviceRepository};
use crate::error::{FleetError, Result};

#[derive(Debug, Clone)]
pub struct PostgresDeviceRepository {
    pool: PgPool,
}

impl PostgresDeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeviceRepository for PostgresDeviceRepository {
    async fn get_device(&self, uuid: &str) -> Result<Option<DeviceRecord>> {
        let row = sqlx::query(
            r#"
            SELECT uuid, area_id, account_username, last_host, last_seen
            FROM device
            WHERE uuid = $1
            "#,
        )
        .bind(uuid)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| FleetError::Store(format!("Failed to load device {uuid}: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let read = |e: sqlx::Error| FleetError::Store(format!("Failed to read device row: {e}"));
        let area_id: Option<i32> = row.try_get("area_id").map_err(read)?;
        Ok(Some(DeviceRecord {
            uuid: row.try_get("uuid").map_err(read)?,
            area_id: area_id.map(AreaId),
            account_username: row.try_get("account_username").map_err(read)?,
            last_host: row.try_get("last_host").map_err(read)?,
            last_seen: row.try_get("last_seen").map_err(read)?,
        }))
    }

    async fn touch_device(&self, device: &DeviceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO device (uuid, area_id, account_username, last_host, last_seen)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (uuid) DO UPDATE SET
                area_id = EXCLUDED.area_id,
                account_username = EXCLUDED.account_username,
                last_host = COALESCE(EXCLUDED.last_host, device.last_host),
                last_seen = EXCLUDED.last_seen
            "#,
        )
        .bind(&device.uuid)
        .bind(device.area_id.map(|id| id.0))
        .bind(&device.account_username)
        .bind(&device.last_host)
        .bind(device.last_seen)
        .execute(&self.pool)
        .await
        .map_err(|e| FleetError::Store(format!("Failed to touch device {}: {e}", device.uuid)))?;
        Ok(())
    }

    async fn set_device_account(&self, uuid: &str, username: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE device SET account_username = $2 WHERE uuid = $1")
            .bind(uuid)
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| FleetError::Store(format!("Failed to update device {uuid}: {e}")))?;
        Ok(())
    }
}
