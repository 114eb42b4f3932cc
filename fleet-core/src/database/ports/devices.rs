use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::areas::AreaId;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub uuid: String,
    pub area_id: Option<AreaId>,
    pub account_username: Option<String>,
    pub last_host: Option<String>,
    pub last_seen: DateTime<Utc>,
}

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    async fn get_device(&self, uuid: &str) -> Result<Option<DeviceRecord>>;

    /// Upserts the device with its current binding and liveness.
    async fn touch_device(&self, device: &DeviceRecord) -> Result<()>;

    async fn set_device_account(
        &self,
        uuid: &str,
        username: Option<&str>,
    ) -> Result<()>;
}
