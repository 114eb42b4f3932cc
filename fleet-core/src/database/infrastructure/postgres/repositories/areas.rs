use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::areas::AreaId;
use crate::database::ports::areas::{AreaRecord, AreaRepository};
use crate::error::{FleetError, Result};
use crate::geo::{Location, format_route};

#[derive(Debug, Clone)]
pub struct PostgresAreaRepository {
    pool: PgPool,
}

impl PostgresAreaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<AreaRecord> {
        let read = |e: sqlx::Error| FleetError::Store(format!("Failed to read area row: {e}"));
        Ok(AreaRecord {
            id: row.try_get("id").map_err(read)?,
            name: row.try_get("name").map_err(read)?,
            pokemon_mode_workers: row.try_get("pokemon_mode_workers").map_err(read)?,
            pokemon_mode_route: row.try_get("pokemon_mode_route").map_err(read)?,
            fort_mode_workers: row.try_get("fort_mode_workers").map_err(read)?,
            fort_mode_route: row.try_get("fort_mode_route").map_err(read)?,
            quest_mode_workers: row.try_get("quest_mode_workers").map_err(read)?,
            quest_mode_hours: row.try_get("quest_mode_hours").map_err(read)?,
            quest_mode_route: row.try_get("quest_mode_route").map_err(read)?,
            geofence: row.try_get("geofence").map_err(read)?,
            enable_quests: row.try_get("enable_quests").map_err(read)?,
        })
    }
}

#[async_trait]
impl AreaRepository for PostgresAreaRepository {
    async fn load_areas(&self) -> Result<Vec<AreaRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                name,
                pokemon_mode_workers,
                pokemon_mode_route,
                fort_mode_workers,
                fort_mode_route,
                quest_mode_workers,
                quest_mode_hours,
                quest_mode_route,
                geofence,
                enable_quests
            FROM area
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FleetError::Store(format!("Failed to load areas: {e}")))?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn update_area_quest_route(&self, area_id: AreaId, route: &[Location]) -> Result<()> {
        sqlx::query("UPDATE area SET quest_mode_route = $2 WHERE id = $1")
            .bind(area_id.0)
            .bind(format_route(route))
            .execute(&self.pool)
            .await
            .map_err(|e| {
                FleetError::Store(format!("Failed to update quest route of area {area_id}: {e}"))
            })?;
        Ok(())
    }
}
