use async_trait::async_trait;

use crate::areas::AreaId;
use crate::error::Result;
use crate::geo::Location;

/// Raw `area` row. Route and fence columns are unparsed strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AreaRecord {
    pub id: i32,
    pub name: String,
    pub pokemon_mode_workers: i32,
    pub pokemon_mode_route: Option<String>,
    pub fort_mode_workers: i32,
    pub fort_mode_route: Option<String>,
    pub quest_mode_workers: i32,
    pub quest_mode_hours: Option<String>,
    pub quest_mode_route: Option<String>,
    pub geofence: Option<String>,
    pub enable_quests: bool,
}

#[async_trait]
pub trait AreaRepository: Send + Sync {
    async fn load_areas(&self) -> Result<Vec<AreaRecord>>;

    async fn update_area_quest_route(
        &self,
        area_id: AreaId,
        route: &[Location],
    ) -> Result<()>;
}
