use std::collections::BTreeSet;

use tracing::warn;

use super::AreaId;
use crate::database::ports::areas::AreaRecord;
use crate::error::{FleetError, Result};
use crate::geo::{Geofence, Location, RouteParseError, parse_quest_hours, parse_route};

/// Parsed form of a persisted area row.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaDefinition {
    pub id: AreaId,
    pub name: String,
    pub target_workers: usize,
    pub route: Vec<Location>,
    pub quest_route: Vec<Location>,
    pub quest_fence: Geofence,
    pub quest_hours: BTreeSet<u8>,
}

impl AreaDefinition {
    /// Startup parsing: any malformed route or fence is an error, and so is
    /// an empty pokemon route.
    pub fn from_record_strict(record: &AreaRecord) -> Result<Self> {
        let id = AreaId(record.id);
        let strict = |field: &'static str, raw: &Option<String>| {
            parse_field(raw).map_err(|err| FleetError::MalformedRoute {
                area: id,
                field,
                reason: err.to_string(),
            })
        };

        let route = strict("pokemon route", &record.pokemon_mode_route)?;
        if route.is_empty() {
            return Err(FleetError::MalformedRoute {
                area: id,
                field: "pokemon route",
                reason: "route is empty".into(),
            });
        }

        Ok(Self {
            id,
            name: record.name.clone(),
            target_workers: worker_count(record.pokemon_mode_workers),
            route,
            quest_route: strict("quest route", &record.quest_mode_route)?,
            quest_fence: Geofence::new(strict("geofence", &record.geofence)?),
            quest_hours: quest_hours(record),
        })
    }

    /// Hot-reload parsing: malformed fields become empty and are logged so
    /// the remaining areas keep serving.
    pub fn from_record_lenient(record: &AreaRecord) -> Self {
        let lenient = |field: &'static str, raw: &Option<String>| {
            parse_field(raw).unwrap_or_else(|err| {
                warn!(
                    area_id = record.id,
                    area = %record.name,
                    field,
                    error = %err,
                    "malformed area field ignored during reload"
                );
                Vec::new()
            })
        };

        Self {
            id: AreaId(record.id),
            name: record.name.clone(),
            target_workers: worker_count(record.pokemon_mode_workers),
            route: lenient("pokemon route", &record.pokemon_mode_route),
            quest_route: lenient("quest route", &record.quest_mode_route),
            quest_fence: Geofence::new(lenient("geofence", &record.geofence)),
            quest_hours: quest_hours(record),
        }
    }
}

fn parse_field(raw: &Option<String>) -> std::result::Result<Vec<Location>, RouteParseError> {
    parse_route(raw.as_deref().unwrap_or_default())
}

fn worker_count(raw: i32) -> usize {
    usize::try_from(raw).unwrap_or(0)
}

fn quest_hours(record: &AreaRecord) -> BTreeSet<u8> {
    if !record.enable_quests {
        return BTreeSet::new();
    }
    record
        .quest_mode_hours
        .as_deref()
        .map(parse_quest_hours)
        .unwrap_or_default()
}
