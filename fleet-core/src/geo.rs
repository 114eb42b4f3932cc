//! Geographic primitives shared by areas, routes and the external
//! collaborators.
//!
//! Routes and fences are persisted as a comma separated list of
//! `"lat lon"` pairs; [`parse_route`] and [`format_route`] convert between
//! that form and [`Location`] lists.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

impl Location {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn centre(&self) -> Location {
        Location::new(
            (self.max_latitude + self.min_latitude) / 2.0,
            (self.max_longitude + self.min_longitude) / 2.0,
        )
    }

    pub fn contains(&self, location: &Location) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&location.latitude)
            && (self.min_longitude..=self.max_longitude)
                .contains(&location.longitude)
    }
}

/// Polygon outline of an area, stored open or closed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Geofence {
    points: Vec<Location>,
}

impl Geofence {
    pub fn new(points: Vec<Location>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Location] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;
        let mut bbox = BoundingBox {
            min_latitude: first.latitude,
            max_latitude: first.latitude,
            min_longitude: first.longitude,
            max_longitude: first.longitude,
        };
        for point in &self.points[1..] {
            bbox.min_latitude = bbox.min_latitude.min(point.latitude);
            bbox.max_latitude = bbox.max_latitude.max(point.latitude);
            bbox.min_longitude = bbox.min_longitude.min(point.longitude);
            bbox.max_longitude = bbox.max_longitude.max(point.longitude);
        }
        Some(bbox)
    }

    /// Outline with the first point repeated at the end, as the route
    /// calculator and quest notifier expect.
    pub fn closed(&self) -> Vec<Location> {
        let mut points = self.points.clone();
        match (points.first().copied(), points.last().copied()) {
            (Some(first), Some(last)) if first != last => points.push(first),
            _ => {}
        }
        points
    }

    /// Even-odd ray casting test.
    pub fn contains(&self, location: &Location) -> bool {
        if self.points.len() < 3 {
            return false;
        }
        if let Some(bbox) = self.bounding_box()
            && !bbox.contains(location)
        {
            return false;
        }

        let mut inside = false;
        let mut j = self.points.len() - 1;
        for i in 0..self.points.len() {
            let a = self.points[i];
            let b = self.points[j];
            if (a.longitude > location.longitude)
                != (b.longitude > location.longitude)
            {
                let crossing = (b.latitude - a.latitude)
                    * (location.longitude - a.longitude)
                    / (b.longitude - a.longitude)
                    + a.latitude;
                if location.latitude < crossing {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteParseError {
    #[error("route step {index} does not have lat and lon")]
    MissingCoordinate { index: usize },
    #[error("route step {index} has an invalid coordinate '{value}'")]
    InvalidCoordinate { index: usize, value: String },
}

/// Parses `"lat lon,lat lon,..."`. An empty string is an empty route.
pub fn parse_route(raw: &str) -> Result<Vec<Location>, RouteParseError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    raw.split(',')
        .enumerate()
        .map(|(index, step)| {
            let mut parts = step.split_whitespace();
            let (Some(lat), Some(lon)) = (parts.next(), parts.next()) else {
                return Err(RouteParseError::MissingCoordinate { index });
            };
            let parse = |value: &str| {
                value.parse::<f64>().map_err(|_| {
                    RouteParseError::InvalidCoordinate {
                        index,
                        value: value.to_string(),
                    }
                })
            };
            Ok(Location::new(parse(lat)?, parse(lon)?))
        })
        .collect()
}

pub fn format_route(route: &[Location]) -> String {
    route
        .iter()
        .map(|l| format!("{:.6} {:.6}", l.latitude, l.longitude))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses a comma separated list of local hours. Entries that are not an
/// hour of the day are ignored.
pub fn parse_quest_hours(raw: &str) -> BTreeSet<u8> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<u8>().ok())
        .filter(|hour| *hour < 24)
        .collect()
}

pub fn format_quest_hours(hours: &BTreeSet<u8>) -> String {
    hours
        .iter()
        .map(u8::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Geofence {
        Geofence::new(vec![
            Location::new(0.0, 0.0),
            Location::new(0.0, 1.0),
            Location::new(1.0, 1.0),
            Location::new(1.0, 0.0),
        ])
    }

    #[test]
    fn test_parse_route_reads_pairs() {
        let route = parse_route("47.264780 11.407958,47.1 11.2").unwrap();
        assert_eq!(
            route,
            vec![Location::new(47.26478, 11.407958), Location::new(47.1, 11.2)]
        );
    }

    #[test]
    fn test_parse_route_empty_string() {
        assert!(parse_route("").unwrap().is_empty());
        assert!(parse_route("   ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_route_rejects_garbage() {
        assert_eq!(
            parse_route("1.0 2.0,3.0"),
            Err(RouteParseError::MissingCoordinate { index: 1 })
        );
        assert!(matches!(
            parse_route("1.0 north"),
            Err(RouteParseError::InvalidCoordinate { index: 0, .. })
        ));
    }

    #[test]
    fn test_format_route_matches_stored_form() {
        let route = vec![Location::new(1.5, -2.25), Location::new(3.0, 4.0)];
        assert_eq!(format_route(&route), "1.500000 -2.250000,3.000000 4.000000");
        assert_eq!(parse_route(&format_route(&route)).unwrap(), route);
    }

    #[test]
    fn test_quest_hours_ignore_invalid_entries() {
        let hours = parse_quest_hours("23,21, 22,x,25");
        assert_eq!(hours.into_iter().collect::<Vec<_>>(), vec![21, 22, 23]);
        assert!(parse_quest_hours("").is_empty());
        assert_eq!(format_quest_hours(&parse_quest_hours("5,1")), "1,5");
    }

    #[test]
    fn test_geofence_contains() {
        let fence = square();
        assert!(fence.contains(&Location::new(0.5, 0.5)));
        assert!(!fence.contains(&Location::new(1.5, 0.5)));
        assert!(!Geofence::default().contains(&Location::new(0.0, 0.0)));
    }

    #[test]
    fn test_geofence_closed_and_centre() {
        let fence = square();
        let closed = fence.closed();
        assert_eq!(closed.len(), 5);
        assert_eq!(closed.first(), closed.last());
        assert_eq!(Geofence::new(closed.clone()).closed(), closed);

        let centre = fence.bounding_box().unwrap().centre();
        assert_eq!(centre, Location::new(0.5, 0.5));
        assert!(Geofence::default().bounding_box().is_none());
    }
}
