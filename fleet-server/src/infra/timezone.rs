//! Timezone lookup for the quest gate, backed by an offline polygon finder.

use std::fmt;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use chrono_tz::Tz;
use fleet_core::{geo::Location, providers::TimezoneResolver};
use tracing::debug;
use tzf_rs::DefaultFinder;

pub struct TzfTimezoneResolver {
    finder: DefaultFinder,
}

impl fmt::Debug for TzfTimezoneResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TzfTimezoneResolver").finish_non_exhaustive()
    }
}

impl Default for TzfTimezoneResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl TzfTimezoneResolver {
    /// Loads the embedded timezone polygons. Takes a moment, build once.
    pub fn new() -> Self {
        Self {
            finder: DefaultFinder::new(),
        }
    }

    pub fn zone_at(&self, location: Location) -> Option<Tz> {
        let name = self.finder.get_tz_name(location.longitude, location.latitude);
        if name.is_empty() {
            return None;
        }
        match name.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(err) => {
                debug!(zone = name, error = %err, "unknown timezone name");
                None
            }
        }
    }
}

impl TimezoneResolver for TzfTimezoneResolver {
    fn offset_at(&self, location: Location, now: DateTime<Utc>) -> Option<FixedOffset> {
        let tz = self.zone_at(location)?;
        Some(now.with_timezone(&tz).offset().fix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn resolves_summer_offset_in_central_europe() {
        let resolver = TzfTimezoneResolver::new();
        let innsbruck = Location::new(47.2692, 11.4041);
        assert_eq!(resolver.zone_at(innsbruck), Some(chrono_tz::Europe::Vienna));

        let july = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let offset = resolver.offset_at(innsbruck, july).unwrap();
        assert_eq!(offset.local_minus_utc(), 2 * 3600);
    }
}
