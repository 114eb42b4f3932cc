use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, Timelike};

/// Daily quest trigger of an area.
///
/// Fires once per local day, at the earliest configured hour. Each
/// (hour, local midnight) slot is evaluated at most once.
#[derive(Debug, Clone, Default)]
pub struct QuestSchedule {
    hours: BTreeSet<u8>,
    last_checked: Option<(u32, i64)>,
}

impl QuestSchedule {
    pub fn new(hours: BTreeSet<u8>) -> Self {
        Self {
            hours,
            last_checked: None,
        }
    }

    pub fn hours(&self) -> &BTreeSet<u8> {
        &self.hours
    }

    pub fn set_hours(&mut self, hours: BTreeSet<u8>) {
        self.hours = hours;
    }

    pub fn check(&mut self, local: DateTime<FixedOffset>) -> bool {
        let hour = local.hour();
        let midnight =
            local.timestamp() - i64::from(local.num_seconds_from_midnight());

        if self.last_checked == Some((hour, midnight)) {
            return false;
        }
        self.last_checked = Some((hour, midnight));

        let Ok(hour) = u8::try_from(hour) else {
            return false;
        };
        if !self.hours.contains(&hour) {
            return false;
        }
        self.hours.first() == Some(&hour)
    }
}
