//! Time-to-live caches used to avoid handing out the same scan work twice
//! within an area.
//!
//! Entries expire purely by elapsed time since insertion. Expiry is applied
//! lazily on access and in bulk by [`TtlCache::purge_expired`], which the
//! liveness sweep calls periodically.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;

pub const POKESTOP_CACHE_TTL: Duration = Duration::hours(6);
pub const ENCOUNTER_CACHE_TTL: Duration = Duration::minutes(60);

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, Entry<V>>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Value for `key` if it has not expired. Reading does not extend the
    /// lifetime of the entry.
    pub fn get(&self, key: &K, now: DateTime<Utc>) -> Option<V> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn contains(&self, key: &K, now: DateTime<Utc>) -> bool {
        self.get(key, now).is_some()
    }

    pub fn insert(&self, key: K, value: V, now: DateTime<Utc>) {
        self.entries.lock().insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Returns the live value for `key`, storing `make()` first on a miss.
    pub fn get_or_insert_with<F>(&self, key: K, now: DateTime<Utc>, make: F) -> V
    where
        F: FnOnce() -> V,
    {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&key)
            && entry.expires_at > now
        {
            return entry.value.clone();
        }

        let value = make();
        entries.insert(
            key,
            Entry {
                value: value.clone(),
                expires_at: now + self.ttl,
            },
        );
        value
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PokestopScanInfo {
    pub scanned_time: Option<DateTime<Utc>>,
    pub worker: Option<String>,
    pub step_no: usize,
}

/// Quest scan history of one pokestop: one slot per quest layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PokestopQuestInfo {
    pub scan_data: [PokestopScanInfo; 2],
    pub has_ar_quest_reward: bool,
}

pub const QUEST_LAYER_AR: usize = 0;
pub const QUEST_LAYER_NO_AR: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncounterKey {
    pub encounter_id: u64,
    pub pokemon_id: i32,
    pub weather_boost: bool,
}

pub type PokestopHandle = Arc<Mutex<PokestopQuestInfo>>;

/// The pair of dedup caches owned by one area.
#[derive(Debug)]
pub struct AreaCaches {
    pokestops: TtlCache<String, PokestopHandle>,
    encounters: TtlCache<EncounterKey, ()>,
}

impl Default for AreaCaches {
    fn default() -> Self {
        Self {
            pokestops: TtlCache::new(POKESTOP_CACHE_TTL),
            encounters: TtlCache::new(ENCOUNTER_CACHE_TTL),
        }
    }
}

impl AreaCaches {
    /// Handle to the quest info of `stop_id`, created zero-valued on a miss.
    pub fn pokestop(&self, stop_id: &str, now: DateTime<Utc>) -> PokestopHandle {
        self.pokestops
            .get_or_insert_with(stop_id.to_string(), now, PokestopHandle::default)
    }

    pub fn clear_pokestops(&self) {
        self.pokestops.clear();
    }

    /// Records an encounter; returns false if it was already recorded and
    /// has not expired.
    pub fn record_encounter(&self, key: EncounterKey, now: DateTime<Utc>) -> bool {
        if self.encounters.contains(&key, now) {
            return false;
        }
        self.encounters.insert(key, (), now);
        true
    }

    pub fn encounter_seen(&self, key: &EncounterKey, now: DateTime<Utc>) -> bool {
        self.encounters.contains(key, now)
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        self.pokestops.purge_expired(now) + self.encounters.purge_expired(now)
    }

    pub fn pokestop_count(&self) -> usize {
        self.pokestops.len()
    }

    pub fn encounter_count(&self) -> usize {
        self.encounters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000 + seconds, 0).unwrap()
    }

    #[test]
    fn test_pokestop_entry_expires_after_ttl() {
        let caches = AreaCaches::default();
        let inserted = at(0);
        let epsilon = Duration::seconds(1);

        let handle = caches.pokestop("stop-1", inserted);
        handle.lock().has_ar_quest_reward = true;

        let before = caches.pokestop("stop-1", inserted + POKESTOP_CACHE_TTL - epsilon);
        assert!(Arc::ptr_eq(&handle, &before));
        assert!(before.lock().has_ar_quest_reward);

        let after = caches.pokestop("stop-1", inserted + POKESTOP_CACHE_TTL + epsilon);
        assert!(!Arc::ptr_eq(&handle, &after));
        assert_eq!(*after.lock(), PokestopQuestInfo::default());
    }

    #[test]
    fn test_pokestop_miss_creates_zero_entry() {
        let caches = AreaCaches::default();
        let handle = caches.pokestop("new-stop", at(0));
        assert_eq!(*handle.lock(), PokestopQuestInfo::default());
        assert_eq!(caches.pokestop_count(), 1);

        caches.clear_pokestops();
        assert_eq!(caches.pokestop_count(), 0);
    }

    #[test]
    fn test_encounter_reads_do_not_refresh() {
        let caches = AreaCaches::default();
        let key = EncounterKey {
            encounter_id: 42,
            pokemon_id: 25,
            weather_boost: false,
        };
        assert!(caches.record_encounter(key, at(0)));
        assert!(!caches.record_encounter(key, at(10)));
        assert!(caches.encounter_seen(&key, at(59 * 60)));
        assert!(!caches.encounter_seen(&key, at(60 * 60 + 1)));

        let boosted = EncounterKey {
            weather_boost: true,
            ..key
        };
        assert!(!caches.encounter_seen(&boosted, at(0)));
    }

    #[test]
    fn test_purge_expired_drops_old_entries() {
        let cache: TtlCache<u32, u32> = TtlCache::new(Duration::seconds(10));
        cache.insert(1, 1, at(0));
        cache.insert(2, 2, at(5));
        assert_eq!(cache.purge_expired(at(12)), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&2, at(12)), Some(2));
        assert_eq!(cache.get(&2, at(15)), None);
        assert!(cache.is_empty());
    }
}
