// ============================================
// Affinity Profile Cache
// ============================================
//
// In-process cache of affinity profiles keyed by (user_id, now slot).
//
// By default the slot is the exact `now` (microseconds), so a cached profile
// is only reused for the same reference time and the output of a run never
// depends on earlier runs. `bucketed` widens the slot to a fixed number of
// seconds; profiles are then reused across nearby `now` values with their
// decays computed at the first one.
//
// Entries are written once and never updated in place: a reader either sees
// the complete profile or nothing. Two concurrent runs for the same key may
// both compute a profile; the first insert wins and both results are equal
// because the computation is deterministic for a fixed snapshot.

use crate::models::UserId;
use crate::services::profile_builder::AffinityProfile;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AffinityCacheKey {
    pub user_id: UserId,
    pub slot: i64,
}

pub struct AffinityCache {
    entries: DashMap<AffinityCacheKey, Arc<AffinityProfile>>,
    bucket_secs: Option<i64>,
    max_entries: usize,
}

impl AffinityCache {
    /// Cache keyed by the exact reference time
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            bucket_secs: None,
            max_entries,
        }
    }

    /// Cache keyed by `bucket_secs`-wide slots of the reference time
    pub fn bucketed(bucket_secs: i64, max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            bucket_secs: Some(bucket_secs.max(1)),
            max_entries,
        }
    }

    pub fn key(&self, user_id: UserId, now: DateTime<Utc>) -> AffinityCacheKey {
        let slot = match self.bucket_secs {
            Some(secs) => now.timestamp().div_euclid(secs),
            None => now.timestamp_micros(),
        };

        AffinityCacheKey { user_id, slot }
    }

    pub fn get(&self, user_id: UserId, now: DateTime<Utc>) -> Option<Arc<AffinityProfile>> {
        let key = self.key(user_id, now);
        self.entries.get(&key).map(|entry| Arc::clone(entry.value()))
    }

    /// Insert a freshly computed profile unless one already exists for the key.
    ///
    /// Returns the profile that is now authoritative for the key. When the
    /// cache is full the profile is returned without being stored.
    pub fn insert_once(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
        profile: AffinityProfile,
    ) -> Arc<AffinityProfile> {
        let key = self.key(user_id, now);

        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            debug!(user_id = user_id, "Affinity cache full, skipping insert");
            return Arc::new(profile);
        }

        match self.entries.entry(key) {
            Entry::Occupied(existing) => Arc::clone(existing.get()),
            Entry::Vacant(vacant) => {
                let profile = Arc::new(profile);
                vacant.insert(Arc::clone(&profile));
                profile
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_exact_now_only_hits_same_instant() {
        let cache = AffinityCache::new(10);
        cache.insert_once(1, now(), AffinityProfile::empty(1));

        assert!(cache.get(1, now()).is_some());
        assert!(cache.get(1, now() + Duration::milliseconds(1)).is_none());
        assert!(cache.get(2, now()).is_none());
    }

    #[test]
    fn test_bucketed_same_bucket_hits() {
        let cache = AffinityCache::bucketed(3600, 10);
        cache.insert_once(1, now(), AffinityProfile::empty(1));

        assert!(cache.get(1, now() + Duration::minutes(59)).is_some());
        assert!(cache.get(1, now() + Duration::minutes(61)).is_none());
    }

    #[test]
    fn test_insert_once_keeps_first_value() {
        let cache = AffinityCache::new(10);
        let first = cache.insert_once(1, now(), AffinityProfile::empty(1));
        let second = cache.insert_once(1, now(), AffinityProfile::empty(99));

        assert_eq!(first.user_id, 1);
        assert_eq!(second.user_id, 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_full_cache_does_not_grow() {
        let cache = AffinityCache::new(1);
        cache.insert_once(1, now(), AffinityProfile::empty(1));
        let profile = cache.insert_once(2, now(), AffinityProfile::empty(2));

        assert_eq!(profile.user_id, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(2, now()).is_none());
    }

    #[test]
    fn test_negative_timestamps_bucket_consistently() {
        let cache = AffinityCache::bucketed(3600, 10);
        let before_epoch = Utc.with_ymd_and_hms(1969, 12, 31, 23, 30, 0).unwrap();
        assert_eq!(cache.key(1, before_epoch).slot, -1);
    }
}
