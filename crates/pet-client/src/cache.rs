//! Record Cache
//!
//! Single merge point for pulled snapshots and pushed events. Every accepted
//! change bumps `version` and wakes watchers.

use crate::record::{FetchOutcome, Record, RecordPatch};
use parking_lot::RwLock;
use tokio::sync::watch;

/// Cached state as seen by watchers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheState {
    pub record: Option<Record>,
    /// Slot of the observation that produced `record`
    pub observed_slot: u64,
    /// At least one fetch has completed
    pub loaded: bool,
    /// Incremented on every accepted change
    pub version: u64,
}

/// Last-known pet record plus the identity's balance
#[derive(Debug)]
pub struct RecordCache {
    state: watch::Sender<CacheState>,
    balance: RwLock<Option<u64>>,
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordCache {
    pub fn new() -> Self {
        let (state, _) = watch::channel(CacheState::default());
        Self {
            state,
            balance: RwLock::new(None),
        }
    }

    /// Copy of the cached record
    pub fn get(&self) -> Option<Record> {
        self.state.borrow().record.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.borrow().loaded
    }

    pub fn state(&self) -> CacheState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CacheState> {
        self.state.subscribe()
    }

    /// Merge a pulled snapshot observed at `slot`. Returns whether it was accepted.
    pub fn apply_snapshot(&self, outcome: &FetchOutcome, slot: u64) -> bool {
        self.state.send_if_modified(|state| {
            let first_load = !state.loaded;
            state.loaded = true;

            match outcome {
                FetchOutcome::NotFound => {
                    // The record is never destroyed: absence after a sighting is a lagging node
                    if state.record.is_some() {
                        tracing::debug!("Ignoring absence at slot {}, record already cached", slot);
                        return false;
                    }
                    if first_load {
                        state.observed_slot = slot;
                        state.version += 1;
                    }
                    first_load
                }
                FetchOutcome::Found(incoming) => {
                    if let Some(cached) = &state.record {
                        if !is_newer(incoming.last_update, slot, cached.last_update, state.observed_slot) {
                            tracing::debug!(
                                "Rejecting stale snapshot (last_update {} slot {}) over cached (last_update {} slot {})",
                                incoming.last_update,
                                slot,
                                cached.last_update,
                                state.observed_slot
                            );
                            return false;
                        }
                        if cached == incoming {
                            state.observed_slot = state.observed_slot.max(slot);
                            return false;
                        }
                    }
                    state.record = Some(incoming.clone());
                    state.observed_slot = slot;
                    state.version += 1;
                    true
                }
            }
        })
    }

    /// Merge a pushed partial update observed at `slot`.
    /// Ignored while nothing is cached.
    pub fn apply_patch(&self, patch: &RecordPatch, slot: u64) -> bool {
        if patch.is_empty() {
            return false;
        }
        self.state.send_if_modified(|state| {
            let Some(cached) = &state.record else {
                tracing::debug!("Ignoring event at slot {}, no record cached yet", slot);
                return false;
            };
            let incoming_update = patch.last_update.unwrap_or(cached.last_update);
            if !is_newer(incoming_update, slot, cached.last_update, state.observed_slot) {
                tracing::debug!(
                    "Ignoring stale event (last_update {} slot {})",
                    incoming_update,
                    slot
                );
                return false;
            }
            let merged = patch.apply_to(cached);
            if merged == *cached {
                state.observed_slot = state.observed_slot.max(slot);
                return false;
            }
            state.record = Some(merged);
            state.observed_slot = slot;
            state.version += 1;
            true
        })
    }

    pub fn set_balance(&self, lamports: u64) {
        *self.balance.write() = Some(lamports);
    }

    pub fn clear_balance(&self) {
        *self.balance.write() = None;
    }

    /// Last fetched balance of the local identity
    pub fn balance(&self) -> Option<u64> {
        *self.balance.read()
    }
}

fn is_newer(incoming_update: i64, incoming_slot: u64, cached_update: i64, cached_slot: u64) -> bool {
    match incoming_update.cmp(&cached_update) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => incoming_slot >= cached_slot,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;

    fn record(hunger: u8, last_update: i64) -> Record {
        Record {
            name: "maya".to_string(),
            hunger,
            happiness: 50,
            alive: true,
            last_update,
            total_received: 0,
            last_feeder: Pubkey::default(),
        }
    }

    #[test]
    fn test_older_snapshot_rejected() {
        let cache = RecordCache::new();
        assert!(cache.apply_snapshot(&FetchOutcome::Found(record(82, 200)), 10));
        // A slower fetch started earlier lands afterwards
        assert!(!cache.apply_snapshot(&FetchOutcome::Found(record(80, 100)), 8));
        assert_eq!(cache.get().unwrap().hunger, 82);
    }

    #[test]
    fn test_equal_update_lower_slot_rejected() {
        let cache = RecordCache::new();
        cache.apply_snapshot(&FetchOutcome::Found(record(84, 200)), 12);
        assert!(!cache.apply_snapshot(&FetchOutcome::Found(record(82, 200)), 11));
        assert!(cache.apply_snapshot(&FetchOutcome::Found(record(86, 200)), 13));
        assert_eq!(cache.get().unwrap().hunger, 86);
    }

    #[test]
    fn test_absence_only_before_first_sighting() {
        let cache = RecordCache::new();
        assert!(!cache.is_loaded());
        assert!(cache.apply_snapshot(&FetchOutcome::NotFound, 1));
        assert!(cache.is_loaded());
        assert!(cache.get().is_none());

        cache.apply_snapshot(&FetchOutcome::Found(record(80, 100)), 5);
        assert!(!cache.apply_snapshot(&FetchOutcome::NotFound, 6));
        assert!(cache.get().is_some());
    }

    #[test]
    fn test_patch_requires_cached_record() {
        let cache = RecordCache::new();
        let patch = RecordPatch {
            hunger: Some(90),
            last_update: Some(300),
            ..Default::default()
        };
        assert!(!cache.apply_patch(&patch, 3));
        assert!(cache.get().is_none());

        cache.apply_snapshot(&FetchOutcome::Found(record(80, 100)), 2);
        assert!(cache.apply_patch(&patch, 3));
        let cached = cache.get().unwrap();
        assert_eq!(cached.hunger, 90);
        assert_eq!(cached.name, "maya");
    }

    #[test]
    fn test_stale_patch_ignored() {
        let cache = RecordCache::new();
        cache.apply_snapshot(&FetchOutcome::Found(record(80, 100)), 2);
        let patch = RecordPatch {
            hunger: Some(10),
            last_update: Some(50),
            ..Default::default()
        };
        assert!(!cache.apply_patch(&patch, 3));
        assert_eq!(cache.get().unwrap().hunger, 80);
    }

    #[test]
    fn test_version_tracks_accepted_changes() {
        let cache = RecordCache::new();
        let mut rx = cache.subscribe();
        cache.apply_snapshot(&FetchOutcome::Found(record(80, 100)), 2);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().version, 1);

        // Same record again wakes nobody
        cache.apply_snapshot(&FetchOutcome::Found(record(80, 100)), 3);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_balance() {
        let cache = RecordCache::new();
        assert_eq!(cache.balance(), None);
        cache.set_balance(42);
        assert_eq!(cache.balance(), Some(42));
    }
}
