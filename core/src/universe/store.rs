//! Universe State Store (§4.A): the authoritative per-universe channel arrays.
//!
//! Three parallel arrays per universe, plus a source-tag array:
//! - `operator`: what the Fader/Patch layer believes each channel to be.
//! - `input_merged`: post-mapping contribution from external protocols.
//! - `output`: last-emitted, post-pipeline value.
//!
//! Only the engine task ever mutates a [`UniverseState`] (via [`UniverseStore::with_state_mut`]);
//! every other reader goes through [`UniverseStore::snapshot`], which clones the arrays
//! out from under a short-lived shard lock so the pipeline tick is never blocked on a
//! reader holding a reference.

use dashmap::DashMap;

use crate::model::source_tag::SourceTag;
use crate::protocol_constants::DMX_UNIVERSE_SIZE;

/// Mutable per-universe channel state. `engine`-owned; see module docs.
#[derive(Clone)]
pub struct UniverseState {
    pub operator: [u8; DMX_UNIVERSE_SIZE],
    pub input_merged: [u8; DMX_UNIVERSE_SIZE],
    pub output: [u8; DMX_UNIVERSE_SIZE],
    pub source_tags: [SourceTag; DMX_UNIVERSE_SIZE],
}

impl Default for UniverseState {
    fn default() -> Self {
        Self {
            operator: [0; DMX_UNIVERSE_SIZE],
            input_merged: [0; DMX_UNIVERSE_SIZE],
            output: [0; DMX_UNIVERSE_SIZE],
            source_tags: [SourceTag::UNKNOWN; DMX_UNIVERSE_SIZE],
        }
    }
}

/// A read-only, point-in-time copy of one universe's state.
#[derive(Clone)]
pub struct UniverseSnapshot {
    pub universe_id: u32,
    pub operator: [u8; DMX_UNIVERSE_SIZE],
    pub input_merged: [u8; DMX_UNIVERSE_SIZE],
    pub output: [u8; DMX_UNIVERSE_SIZE],
    pub source_tags: [SourceTag; DMX_UNIVERSE_SIZE],
}

/// Holds one [`UniverseState`] per configured universe.
pub struct UniverseStore {
    states: DashMap<u32, UniverseState>,
}

impl UniverseStore {
    /// Builds a store with a default (all-zero) state for every id in `universe_ids`.
    pub fn new(universe_ids: impl IntoIterator<Item = u32>) -> Self {
        let states = DashMap::new();
        for id in universe_ids {
            states.insert(id, UniverseState::default());
        }
        Self { states }
    }

    /// Gives the engine task exclusive, synchronous access to one universe's state.
    /// Returns `None` if `universe_id` is not configured.
    pub fn with_state_mut<R>(&self, universe_id: u32, f: impl FnOnce(&mut UniverseState) -> R) -> Option<R> {
        self.states.get_mut(&universe_id).map(|mut entry| f(&mut entry))
    }

    /// Clones out a point-in-time snapshot of one universe.
    pub fn snapshot(&self, universe_id: u32) -> Option<UniverseSnapshot> {
        self.states.get(&universe_id).map(|entry| UniverseSnapshot {
            universe_id,
            operator: entry.operator,
            input_merged: entry.input_merged,
            output: entry.output,
            source_tags: entry.source_tags,
        })
    }

    /// Clones out every universe's snapshot, in no particular order.
    pub fn snapshot_all(&self) -> Vec<UniverseSnapshot> {
        self.states
            .iter()
            .map(|entry| UniverseSnapshot {
                universe_id: *entry.key(),
                operator: entry.operator,
                input_merged: entry.input_merged,
                output: entry.output,
                source_tags: entry.source_tags,
            })
            .collect()
    }

    /// The configured universe ids, in no particular order.
    pub fn universe_ids(&self) -> Vec<u32> {
        self.states.iter().map(|e| *e.key()).collect()
    }

    pub fn contains(&self, universe_id: u32) -> bool {
        self.states.contains_key(&universe_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_store_seeds_every_configured_universe() {
        let store = UniverseStore::new([1, 2, 3]);
        assert!(store.contains(1));
        assert!(store.contains(2));
        assert!(!store.contains(4));
    }

    #[test]
    fn with_state_mut_mutates_in_place() {
        let store = UniverseStore::new([1]);
        store.with_state_mut(1, |state| {
            state.operator[0] = 200;
        });
        let snapshot = store.snapshot(1).unwrap();
        assert_eq!(snapshot.operator[0], 200);
    }

    #[test]
    fn snapshot_of_unconfigured_universe_is_none() {
        let store = UniverseStore::new([1]);
        assert!(store.snapshot(99).is_none());
    }

    #[test]
    fn channel_1_and_512_are_distinct_addressable_slots() {
        let store = UniverseStore::new([1]);
        store.with_state_mut(1, |state| {
            state.operator[0] = 10; // channel 1
            state.operator[511] = 20; // channel 512
        });
        let snapshot = store.snapshot(1).unwrap();
        assert_eq!(snapshot.operator[0], 10);
        assert_eq!(snapshot.operator[511], 20);
    }
}
