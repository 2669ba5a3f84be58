//! Tiered state cache
//!
//! A stack of read-through, write-local layers over an optional base source.
//! Lookups descend from the top layer towards the base; the first layer that
//! knows the key wins, and a delete tombstone masks everything below it.
//!
//! # Invariants
//!
//! - No key is simultaneously a live write and a live delete in one layer.
//! - Every read issued through [`TieredStateCache::get`] is recorded so it
//!   can later be surfaced as a state access.
//! - A child layer is never promoted implicitly; promotion is an explicit
//!   [`TieredStateCache::update`] of the parent with the child's materialized
//!   state sets.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::reader::StateReader;
use crate::state_set::{StateKey, StateSet, StateValue};

#[derive(Default)]
struct Layer {
    writes: BTreeMap<StateKey, StateValue>,
    deletes: BTreeSet<StateKey>,
    reads: BTreeMap<StateKey, Option<StateValue>>,
}

/// A stack of key/value overlays over an optional base state source.
///
/// Clones share the same top layer, so a context holding a clone observes
/// updates made through any other handle. [`TieredStateCache::child`] opens a
/// fresh layer on top instead.
#[derive(Clone, Default)]
pub struct TieredStateCache {
    parent: Option<Arc<TieredStateCache>>,
    source: Option<Arc<dyn StateReader>>,
    layer: Arc<Mutex<Layer>>,
}

impl TieredStateCache {
    /// An empty cache with no base source.
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty cache whose bottom tier reads through to `source`.
    pub fn with_source(source: Arc<dyn StateReader>) -> Self {
        Self {
            parent: None,
            source: Some(source),
            layer: Arc::new(Mutex::new(Layer::default())),
        }
    }

    /// Open a new empty layer over this cache.
    ///
    /// Reads descend into `self`; writes stay in the child until explicitly
    /// promoted.
    pub fn child(&self) -> Self {
        Self {
            parent: Some(Arc::new(self.clone())),
            source: None,
            layer: Arc::new(Mutex::new(Layer::default())),
        }
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    /// Look up a key, recording the observation in this cache's read log.
    ///
    /// A delete tombstone in any layer masks the layers below it; the caller
    /// sees the key as absent. Lookups never fail.
    pub fn get(&self, key: &[u8]) -> Option<StateValue> {
        let observed = self.lookup(key);
        self.lock().reads.insert(key.to_vec(), observed.clone());
        observed
    }

    fn lookup(&self, key: &[u8]) -> Option<StateValue> {
        {
            let layer = self.lock();
            if let Some(value) = layer.writes.get(key) {
                return Some(value.clone());
            }
            if layer.deletes.contains(key) {
                return None;
            }
        }
        if let Some(parent) = &self.parent {
            return parent.lookup(key);
        }
        if let Some(source) = &self.source {
            return source.get(key);
        }
        None
    }

    /// Fold a sequence of state sets into the top layer, in order.
    ///
    /// A write clears a pending delete for the same key and a delete clears a
    /// pending write, preserving the mutual-exclusion invariant.
    pub fn update(&self, state_sets: &[StateSet]) {
        let mut layer = self.lock();
        for set in state_sets {
            for (key, value) in set.writes() {
                layer.deletes.remove(key);
                layer.writes.insert(key.clone(), value.clone());
            }
            for key in set.deletes() {
                layer.writes.remove(key);
                layer.deletes.insert(key.clone());
            }
        }
    }

    /// Mirror an update one level up, into the parent tier.
    ///
    /// No-op when this cache has no parent; check [`Self::has_parent`] when
    /// the distinction matters.
    pub fn update_parent(&self, state_sets: &[StateSet]) {
        if let Some(parent) = &self.parent {
            parent.update(state_sets);
        }
    }

    /// The reads recorded against this cache, with the values as observed.
    pub fn recorded_reads(&self) -> BTreeMap<StateKey, Option<StateValue>> {
        self.lock().reads.clone()
    }

    // The cache API is infallible by contract, so a poisoned lock is
    // recovered rather than surfaced.
    fn lock(&self) -> MutexGuard<'_, Layer> {
        match self.layer.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for TieredStateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let layer = self.lock();
        f.debug_struct("TieredStateCache")
            .field("writes", &layer.writes.len())
            .field("deletes", &layer.deletes.len())
            .field("reads", &layer.reads.len())
            .field("has_parent", &self.parent.is_some())
            .field("has_source", &self.source.is_some())
            .finish()
    }
}
