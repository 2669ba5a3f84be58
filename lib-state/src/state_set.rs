//! State change sets
//!
//! A [`StateSet`] records the writes, deletes, and observed reads produced by
//! one execution step. Writes and deletes are mutually exclusive per key: a
//! write clears any pending delete for that key and vice versa, so a set can
//! always be folded into a cache layer without ambiguity.

use std::collections::{BTreeMap, BTreeSet};

/// Raw state key bytes.
pub type StateKey = Vec<u8>;

/// Raw state value bytes.
pub type StateValue = Vec<u8>;

/// The writes, deletes, and reads produced by one execution step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSet {
    writes: BTreeMap<StateKey, StateValue>,
    deletes: BTreeSet<StateKey>,
    reads: BTreeMap<StateKey, Option<StateValue>>,
}

impl StateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write. Clears any pending delete for the same key.
    pub fn write(&mut self, key: impl Into<StateKey>, value: impl Into<StateValue>) {
        let key = key.into();
        self.deletes.remove(&key);
        self.writes.insert(key, value.into());
    }

    /// Record a delete. Clears any pending write for the same key.
    pub fn delete(&mut self, key: impl Into<StateKey>) {
        let key = key.into();
        self.writes.remove(&key);
        self.deletes.insert(key);
    }

    /// Record a read together with the value as observed.
    ///
    /// `None` means the key was observed absent. A later read of the same key
    /// replaces the earlier observation.
    pub fn record_read(&mut self, key: impl Into<StateKey>, observed: Option<StateValue>) {
        self.reads.insert(key.into(), observed);
    }

    pub fn writes(&self) -> &BTreeMap<StateKey, StateValue> {
        &self.writes
    }

    pub fn deletes(&self) -> &BTreeSet<StateKey> {
        &self.deletes
    }

    pub fn reads(&self) -> &BTreeMap<StateKey, Option<StateValue>> {
        &self.reads
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty() && self.deletes.is_empty() && self.reads.is_empty()
    }
}
