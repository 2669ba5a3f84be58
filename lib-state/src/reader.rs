//! Base state sources
//!
//! The bottom tier of a cache stack may consult an external state source.
//! Storage engines implement [`StateReader`]; executions only ever read
//! through it.

use std::collections::BTreeMap;

use crate::state_set::{StateKey, StateValue};

/// Read-only access to an underlying state source.
pub trait StateReader: Send + Sync {
    /// Look up a key. `None` means the key is absent from the source.
    fn get(&self, key: &[u8]) -> Option<StateValue>;
}

/// A state source backed by a plain in-memory map.
///
/// Used to seed a cache stack from a known set of entries, e.g. the state
/// produced by already-packaged transactions of a partial block.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateReader {
    entries: BTreeMap<StateKey, StateValue>,
}

impl InMemoryStateReader {
    pub fn new(entries: BTreeMap<StateKey, StateValue>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl StateReader for InMemoryStateReader {
    fn get(&self, key: &[u8]) -> Option<StateValue> {
        self.entries.get(key).cloned()
    }
}
