//! Tiered State Caching
//!
//! In-memory state layering for transaction execution.
//!
//! # Design Principles
//!
//! 1. **Pure data structures** - No I/O, no global state
//! 2. **Deterministic** - Lookups and merges are order-defined
//! 3. **Infallible reads** - A cache lookup never fails; a missing key is
//!    simply absent
//! 4. **Cheap sharing** - Caches clone by reference so child executions can
//!    hold a parent snapshot without copying
//!
//! The persistent store behind the bottom tier is a collaborator reached
//! through the [`StateReader`] seam; this crate never touches disk.

pub mod reader;
pub mod state_set;
pub mod tiered_cache;

pub use reader::{InMemoryStateReader, StateReader};
pub use state_set::{StateKey, StateSet, StateValue};
pub use tiered_cache::TieredStateCache;
