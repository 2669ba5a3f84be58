//! Execution contexts.

use lib_state::TieredStateCache;

use crate::trace::TransactionTrace;
use crate::transaction::Transaction;
use crate::types::{Address, Hash};

/// The chain position an execution runs against.
///
/// A data carrier: the block the batch builds on and the state cache
/// lookups go through. Rebinding the cache yields a logically new context.
#[derive(Debug, Clone)]
pub struct ChainContext {
    pub previous_block_hash: Hash,
    pub block_height: u64,
    pub state_cache: TieredStateCache,
}

impl ChainContext {
    pub fn new(previous_block_hash: Hash, block_height: u64, state_cache: TieredStateCache) -> Self {
        Self {
            previous_block_hash,
            block_height,
            state_cache,
        }
    }

    /// The same chain position bound to a different state cache.
    pub fn with_state_cache(&self, state_cache: TieredStateCache) -> Self {
        Self {
            previous_block_hash: self.previous_block_hash,
            block_height: self.block_height,
            state_cache,
        }
    }
}

/// The per-transaction context handed to the contract VM.
///
/// The VM reads the transaction and chain position, reads state through
/// `state_cache`, and records everything it does into `trace`.
#[derive(Debug)]
pub struct TransactionContext {
    pub previous_block_hash: Hash,
    /// Height of the block this transaction would be included in.
    pub block_height: u64,
    /// Block time as a unix timestamp in seconds.
    pub current_block_time: u64,
    /// 0 for a top-level transaction, incremented per inline call.
    pub call_depth: u16,
    /// The sender of the root transaction, carried through inline calls.
    pub origin: Address,
    pub transaction: Transaction,
    pub state_cache: TieredStateCache,
    pub trace: TransactionTrace,
}
