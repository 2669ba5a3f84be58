//! Result and return-set synthesis.
//!
//! Maps a terminal trace and the block height into a typed result for the
//! receipt store and an observable return set for block packaging.

use std::collections::{BTreeMap, BTreeSet};

use lib_state::{StateKey, StateSet, StateValue};

use crate::plugins::{ConsumedResourceTokens, TransactionFee};
use crate::trace::{ExecutionStatus, TransactionTrace};
use crate::types::{Bloom, Hash, LogEvent};

/// The receipt category of an executed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionResultStatus {
    /// The transaction never reached execution.
    Unexecutable,
    /// A pre-plugin transaction failed before the body ran.
    PreFailed,
    /// The body or one of its children failed.
    Failed,
    /// Fully successful; effects are part of the block.
    Mined,
}

/// The receipt of one executed transaction.
#[derive(Debug, Clone)]
pub struct TransactionResult {
    pub transaction_id: Hash,
    pub status: TransactionResultStatus,
    pub block_height: u64,
    pub return_value: Vec<u8>,
    pub bloom: Bloom,
    pub logs: Vec<LogEvent>,
    pub error: String,
    pub transaction_fee: Option<TransactionFee>,
    pub consumed_resource_tokens: Option<ConsumedResourceTokens>,
}

/// The observable outcome of one transaction, as packaged into a block.
///
/// `state_changes` and `state_deletes` are disjoint by construction.
#[derive(Debug, Clone)]
pub struct ExecutionReturnSet {
    pub transaction_id: Hash,
    pub status: TransactionResultStatus,
    pub bloom: Bloom,
    pub return_value: Vec<u8>,
    pub state_changes: BTreeMap<StateKey, StateValue>,
    pub state_deletes: BTreeSet<StateKey>,
    /// Keys read during execution with the last observed value; `None`
    /// means the key was observed absent.
    pub state_accesses: BTreeMap<StateKey, Option<StateValue>>,
}

/// Build the result and return set for a completed trace.
pub fn synthesize_outcome(
    trace: &TransactionTrace,
    block_height: u64,
) -> (TransactionResult, ExecutionReturnSet) {
    let result = result_of_trace(trace, block_height);
    let return_set = return_set_of_trace(trace, &result);
    (result, return_set)
}

fn result_of_trace(trace: &TransactionTrace, block_height: u64) -> TransactionResult {
    let mut result = TransactionResult {
        transaction_id: trace.transaction_id,
        status: TransactionResultStatus::Failed,
        block_height,
        return_value: Vec::new(),
        bloom: Bloom::new(),
        logs: Vec::new(),
        error: String::new(),
        transaction_fee: None,
        consumed_resource_tokens: None,
    };

    if trace.execution_status == ExecutionStatus::Undefined {
        result.status = TransactionResultStatus::Unexecutable;
        return result;
    }

    result.transaction_fee = trace.transaction_fee.clone();
    result.consumed_resource_tokens = trace.consumed_resource_tokens.clone();

    if trace.execution_status == ExecutionStatus::Prefailed {
        result.status = TransactionResultStatus::PreFailed;
        result.error = trace.error.clone();
        return result;
    }

    if trace.is_successful() {
        result.status = TransactionResultStatus::Mined;
        result.return_value = trace.return_value.clone();
        result.logs = trace.flattened_logs();
        result.bloom = trace.bloom();
        return result;
    }

    result.error = trace.error.clone();
    result
}

fn return_set_of_trace(trace: &TransactionTrace, result: &TransactionResult) -> ExecutionReturnSet {
    let mut return_set = ExecutionReturnSet {
        transaction_id: result.transaction_id,
        status: result.status,
        bloom: result.bloom.clone(),
        return_value: Vec::new(),
        state_changes: BTreeMap::new(),
        state_deletes: BTreeSet::new(),
        state_accesses: BTreeMap::new(),
    };

    let full_sets = trace.state_sets();
    if trace.is_successful() {
        fold_changes(&full_sets, &mut return_set);
        return_set.return_value = trace.return_value.clone();
    } else {
        // Only the finished pre/post stage effects of a failed transaction
        // are observable.
        fold_changes(&trace.successful_stage_state_sets(), &mut return_set);
    }

    // Reads are reported for the whole tree regardless of outcome.
    for set in &full_sets {
        for (key, observed) in set.reads() {
            return_set
                .state_accesses
                .insert(key.clone(), observed.clone());
        }
    }

    return_set
}

fn fold_changes(sets: &[StateSet], return_set: &mut ExecutionReturnSet) {
    for set in sets {
        for (key, value) in set.writes() {
            return_set.state_deletes.remove(key);
            return_set.state_changes.insert(key.clone(), value.clone());
        }
        for key in set.deletes() {
            return_set.state_changes.remove(key);
            return_set.state_deletes.insert(key.clone());
        }
    }
}
