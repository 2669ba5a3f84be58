//! Batch execution.
//!
//! The batch executor is the single entry point for executing an ordered
//! list of transactions on top of a chain tip.
//!
//! # Execution Order
//!
//! ```text
//! build group cache (seeded from the partial block state, if any)
//! for tx in batch:
//!   execute as a depth-0 single transaction in a worker task
//!   promote or discard its state delta against the group cache
//!   synthesize result + return set
//! persist results
//! ```
//!
//! Transactions within a batch are **strictly sequential**: the group cache
//! sees a linear sequence of deltas, so a later transaction observes every
//! promoted write of an earlier one.

use std::collections::BTreeMap;
use std::sync::Arc;

use lib_state::{InMemoryStateReader, StateKey, StateValue, TieredStateCache};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::context::ChainContext;
use crate::results::{synthesize_outcome, ExecutionReturnSet};
use crate::store::TransactionResultStore;
use crate::trace::{ExecutionStatus, TransactionTrace};
use crate::transaction::Transaction;
use crate::types::BlockHeader;

use super::errors::{ExecutionError, ExecutionResult};
use super::single::{SingleExecutionRequest, SingleTransactionExecutor};

/// An ordered batch of transactions to execute for one block.
#[derive(Debug, Clone)]
pub struct BatchExecutionRequest {
    pub block_header: BlockHeader,
    /// State already produced for this block by previously packaged
    /// transactions; forms the base tier of the group cache.
    pub partial_block_state: Option<BTreeMap<StateKey, StateValue>>,
    pub transactions: Vec<Transaction>,
}

/// Executes transaction batches sequentially against a shared group cache.
pub struct BatchExecutor {
    single: Arc<SingleTransactionExecutor>,
    result_store: Arc<dyn TransactionResultStore>,
}

impl BatchExecutor {
    pub fn new(
        single: Arc<SingleTransactionExecutor>,
        result_store: Arc<dyn TransactionResultStore>,
    ) -> Self {
        Self {
            single,
            result_store,
        }
    }

    /// Execute the batch and return one return set per packaged transaction,
    /// in order.
    ///
    /// `throw_exception` controls how loudly transaction-level error text is
    /// logged, not whether errors propagate.
    pub async fn execute(
        &self,
        request: BatchExecutionRequest,
        cancellation: CancellationToken,
        throw_exception: bool,
    ) -> ExecutionResult<Vec<ExecutionReturnSet>> {
        let header = request.block_header;
        if header.height == 0 {
            return Err(ExecutionError::InvalidBlockHeight);
        }

        let group_cache = match request.partial_block_state {
            Some(entries) => {
                TieredStateCache::with_source(Arc::new(InMemoryStateReader::new(entries)))
            }
            None => TieredStateCache::new(),
        };
        let group_chain_context = ChainContext::new(
            header.previous_block_hash,
            header.height - 1,
            group_cache.clone(),
        );

        let mut results = Vec::new();
        let mut return_sets = Vec::new();

        for transaction in request.transactions {
            if cancellation.is_cancelled() {
                debug!("Batch execution canceled at height {}", header.height);
                break;
            }

            // Each transaction runs on its own worker so a long VM step can
            // be interrupted from outside.
            let single = Arc::clone(&self.single);
            let child_request = SingleExecutionRequest::root(
                group_chain_context.clone(),
                transaction,
                header.time,
            );
            let token = cancellation.clone();
            let worker =
                tokio::spawn(async move { single.execute_one(child_request, token).await });
            let mut trace = worker
                .await
                .map_err(|join_error| ExecutionError::Worker(join_error.to_string()))??;

            if trace.execution_status == ExecutionStatus::Canceled {
                warn!("Transaction {} canceled during execution", trace.transaction_id);
                if cancellation.is_cancelled() {
                    break;
                }
                continue;
            }

            if !try_promote(&group_cache, Some(&mut trace), throw_exception) {
                break;
            }

            let (result, return_set) = synthesize_outcome(&trace, header.height);
            results.push(result);
            return_sets.push(return_set);
        }

        self.result_store
            .add_transaction_results(&results, &header)
            .await
            .map_err(|store_error| ExecutionError::ResultStore(store_error.to_string()))?;

        Ok(return_sets)
    }
}

/// Decide what a completed trace contributes to the group cache.
///
/// A fully successful trace promotes all of its state sets. A canceled
/// trace (anywhere in its tree) promotes nothing and stops the batch. Any
/// other failure promotes only the finished pre/post stage effects, so that
/// e.g. an already charged fee stays visible to later transactions, and
/// lifts the deepest error text to the top of the trace.
pub(crate) fn try_promote(
    group_cache: &TieredStateCache,
    trace: Option<&mut TransactionTrace>,
    throw_exception: bool,
) -> bool {
    let Some(trace) = trace else {
        return false;
    };

    let promoted = if trace.is_successful() {
        group_cache.update(&trace.state_sets());
        true
    } else if trace.is_canceled() {
        false
    } else {
        group_cache.update(&trace.successful_stage_state_sets());
        trace.surface_up_error();
        true
    };

    // Diagnostic: error text is reported even when the trace is successful
    // or excluded from packaging.
    if !trace.error.is_empty() {
        if throw_exception {
            error!("Transaction {} error: {}", trace.transaction_id, trace.error);
        } else {
            debug!("Transaction {} error: {}", trace.transaction_id, trace.error);
        }
    }

    promoted
}
