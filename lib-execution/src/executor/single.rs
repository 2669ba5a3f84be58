//! Single-transaction execution.
//!
//! Runs one transaction, possibly nested, through the contract VM:
//!
//! ```text
//! check cancellation / structure
//! open internal cache layer
//! get executive
//!   pre-plugin transactions      (top level only)
//!   vm apply
//!   inline transactions          (depth + 1, parent origin)
//!   post-plugin transactions     (top level only)
//! put executive
//! ```
//!
//! The internal cache layer isolates the transaction from its caller: all
//! sub-work reads and writes through it, and the caller decides after the
//! fact which of the materialized state sets to keep.
//!
//! The executive is returned to the pool on **every** exit path, including
//! VM faults and cancellation.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ExecutorConfig;
use crate::context::{ChainContext, TransactionContext};
use crate::events::{ExecutionEventSink, TransactionExecutedEvent};
use crate::executive::{Executive, ExecutiveLookupError, ExecutiveService};
use crate::plugins::{
    dedup_post_plugins, dedup_pre_plugins, ConsumedResourceTokens, PostExecutionPlugin,
    PreExecutionPlugin, TransactionFee, CHARGE_RESOURCE_TOKEN_METHOD,
    CHARGE_TRANSACTION_FEES_METHOD,
};
use crate::trace::{ExecutionStatus, TransactionTrace};
use crate::transaction::Transaction;
use crate::types::{Address, Hash};

use super::errors::{ExecutionError, ExecutionResult, MalformedTransactionError};

/// Input for one single-transaction execution.
#[derive(Debug, Clone)]
pub struct SingleExecutionRequest {
    /// 0 for a top-level transaction, incremented per inline call.
    pub depth: u16,
    pub chain_context: ChainContext,
    pub transaction: Transaction,
    /// Block time as a unix timestamp in seconds.
    pub current_block_time: u64,
    /// Origin to inherit; the transaction sender when absent.
    pub origin: Option<Address>,
    pub is_cancellable: bool,
}

impl SingleExecutionRequest {
    /// A top-level, cancellable request.
    pub fn root(
        chain_context: ChainContext,
        transaction: Transaction,
        current_block_time: u64,
    ) -> Self {
        Self {
            depth: 0,
            chain_context,
            transaction,
            current_block_time,
            origin: None,
            is_cancellable: true,
        }
    }
}

/// Executes single transactions against the contract VM, orchestrating
/// plugin stages and inline recursion.
pub struct SingleTransactionExecutor {
    executive_service: Arc<dyn ExecutiveService>,
    pre_plugins: Vec<Arc<dyn PreExecutionPlugin>>,
    post_plugins: Vec<Arc<dyn PostExecutionPlugin>>,
    config: ExecutorConfig,
    event_sink: Option<Arc<dyn ExecutionEventSink>>,
}

impl SingleTransactionExecutor {
    /// Create an executor. Plugin lists are deduplicated by concrete type,
    /// keeping the first registration of each.
    pub fn new(
        executive_service: Arc<dyn ExecutiveService>,
        pre_plugins: Vec<Arc<dyn PreExecutionPlugin>>,
        post_plugins: Vec<Arc<dyn PostExecutionPlugin>>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            executive_service,
            pre_plugins: dedup_pre_plugins(pre_plugins),
            post_plugins: dedup_post_plugins(post_plugins),
            config,
            event_sink: None,
        }
    }

    /// Attach an event sink; events are published in debug builds only.
    pub fn with_event_sink(mut self, event_sink: Arc<dyn ExecutionEventSink>) -> Self {
        self.event_sink = Some(event_sink);
        self
    }

    /// Execute one transaction and return its trace.
    ///
    /// Expected partial failures come back as a trace; an `Err` aborts the
    /// surrounding batch.
    pub async fn execute_one(
        &self,
        request: SingleExecutionRequest,
        cancellation: CancellationToken,
    ) -> ExecutionResult<TransactionTrace> {
        let transaction_id = request.transaction.id();
        if request.is_cancellable && cancellation.is_cancelled() {
            return Ok(canceled_trace(transaction_id));
        }

        let from = request.transaction.from.ok_or(ExecutionError::MalformedTransaction {
            transaction_id,
            reason: MalformedTransactionError::MissingFrom,
        })?;
        let to = request.transaction.to.ok_or(ExecutionError::MalformedTransaction {
            transaction_id,
            reason: MalformedTransactionError::MissingTo,
        })?;

        let mut trace = TransactionTrace::new(transaction_id);
        if request.depth > self.config.max_call_depth {
            trace.execution_status = ExecutionStatus::ContractError;
            trace.append_error(&format!(
                "Exceeded the maximum call depth of {}.\n",
                self.config.max_call_depth
            ));
            return Ok(trace);
        }

        // Everything below the transaction (plugins, vm, inline calls) works
        // through this layer; the caller keeps its own layer untouched.
        let internal_cache = request.chain_context.state_cache.child();
        let internal_chain_context = request
            .chain_context
            .with_state_cache(internal_cache.clone());

        let mut context = TransactionContext {
            previous_block_hash: request.chain_context.previous_block_hash,
            block_height: request.chain_context.block_height + 1,
            current_block_time: request.current_block_time,
            call_depth: request.depth,
            origin: request.origin.unwrap_or(from),
            transaction: request.transaction.clone(),
            state_cache: internal_cache.clone(),
            trace,
        };

        let mut executive = match self
            .executive_service
            .get_executive(&internal_chain_context, &to)
            .await
        {
            Ok(executive) => executive,
            Err(ExecutiveLookupError::RegistrationNotFound(_)) => {
                context.trace.execution_status = ExecutionStatus::ContractError;
                context.trace.append_error("Invalid contract address.\n");
                return Ok(context.trace);
            }
            Err(ExecutiveLookupError::Internal(message)) => {
                return Err(ExecutionError::ExecutiveLookup {
                    address: to,
                    message,
                });
            }
        };

        let applied = self
            .apply_stages(executive.as_mut(), &mut context, &request, &cancellation)
            .await;
        self.executive_service.put_executive(&to, executive).await;

        let mut trace = context.trace;
        for (key, observed) in internal_cache.recorded_reads() {
            trace.state_set.record_read(key, observed);
        }

        if cfg!(debug_assertions) {
            if let Some(sink) = &self.event_sink {
                let event = TransactionExecutedEvent {
                    trace: trace.clone(),
                };
                if let Err(error) = sink.publish(event).await {
                    debug!("Dropped transaction executed event: {error}");
                }
            }
        }

        applied?;
        Ok(trace)
    }

    async fn apply_stages(
        &self,
        executive: &mut dyn Executive,
        context: &mut TransactionContext,
        request: &SingleExecutionRequest,
        cancellation: &CancellationToken,
    ) -> ExecutionResult<()> {
        if request.depth == 0
            && !self
                .run_pre_stage(executive, context, request, cancellation)
                .await?
        {
            context.trace.execution_status = ExecutionStatus::Prefailed;
            return Ok(());
        }

        let apply_result = if request.is_cancellable {
            let apply = executive.apply(context);
            tokio::pin!(apply);
            tokio::select! {
                _ = cancellation.cancelled() => None,
                result = &mut apply => Some(result),
            }
        } else {
            Some(executive.apply(context).await)
        };
        let Some(apply_result) = apply_result else {
            context.trace.execution_status = ExecutionStatus::Canceled;
            context.trace.append_error("Execution canceled.\n");
            return Ok(());
        };
        if let Err(fault) = apply_result {
            context.trace.execution_status = ExecutionStatus::ContractError;
            context.trace.append_error(&format!("{fault}\n"));
            return Err(ExecutionError::VmFault {
                method: context.transaction.method_name.clone(),
                message: fault.to_string(),
            });
        }

        if context.trace.is_successful() {
            if let Err(error) = self.run_inline_stage(context, request, cancellation).await {
                context.trace.execution_status = ExecutionStatus::ContractError;
                context.trace.append_error(&format!("{error}\n"));
                return Err(error);
            }
        }
        if context.trace.is_canceled() {
            return Ok(());
        }

        if request.depth == 0 {
            match self
                .run_post_stage(executive, context, request, cancellation)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    context.trace.execution_status = ExecutionStatus::Postfailed;
                }
                Err(error) => {
                    context.trace.execution_status = ExecutionStatus::ContractError;
                    context.trace.append_error(&format!("{error}\n"));
                    return Err(error);
                }
            }
        }

        Ok(())
    }

    /// Run the pre-plugin transactions. Returns false when the stage failed
    /// and the main body must not run.
    async fn run_pre_stage(
        &self,
        executive: &mut dyn Executive,
        context: &mut TransactionContext,
        request: &SingleExecutionRequest,
        cancellation: &CancellationToken,
    ) -> ExecutionResult<bool> {
        for plugin in &self.pre_plugins {
            let pre_transactions = plugin
                .get_pre_transactions(executive.descriptor(), context)
                .await
                .map_err(|error| ExecutionError::Plugin(error.to_string()))?;

            for pre_transaction in pre_transactions {
                let child_request = SingleExecutionRequest {
                    depth: 0,
                    chain_context: request
                        .chain_context
                        .with_state_cache(context.state_cache.clone()),
                    transaction: pre_transaction.clone(),
                    current_block_time: request.current_block_time,
                    origin: None,
                    is_cancellable: request.is_cancellable,
                };
                let pre_trace =
                    Box::pin(self.execute_one(child_request, cancellation.clone())).await?;

                if pre_transaction.method_name == CHARGE_TRANSACTION_FEES_METHOD
                    && !pre_trace.return_value.is_empty()
                {
                    match TransactionFee::decode(&pre_trace.return_value) {
                        Ok(fee) => context.trace.transaction_fee = Some(fee),
                        Err(error) => {
                            debug!("Ignoring undecodable transaction fee payload: {error}")
                        }
                    }
                }

                let successful = pre_trace.is_successful();
                let pre_state_sets = pre_trace.state_sets();
                context.trace.pre_transactions.push(pre_transaction);
                context.trace.pre_traces.push(pre_trace);

                if !successful {
                    return Ok(false);
                }

                // The fee charge must stay visible to the caller even when
                // the body later fails, so the update is mirrored one tier
                // up as well.
                context.state_cache.update(&pre_state_sets);
                if context.state_cache.has_parent() {
                    context.state_cache.update_parent(&pre_state_sets);
                }

                if let Some(fee) = &context.trace.transaction_fee {
                    if fee.is_failed_to_charge {
                        // The charge transaction did run; only the charge
                        // itself failed.
                        if let Some(last) = context.trace.pre_traces.last_mut() {
                            last.execution_status = ExecutionStatus::Executed;
                        }
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    /// Run the inline transactions emitted by the VM, in order, stopping at
    /// the first failed or canceled child.
    async fn run_inline_stage(
        &self,
        context: &mut TransactionContext,
        request: &SingleExecutionRequest,
        cancellation: &CancellationToken,
    ) -> ExecutionResult<()> {
        // Inline calls must observe the parent body's writes.
        context.state_cache.update(&[context.trace.state_set.clone()]);

        for inline_transaction in context.trace.inline_transactions.clone() {
            let child_request = SingleExecutionRequest {
                depth: request.depth + 1,
                chain_context: request
                    .chain_context
                    .with_state_cache(context.state_cache.clone()),
                transaction: inline_transaction.clone(),
                current_block_time: request.current_block_time,
                origin: Some(context.origin),
                is_cancellable: request.is_cancellable,
            };
            let inline_trace =
                Box::pin(self.execute_one(child_request, cancellation.clone())).await?;

            let canceled = inline_trace.is_canceled();
            let successful = inline_trace.is_successful();
            let inline_state_sets = inline_trace.state_sets();

            if canceled {
                debug!(
                    "Inline transaction {} canceled",
                    inline_transaction.method_name
                );
                context.trace.inline_traces.push(inline_trace);
                break;
            }
            if !successful {
                warn!(
                    "Inline transaction {} failed: {}",
                    inline_transaction.method_name, inline_trace.error
                );
                context.trace.inline_traces.push(inline_trace);
                break;
            }

            context.trace.inline_traces.push(inline_trace);
            context.state_cache.update(&inline_state_sets);
        }
        Ok(())
    }

    /// Run the post-plugin transactions. Returns false when the stage
    /// failed.
    async fn run_post_stage(
        &self,
        executive: &mut dyn Executive,
        context: &mut TransactionContext,
        request: &SingleExecutionRequest,
        cancellation: &CancellationToken,
    ) -> ExecutionResult<bool> {
        if !context.trace.is_successful() {
            // The failed body's writes must stay invisible to post plugins;
            // rebuild the working layer from the caller's cache plus the
            // finished pre-stage effects.
            let rebuilt = request.chain_context.state_cache.child();
            let mut successful_pre_sets = Vec::new();
            for pre_trace in &context.trace.pre_traces {
                if pre_trace.is_successful() {
                    successful_pre_sets.extend(pre_trace.state_sets());
                }
            }
            rebuilt.update(&successful_pre_sets);
            context.state_cache = rebuilt;
        }

        for plugin in &self.post_plugins {
            let post_transactions = plugin
                .get_post_transactions(executive.descriptor(), context)
                .await
                .map_err(|error| ExecutionError::Plugin(error.to_string()))?;

            for post_transaction in post_transactions {
                let child_request = SingleExecutionRequest {
                    depth: 0,
                    chain_context: request
                        .chain_context
                        .with_state_cache(context.state_cache.clone()),
                    transaction: post_transaction.clone(),
                    current_block_time: request.current_block_time,
                    origin: None,
                    is_cancellable: request.is_cancellable,
                };
                let post_trace =
                    Box::pin(self.execute_one(child_request, cancellation.clone())).await?;

                if post_transaction.method_name == CHARGE_RESOURCE_TOKEN_METHOD
                    && !post_trace.return_value.is_empty()
                {
                    match ConsumedResourceTokens::decode(&post_trace.return_value) {
                        Ok(consumed) => {
                            context.trace.consumed_resource_tokens = Some(consumed)
                        }
                        Err(error) => {
                            debug!("Ignoring undecodable resource token payload: {error}")
                        }
                    }
                }

                let successful = post_trace.is_successful();
                let post_state_sets = post_trace.state_sets();
                context.trace.post_transactions.push(post_transaction);
                context.trace.post_traces.push(post_trace);

                if !successful {
                    return Ok(false);
                }
                context.state_cache.update(&post_state_sets);
            }
        }
        Ok(true)
    }
}

fn canceled_trace(transaction_id: Hash) -> TransactionTrace {
    let mut trace = TransactionTrace::new(transaction_id);
    trace.execution_status = ExecutionStatus::Canceled;
    trace.append_error("Execution canceled.\n");
    trace
}
