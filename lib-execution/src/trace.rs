//! Transaction traces.
//!
//! A trace is the complete record of what happened when one transaction
//! executed: its own state set, return value and error text, plus the traces
//! of the synthetic pre/post transactions and the inline calls it spawned.
//! Children are owned; a trace is a value tree with no back-references.

use lib_state::StateSet;

use crate::plugins::{ConsumedResourceTokens, TransactionFee};
use crate::transaction::Transaction;
use crate::types::{Bloom, Hash, LogEvent};

/// The terminal state of one execution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionStatus {
    /// Nothing has run yet.
    #[default]
    Undefined,
    /// The step itself completed. The transaction as a whole is successful
    /// only when every child trace is successful too.
    Executed,
    /// A pre-plugin transaction failed; the main body never ran.
    Prefailed,
    /// The body ran but a post-plugin transaction failed.
    Postfailed,
    /// Cooperative cancellation was observed.
    Canceled,
    /// The contract failed or could not be resolved.
    ContractError,
    /// The execution host itself failed.
    SystemError,
}

/// The complete record of one transaction's execution.
#[derive(Debug, Clone, Default)]
pub struct TransactionTrace {
    pub transaction_id: Hash,
    pub execution_status: ExecutionStatus,
    pub return_value: Vec<u8>,
    /// Accumulated error text; children surface theirs up on failure.
    pub error: String,
    pub state_set: StateSet,
    pub logs: Vec<LogEvent>,
    pub pre_transactions: Vec<Transaction>,
    pub pre_traces: Vec<TransactionTrace>,
    pub inline_transactions: Vec<Transaction>,
    pub inline_traces: Vec<TransactionTrace>,
    pub post_transactions: Vec<Transaction>,
    pub post_traces: Vec<TransactionTrace>,
    pub transaction_fee: Option<TransactionFee>,
    pub consumed_resource_tokens: Option<ConsumedResourceTokens>,
}

impl TransactionTrace {
    pub fn new(transaction_id: Hash) -> Self {
        Self {
            transaction_id,
            ..Default::default()
        }
    }

    /// Whether this node and every child executed successfully.
    pub fn is_successful(&self) -> bool {
        self.execution_status == ExecutionStatus::Executed
            && self.pre_traces.iter().all(Self::is_successful)
            && self.inline_traces.iter().all(Self::is_successful)
            && self.post_traces.iter().all(Self::is_successful)
    }

    /// Whether cancellation was observed anywhere in the trace tree.
    pub fn is_canceled(&self) -> bool {
        self.execution_status == ExecutionStatus::Canceled
            || self.pre_traces.iter().any(Self::is_canceled)
            || self.inline_traces.iter().any(Self::is_canceled)
            || self.post_traces.iter().any(Self::is_canceled)
    }

    pub fn append_error(&mut self, message: &str) {
        self.error.push_str(message);
    }

    /// All state sets of the tree, in execution order: pre subtrees, this
    /// node's own set, inline subtrees, post subtrees.
    pub fn state_sets(&self) -> Vec<StateSet> {
        let mut sets = Vec::new();
        self.collect_state_sets(&mut sets);
        sets
    }

    fn collect_state_sets(&self, out: &mut Vec<StateSet>) {
        for trace in &self.pre_traces {
            trace.collect_state_sets(out);
        }
        out.push(self.state_set.clone());
        for trace in &self.inline_traces {
            trace.collect_state_sets(out);
        }
        for trace in &self.post_traces {
            trace.collect_state_sets(out);
        }
    }

    /// State sets of the successful pre- and post-stage subtrees only.
    ///
    /// This is the promotable remainder of a failed transaction: charged
    /// fees and finished accounting stay visible, the failed body does not.
    pub fn successful_stage_state_sets(&self) -> Vec<StateSet> {
        let mut sets = Vec::new();
        for trace in &self.pre_traces {
            if trace.is_successful() {
                trace.collect_state_sets(&mut sets);
            }
        }
        for trace in &self.post_traces {
            if trace.is_successful() {
                trace.collect_state_sets(&mut sets);
            }
        }
        sets
    }

    /// Lift error text from failed children up to this node, deepest first.
    pub fn surface_up_error(&mut self) {
        let mut surfaced = String::new();
        for child in self
            .pre_traces
            .iter_mut()
            .chain(self.inline_traces.iter_mut())
            .chain(self.post_traces.iter_mut())
        {
            child.surface_up_error();
            if !child.is_successful() && !child.error.is_empty() {
                surfaced.push_str(&child.error);
            }
        }
        self.error.push_str(&surfaced);
    }

    /// Log events of this node and its successful subtrees, in order.
    pub fn flattened_logs(&self) -> Vec<LogEvent> {
        let mut logs = Vec::new();
        self.collect_logs(&mut logs);
        logs
    }

    fn collect_logs(&self, out: &mut Vec<LogEvent>) {
        for trace in &self.pre_traces {
            if trace.is_successful() {
                trace.collect_logs(out);
            }
        }
        out.extend(self.logs.iter().cloned());
        for trace in &self.inline_traces {
            if trace.is_successful() {
                trace.collect_logs(out);
            }
        }
        for trace in &self.post_traces {
            if trace.is_successful() {
                trace.collect_logs(out);
            }
        }
    }

    /// The bloom filter over all flattened log events.
    pub fn bloom(&self) -> Bloom {
        let mut bloom = Bloom::new();
        for event in self.flattened_logs() {
            bloom.accrue_bloom(&event.bloom());
        }
        bloom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;

    fn executed_trace(id_byte: u8) -> TransactionTrace {
        let mut trace = TransactionTrace::new(Hash::new([id_byte; 32]));
        trace.execution_status = ExecutionStatus::Executed;
        trace
    }

    #[test]
    fn test_success_requires_all_children_successful() {
        let mut trace = executed_trace(1);
        assert!(trace.is_successful());

        let mut failed_child = executed_trace(2);
        failed_child.execution_status = ExecutionStatus::ContractError;
        trace.inline_traces.push(failed_child);
        assert!(!trace.is_successful());
    }

    #[test]
    fn test_cancellation_is_detected_at_any_depth() {
        let mut inner = executed_trace(3);
        inner.execution_status = ExecutionStatus::Canceled;

        let mut middle = executed_trace(2);
        middle.inline_traces.push(inner);

        let mut root = executed_trace(1);
        assert!(!root.is_canceled());
        root.pre_traces.push(middle);
        assert!(root.is_canceled());
    }

    #[test]
    fn test_state_sets_are_flattened_in_execution_order() {
        let mut root = executed_trace(1);
        root.state_set.write(b"own".to_vec(), b"1".to_vec());

        let mut pre = executed_trace(2);
        pre.state_set.write(b"pre".to_vec(), b"1".to_vec());
        root.pre_traces.push(pre);

        let mut inline = executed_trace(3);
        inline.state_set.write(b"inline".to_vec(), b"1".to_vec());
        root.inline_traces.push(inline);

        let mut post = executed_trace(4);
        post.state_set.write(b"post".to_vec(), b"1".to_vec());
        root.post_traces.push(post);

        let keys: Vec<Vec<u8>> = root
            .state_sets()
            .iter()
            .flat_map(|set| set.writes().keys().cloned().collect::<Vec<_>>())
            .collect();
        assert_eq!(
            keys,
            vec![
                b"pre".to_vec(),
                b"own".to_vec(),
                b"inline".to_vec(),
                b"post".to_vec()
            ]
        );
    }

    #[test]
    fn test_successful_stage_state_sets_skip_failed_subtrees() {
        let mut root = executed_trace(1);
        root.execution_status = ExecutionStatus::ContractError;
        root.state_set.write(b"body".to_vec(), b"1".to_vec());

        let mut good_pre = executed_trace(2);
        good_pre.state_set.write(b"fee".to_vec(), b"10".to_vec());
        root.pre_traces.push(good_pre);

        let mut bad_post = executed_trace(3);
        bad_post.execution_status = ExecutionStatus::ContractError;
        bad_post.state_set.write(b"post".to_vec(), b"1".to_vec());
        root.post_traces.push(bad_post);

        let keys: Vec<Vec<u8>> = root
            .successful_stage_state_sets()
            .iter()
            .flat_map(|set| set.writes().keys().cloned().collect::<Vec<_>>())
            .collect();
        assert_eq!(keys, vec![b"fee".to_vec()]);
    }

    #[test]
    fn test_surface_up_error_lifts_deepest_message() {
        let mut deepest = executed_trace(3);
        deepest.execution_status = ExecutionStatus::ContractError;
        deepest.append_error("division by zero\n");

        let mut middle = executed_trace(2);
        middle.execution_status = ExecutionStatus::Executed;
        middle.inline_traces.push(deepest);

        let mut root = executed_trace(1);
        root.inline_traces.push(middle);

        root.surface_up_error();
        assert!(root.error.contains("division by zero"));
    }

    #[test]
    fn test_bloom_covers_successful_children_only() {
        let mut root = executed_trace(1);
        root.logs.push(LogEvent {
            address: Address::new([1u8; 32]),
            name: "RootEvent".to_string(),
            data: vec![],
        });

        let mut failed = executed_trace(2);
        failed.execution_status = ExecutionStatus::ContractError;
        failed.logs.push(LogEvent {
            address: Address::new([2u8; 32]),
            name: "FailedEvent".to_string(),
            data: vec![],
        });
        root.inline_traces.push(failed);

        let bloom = root.bloom();
        let mut root_event = Bloom::new();
        root_event.accrue(b"RootEvent");
        assert!(bloom.contains(&root_event));

        assert_eq!(root.flattened_logs().len(), 1);
    }
}
