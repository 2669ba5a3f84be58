//! Execution errors.
//!
//! Expected partial failures (a failed plugin transaction, a missing
//! contract, a failed inline call) are recorded in the trace and never
//! raised. The errors here are the conditions that abort execution: a
//! malformed transaction, an infrastructure failure, or a VM fault.

use thiserror::Error;

use crate::types::{Address, Hash};

/// Why a transaction failed structural validation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MalformedTransactionError {
    #[error("transaction sender is not set")]
    MissingFrom,

    #[error("transaction recipient is not set")]
    MissingTo,
}

/// A condition that aborts execution of a transaction or a whole batch.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("malformed transaction {transaction_id}: {reason}")]
    MalformedTransaction {
        transaction_id: Hash,
        reason: MalformedTransactionError,
    },

    #[error("batch block height must be at least 1")]
    InvalidBlockHeight,

    #[error("executive lookup failed for {address}: {message}")]
    ExecutiveLookup { address: Address, message: String },

    #[error("contract fault in {method}: {message}")]
    VmFault { method: String, message: String },

    #[error("plugin failure: {0}")]
    Plugin(String),

    #[error("execution worker failed: {0}")]
    Worker(String),

    #[error("failed to persist transaction results: {0}")]
    ResultStore(String),
}

/// Result type for executor operations.
pub type ExecutionResult<T> = Result<T, ExecutionError>;
