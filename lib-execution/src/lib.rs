//! Transaction Batch Execution Core
//!
//! Executes ordered transaction batches on top of a chain tip and produces,
//! for each transaction, a result, a trace, and a set of state
//! reads/writes/deletes suitable for block packaging and downstream receipt
//! construction.
//!
//! The contract VM, persistent storage, and result store are collaborators
//! reached through injected trait objects; this crate owns the
//! orchestration: tiered state-cache discipline, pre/post plugin stages,
//! inline-call recursion, outcome classification, and cooperative
//! cancellation.

pub mod config;
pub mod context;
pub mod events;
pub mod executive;
pub mod executor;
pub mod plugins;
pub mod results;
pub mod store;
pub mod trace;
pub mod transaction;
pub mod types;

// Re-export lib-state types for convenience
pub use lib_state::{
    InMemoryStateReader, StateKey, StateReader, StateSet, StateValue, TieredStateCache,
};

// Core types
pub use types::{hash_bytes, Address, BlockHeader, Bloom, Hash, LogEvent};

// Transactions and traces
pub use trace::{ExecutionStatus, TransactionTrace};
pub use transaction::Transaction;

// Contexts and configuration
pub use config::ExecutorConfig;
pub use context::{ChainContext, TransactionContext};

// Collaborator seams
pub use events::{ExecutionEventSink, TransactionExecutedEvent};
pub use executive::{
    ContractDescriptor, Executive, ExecutiveLookupError, ExecutiveService, MethodDescriptor,
};
pub use plugins::{
    ConsumedResourceTokens, PostExecutionPlugin, PreExecutionPlugin, TransactionFee,
    CHARGE_RESOURCE_TOKEN_METHOD, CHARGE_TRANSACTION_FEES_METHOD,
};
pub use store::{InMemoryTransactionResultStore, TransactionResultStore};

// Execution
pub use executor::{
    BatchExecutionRequest, BatchExecutor, ExecutionError, ExecutionResult,
    MalformedTransactionError, SingleExecutionRequest, SingleTransactionExecutor,
};
pub use results::{synthesize_outcome, ExecutionReturnSet, TransactionResult, TransactionResultStatus};
