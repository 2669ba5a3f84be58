//! Transaction execution.
//!
//! [`BatchExecutor`] drives ordered batches; [`SingleTransactionExecutor`]
//! runs one transaction through the VM with plugin orchestration and inline
//! recursion.

pub mod batch;
pub mod errors;
pub mod single;

pub use batch::{BatchExecutionRequest, BatchExecutor};
pub use errors::{ExecutionError, ExecutionResult, MalformedTransactionError};
pub use single::{SingleExecutionRequest, SingleTransactionExecutor};
