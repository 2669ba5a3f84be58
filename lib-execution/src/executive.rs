//! The contract VM seam.
//!
//! An executive is a VM instance bound to one contract address, borrowed
//! from a pool for the duration of a single execution. The pool contract is
//! strict: every executive obtained through [`ExecutiveService::get_executive`]
//! is handed back through [`ExecutiveService::put_executive`] exactly once,
//! on every exit path.

use async_trait::async_trait;
use thiserror::Error;

use crate::context::{ChainContext, TransactionContext};
use crate::types::Address;

/// One callable method of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: String,
    pub is_view: bool,
}

/// The ABI surface of a contract, as plugins see it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractDescriptor {
    pub abi_version: String,
    pub methods: Vec<MethodDescriptor>,
}

/// Failure modes of executive lookup.
///
/// A missing registration is an expected condition and is reported as a
/// value; only infrastructure failures propagate as errors.
#[derive(Debug, Error)]
pub enum ExecutiveLookupError {
    #[error("no contract registration found at {0}")]
    RegistrationNotFound(Address),

    #[error("executive lookup failed: {0}")]
    Internal(String),
}

/// A VM instance bound to a specific contract address.
#[async_trait]
pub trait Executive: Send + Sync {
    fn descriptor(&self) -> &ContractDescriptor;

    /// Run the contract against the context.
    ///
    /// The VM records state changes, logs, inline transactions, the return
    /// value, and the resulting status into `context.trace`. An `Err` is a
    /// fault of the VM itself, not an ordinary contract failure.
    async fn apply(&mut self, context: &mut TransactionContext) -> anyhow::Result<()>;
}

/// The executive pool.
#[async_trait]
pub trait ExecutiveService: Send + Sync {
    async fn get_executive(
        &self,
        chain_context: &ChainContext,
        address: &Address,
    ) -> Result<Box<dyn Executive>, ExecutiveLookupError>;

    async fn put_executive(&self, address: &Address, executive: Box<dyn Executive>);
}
