//! Execution event emission.
//!
//! The executor can publish a [`TransactionExecutedEvent`] after each
//! single-transaction execution. Publication happens in debug builds only
//! and is best-effort; a failing sink never affects execution.

use anyhow::Result;
use async_trait::async_trait;

use crate::trace::TransactionTrace;

/// Emitted after a single transaction finished executing.
#[derive(Debug, Clone)]
pub struct TransactionExecutedEvent {
    pub trace: TransactionTrace,
}

/// Receives execution events.
#[async_trait]
pub trait ExecutionEventSink: Send + Sync {
    async fn publish(&self, event: TransactionExecutedEvent) -> Result<()>;
}
