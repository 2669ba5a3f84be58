//! Pre- and post-execution plugins.
//!
//! A plugin inspects a contract descriptor and the transaction context and
//! materializes synthetic transactions to run immediately before or after
//! the main transaction, e.g. fee charging or resource-token accounting.
//!
//! Plugin lists are deduplicated by concrete type: when the same plugin type
//! is registered twice, the first registration wins and the order among the
//! remaining types is the registration order.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::TransactionContext;
use crate::executive::ContractDescriptor;
use crate::transaction::Transaction;

/// Method name of the fee-charging pre-transaction.
pub const CHARGE_TRANSACTION_FEES_METHOD: &str = "ChargeTransactionFees";

/// Method name of the resource-token post-transaction.
pub const CHARGE_RESOURCE_TOKEN_METHOD: &str = "ChargeResourceToken";

/// The fee outcome returned by a `ChargeTransactionFees` pre-transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFee {
    pub symbol: String,
    pub amount: u64,
    /// Set when the payer could not cover the fee. The charge transaction
    /// itself still executed.
    pub is_failed_to_charge: bool,
}

impl TransactionFee {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// The resource usage returned by a `ChargeResourceToken` post-transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedResourceTokens {
    pub tokens: BTreeMap<String, u64>,
    pub is_failed: bool,
}

impl ConsumedResourceTokens {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Produces synthetic transactions to run before the main transaction.
///
/// Implementations must return an empty list for the synthetic transactions
/// they emit themselves; pre-transactions are executed through the same
/// executor and would otherwise recurse.
#[async_trait]
pub trait PreExecutionPlugin: Any + Send + Sync {
    async fn get_pre_transactions(
        &self,
        descriptor: &ContractDescriptor,
        context: &TransactionContext,
    ) -> Result<Vec<Transaction>>;
}

/// Produces synthetic transactions to run after the main transaction.
///
/// The same self-recursion rule as [`PreExecutionPlugin`] applies.
#[async_trait]
pub trait PostExecutionPlugin: Any + Send + Sync {
    async fn get_post_transactions(
        &self,
        descriptor: &ContractDescriptor,
        context: &TransactionContext,
    ) -> Result<Vec<Transaction>>;
}

fn concrete_type_id(plugin: &dyn Any) -> TypeId {
    plugin.type_id()
}

/// Keep the first-seen instance of each concrete plugin type, in input order.
pub(crate) fn dedup_pre_plugins(
    plugins: Vec<Arc<dyn PreExecutionPlugin>>,
) -> Vec<Arc<dyn PreExecutionPlugin>> {
    let mut seen = HashSet::new();
    plugins
        .into_iter()
        .filter(|plugin| seen.insert(concrete_type_id(plugin.as_ref())))
        .collect()
}

/// Keep the first-seen instance of each concrete plugin type, in input order.
pub(crate) fn dedup_post_plugins(
    plugins: Vec<Arc<dyn PostExecutionPlugin>>,
) -> Vec<Arc<dyn PostExecutionPlugin>> {
    let mut seen = HashSet::new();
    plugins
        .into_iter()
        .filter(|plugin| seen.insert(concrete_type_id(plugin.as_ref())))
        .collect()
}
