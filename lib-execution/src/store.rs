//! Transaction result persistence seam.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::results::TransactionResult;
use crate::types::{BlockHeader, Hash};

/// Receives the synthesized results of an executed batch.
#[async_trait]
pub trait TransactionResultStore: Send + Sync {
    async fn add_transaction_results(
        &self,
        results: &[TransactionResult],
        block_header: &BlockHeader,
    ) -> Result<()>;
}

/// An in-memory result store, keyed by block.
#[derive(Default)]
pub struct InMemoryTransactionResultStore {
    blocks: Mutex<Vec<(BlockHeader, Vec<TransactionResult>)>>,
}

impl InMemoryTransactionResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All results recorded for a block height, in execution order.
    pub async fn results_at_height(&self, height: u64) -> Vec<TransactionResult> {
        self.blocks
            .lock()
            .await
            .iter()
            .filter(|(header, _)| header.height == height)
            .flat_map(|(_, results)| results.clone())
            .collect()
    }

    /// Look up a single result by transaction id.
    pub async fn get_result(&self, transaction_id: &Hash) -> Option<TransactionResult> {
        self.blocks
            .lock()
            .await
            .iter()
            .flat_map(|(_, results)| results.iter())
            .find(|result| result.transaction_id == *transaction_id)
            .cloned()
    }
}

#[async_trait]
impl TransactionResultStore for InMemoryTransactionResultStore {
    async fn add_transaction_results(
        &self,
        results: &[TransactionResult],
        block_header: &BlockHeader,
    ) -> Result<()> {
        self.blocks
            .lock()
            .await
            .push((block_header.clone(), results.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::TransactionResultStatus;
    use crate::types::Bloom;

    fn create_test_result(id_byte: u8) -> TransactionResult {
        TransactionResult {
            transaction_id: Hash::new([id_byte; 32]),
            status: TransactionResultStatus::Mined,
            block_height: 3,
            return_value: vec![],
            bloom: Bloom::new(),
            logs: vec![],
            error: String::new(),
            transaction_fee: None,
            consumed_resource_tokens: None,
        }
    }

    #[tokio::test]
    async fn test_results_are_stored_per_block() {
        let store = InMemoryTransactionResultStore::new();
        let header = BlockHeader {
            previous_block_hash: Hash::default(),
            height: 3,
            time: 1000,
        };

        store
            .add_transaction_results(&[create_test_result(1), create_test_result(2)], &header)
            .await
            .unwrap();

        assert_eq!(store.results_at_height(3).await.len(), 2);
        assert!(store.results_at_height(4).await.is_empty());
        assert!(store.get_result(&Hash::new([1u8; 32])).await.is_some());
        assert!(store.get_result(&Hash::new([9u8; 32])).await.is_none());
    }
}
