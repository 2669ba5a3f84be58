//! Shared test harness: a programmable mock VM and plugin doubles.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use lib_execution::{
    Address, BatchExecutor, BlockHeader, ChainContext, ContractDescriptor, Executive,
    ExecutiveLookupError, ExecutiveService, ExecutorConfig, Hash, InMemoryTransactionResultStore,
    PostExecutionPlugin, PreExecutionPlugin, SingleTransactionExecutor, Transaction,
    TransactionContext, CHARGE_RESOURCE_TOKEN_METHOD, CHARGE_TRANSACTION_FEES_METHOD,
};

pub type ApplyFn = Arc<dyn Fn(&mut TransactionContext) -> Result<(), String> + Send + Sync>;

#[derive(Clone)]
pub enum ContractBehavior {
    /// Run the closure against the context; `Err` is a VM fault.
    Apply(ApplyFn),
    /// Fire the token, then hang until the executor gives up on us.
    CancelThenHang(CancellationToken),
}

/// A contract VM double with per-address programmable behavior and
/// get/put accounting on the executive pool.
pub struct MockVm {
    behaviors: Mutex<HashMap<Address, ContractBehavior>>,
    gets: AtomicUsize,
    puts: AtomicUsize,
}

impl MockVm {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            behaviors: Mutex::new(HashMap::new()),
            gets: AtomicUsize::new(0),
            puts: AtomicUsize::new(0),
        })
    }

    pub fn register<F>(&self, address: Address, behavior: F)
    where
        F: Fn(&mut TransactionContext) -> Result<(), String> + Send + Sync + 'static,
    {
        self.behaviors
            .lock()
            .unwrap()
            .insert(address, ContractBehavior::Apply(Arc::new(behavior)));
    }

    pub fn register_cancel_then_hang(&self, address: Address, token: CancellationToken) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(address, ContractBehavior::CancelThenHang(token));
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

struct MockExecutive {
    descriptor: ContractDescriptor,
    behavior: ContractBehavior,
}

#[async_trait]
impl Executive for MockExecutive {
    fn descriptor(&self) -> &ContractDescriptor {
        &self.descriptor
    }

    async fn apply(&mut self, context: &mut TransactionContext) -> anyhow::Result<()> {
        match &self.behavior {
            ContractBehavior::Apply(apply) => apply(context).map_err(anyhow::Error::msg),
            ContractBehavior::CancelThenHang(token) => {
                token.cancel();
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

#[async_trait]
impl ExecutiveService for MockVm {
    async fn get_executive(
        &self,
        _chain_context: &ChainContext,
        address: &Address,
    ) -> Result<Box<dyn Executive>, ExecutiveLookupError> {
        let behavior = self.behaviors.lock().unwrap().get(address).cloned();
        match behavior {
            Some(behavior) => {
                self.gets.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(MockExecutive {
                    descriptor: ContractDescriptor::default(),
                    behavior,
                }))
            }
            None => Err(ExecutiveLookupError::RegistrationNotFound(*address)),
        }
    }

    async fn put_executive(&self, _address: &Address, _executive: Box<dyn Executive>) {
        self.puts.fetch_add(1, Ordering::SeqCst);
    }
}

/// Whether a transaction is one of the synthetic plugin transactions.
/// Plugins must not emit further synthetic transactions for these.
pub fn is_plugin_transaction(transaction: &Transaction) -> bool {
    matches!(
        transaction.method_name.as_str(),
        CHARGE_TRANSACTION_FEES_METHOD | CHARGE_RESOURCE_TOKEN_METHOD
    )
}

/// Emits a `ChargeTransactionFees` pre-transaction for every user
/// transaction.
pub struct FeePrePlugin {
    pub fee_contract: Address,
    pub payer: Address,
}

#[async_trait]
impl PreExecutionPlugin for FeePrePlugin {
    async fn get_pre_transactions(
        &self,
        _descriptor: &ContractDescriptor,
        context: &TransactionContext,
    ) -> anyhow::Result<Vec<Transaction>> {
        if is_plugin_transaction(&context.transaction) {
            return Ok(vec![]);
        }
        Ok(vec![Transaction::new(
            self.payer,
            self.fee_contract,
            CHARGE_TRANSACTION_FEES_METHOD,
            vec![],
        )])
    }
}

/// Emits a `ChargeResourceToken` post-transaction for every user
/// transaction.
pub struct ResourceTokenPostPlugin {
    pub resource_contract: Address,
    pub payer: Address,
}

#[async_trait]
impl PostExecutionPlugin for ResourceTokenPostPlugin {
    async fn get_post_transactions(
        &self,
        _descriptor: &ContractDescriptor,
        context: &TransactionContext,
    ) -> anyhow::Result<Vec<Transaction>> {
        if is_plugin_transaction(&context.transaction) {
            return Ok(vec![]);
        }
        Ok(vec![Transaction::new(
            self.payer,
            self.resource_contract,
            CHARGE_RESOURCE_TOKEN_METHOD,
            vec![],
        )])
    }
}

pub type InvocationLog = Arc<Mutex<Vec<String>>>;

/// Records its tag on every invocation, emits nothing.
pub struct RecordingPluginX {
    pub tag: &'static str,
    pub log: InvocationLog,
}

#[async_trait]
impl PreExecutionPlugin for RecordingPluginX {
    async fn get_pre_transactions(
        &self,
        _descriptor: &ContractDescriptor,
        _context: &TransactionContext,
    ) -> anyhow::Result<Vec<Transaction>> {
        self.log.lock().unwrap().push(self.tag.to_string());
        Ok(vec![])
    }
}

/// A second plugin type for type-based deduplication tests.
pub struct RecordingPluginY {
    pub tag: &'static str,
    pub log: InvocationLog,
}

#[async_trait]
impl PreExecutionPlugin for RecordingPluginY {
    async fn get_pre_transactions(
        &self,
        _descriptor: &ContractDescriptor,
        _context: &TransactionContext,
    ) -> anyhow::Result<Vec<Transaction>> {
        self.log.lock().unwrap().push(self.tag.to_string());
        Ok(vec![])
    }
}

pub fn addr(byte: u8) -> Address {
    Address::new([byte; 32])
}

pub fn test_header(height: u64) -> BlockHeader {
    BlockHeader {
        previous_block_hash: Hash::new([9u8; 32]),
        height,
        time: 1_700_000_000 + height,
    }
}

pub fn create_single_executor(
    vm: Arc<MockVm>,
    pre_plugins: Vec<Arc<dyn PreExecutionPlugin>>,
    post_plugins: Vec<Arc<dyn PostExecutionPlugin>>,
) -> SingleTransactionExecutor {
    SingleTransactionExecutor::new(vm, pre_plugins, post_plugins, ExecutorConfig::default())
}

pub fn create_batch_executor(
    vm: Arc<MockVm>,
    pre_plugins: Vec<Arc<dyn PreExecutionPlugin>>,
    post_plugins: Vec<Arc<dyn PostExecutionPlugin>>,
) -> (BatchExecutor, Arc<InMemoryTransactionResultStore>) {
    let single = Arc::new(create_single_executor(vm, pre_plugins, post_plugins));
    let store = Arc::new(InMemoryTransactionResultStore::new());
    let executor = BatchExecutor::new(single, store.clone());
    (executor, store)
}
