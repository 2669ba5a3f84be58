//! Transactions as seen by the executor.
//!
//! The executor treats a transaction as opaque apart from its parties, the
//! method name, and the payload. Content addressing hashes all fields in
//! canonical order for determinism.

use crate::types::{Address, Hash};

/// A transaction to be applied against a contract.
///
/// `from` and `to` are optional at the type level because the executor must
/// reject transactions that arrive without them; use [`Transaction::new`]
/// for well-formed construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub method_name: String,
    pub params: Vec<u8>,
}

impl Transaction {
    pub fn new(
        from: Address,
        to: Address,
        method_name: impl Into<String>,
        params: Vec<u8>,
    ) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            method_name: method_name.into(),
            params,
        }
    }

    /// The content-addressed identifier of this transaction.
    pub fn id(&self) -> Hash {
        let mut hasher = blake3::Hasher::new();
        match &self.from {
            Some(address) => {
                hasher.update(&[1]);
                hasher.update(address.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        match &self.to {
            Some(address) => {
                hasher.update(&[1]);
                hasher.update(address.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        hasher.update(&(self.method_name.len() as u64).to_le_bytes());
        hasher.update(self.method_name.as_bytes());
        hasher.update(&(self.params.len() as u64).to_le_bytes());
        hasher.update(&self.params);
        Hash::new(*hasher.finalize().as_bytes())
    }
}
