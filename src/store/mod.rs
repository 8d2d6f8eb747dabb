//! Storage layer
//!
//! `KeyValueDb` is the contract of the ordered key/value engine shared by every
//! service living in the same replicated store. Keys are scoped by a namespace
//! string; a `Transaction` batches puts and erases across namespaces and is
//! applied atomically once consensus commits it.

pub mod memory;
pub mod namespace;
pub mod rocks;

pub use memory::MemStore;
pub use namespace::{ConfigKeyStore, CONFIG_KEY_NAMESPACE};
pub use rocks::RocksStore;

use crate::common::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Ordered `(key, value)` sequence over one namespace
pub type KvIter<'a> = Box<dyn Iterator<Item = Result<(String, Bytes)>> + 'a>;

/// Ordered key/value engine
pub trait KeyValueDb: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Bytes>>;

    fn exists(&self, namespace: &str, key: &str) -> Result<bool> {
        Ok(self.get(namespace, key)?.is_some())
    }

    /// Iterate `namespace` in key order, starting at the first key >= `lower_bound`.
    ///
    /// Each call opens a fresh iterator; the sequence is finite.
    fn iter<'a>(&'a self, namespace: &str, lower_bound: Option<&str>) -> Result<KvIter<'a>>;

    /// Apply every operation of `txn` atomically.
    fn apply(&self, txn: &Transaction) -> Result<()>;
}

/// One staged mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnOp {
    Put {
        namespace: String,
        key: String,
        value: Bytes,
    },
    Erase {
        namespace: String,
        key: String,
    },
}

/// Write-only batch of mutations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    ops: Vec<TxnOp>,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, namespace: &str, key: &str, value: Bytes) {
        self.ops.push(TxnOp::Put {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value,
        });
    }

    pub fn erase(&mut self, namespace: &str, key: &str) {
        self.ops.push(TxnOp::Erase {
            namespace: namespace.to_string(),
            key: key.to_string(),
        });
    }

    pub fn ops(&self) -> &[TxnOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Encode for transport inside a log entry
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(data)?)
    }
}
