//! In-memory ordered engine

use super::{KeyValueDb, KvIter, Transaction, TxnOp};
use crate::common::Result;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, PoisonError, RwLock};

type Namespace = BTreeMap<String, Bytes>;
type Namespaces = BTreeMap<String, Arc<Namespace>>;

/// In-memory store, ordered per namespace
///
/// Namespaces are copy-on-write, so an iterator holds a consistent view
/// without keeping the lock or copying entries up front.
#[derive(Default)]
pub struct MemStore {
    map: RwLock<Namespaces>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys held in `namespace`
    pub fn len(&self, namespace: &str) -> usize {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        map.get(namespace).map_or(0, |ns| ns.len())
    }
}

/// Walks one namespace snapshot, seeking past the last key it returned.
struct SnapshotIter {
    ns: Arc<Namespace>,
    cursor: Bound<String>,
}

impl Iterator for SnapshotIter {
    type Item = Result<(String, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        let lower = self.cursor.as_ref().map(String::as_str);
        let (key, value) = self
            .ns
            .range::<str, _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.clone(), v.clone()))?;
        self.cursor = Bound::Excluded(key.clone());
        Some(Ok((key, value)))
    }
}

impl KeyValueDb for MemStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Bytes>> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    fn iter<'a>(&'a self, namespace: &str, lower_bound: Option<&str>) -> Result<KvIter<'a>> {
        let map = self.map.read().unwrap_or_else(PoisonError::into_inner);
        let Some(ns) = map.get(namespace) else {
            return Ok(Box::new(std::iter::empty::<Result<(String, Bytes)>>()));
        };
        let cursor = match lower_bound {
            Some(lower) => Bound::Included(lower.to_string()),
            None => Bound::Unbounded,
        };
        Ok(Box::new(SnapshotIter {
            ns: Arc::clone(ns),
            cursor,
        }))
    }

    fn apply(&self, txn: &Transaction) -> Result<()> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        for op in txn.ops() {
            match op {
                TxnOp::Put {
                    namespace,
                    key,
                    value,
                } => {
                    Arc::make_mut(map.entry(namespace.clone()).or_default())
                        .insert(key.clone(), value.clone());
                }
                TxnOp::Erase { namespace, key } => {
                    if let Some(ns) = map.get_mut(namespace) {
                        Arc::make_mut(ns).remove(key);
                    }
                }
            }
        }
        Ok(())
    }
}
