//! Namespace-scoped view of the engine used by the config-key service
//!
//! Callers never see the namespace; every read goes to committed state and
//! every write is staged into a pending transaction.

use super::{KeyValueDb, KvIter};
use crate::common::{printable_value, Error, Result};
use crate::consensus::PendingTransaction;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Namespace holding every config-key entry
pub const CONFIG_KEY_NAMESPACE: &str = "mon_config_key";

#[derive(Clone)]
pub struct ConfigKeyStore {
    db: Arc<dyn KeyValueDb>,
}

impl ConfigKeyStore {
    pub fn new(db: Arc<dyn KeyValueDb>) -> Self {
        Self { db }
    }

    pub fn get(&self, key: &str) -> Result<Bytes> {
        self.db
            .get(CONFIG_KEY_NAMESPACE, key)?
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }

    pub fn exists(&self, key: &str) -> Result<bool> {
        self.db.exists(CONFIG_KEY_NAMESPACE, key)
    }

    /// Entries in key order, from the first key >= `lower_bound`
    pub fn iter(&self, lower_bound: Option<&str>) -> Result<KvIter<'_>> {
        self.db.iter(CONFIG_KEY_NAMESPACE, lower_bound)
    }

    /// Entries whose key starts with `prefix`, in key order
    fn scan_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> Result<impl Iterator<Item = Result<(String, Bytes)>> + 'a> {
        let iter = self.iter(Some(prefix))?;
        Ok(iter.take_while(move |item| match item {
            Ok((key, _)) => key.starts_with(prefix),
            Err(_) => true,
        }))
    }

    /// Does any stored key start with `prefix`?
    pub fn has_prefix(&self, prefix: &str) -> Result<bool> {
        match self.scan_prefix(prefix)?.next() {
            Some(item) => item.map(|_| true),
            None => Ok(false),
        }
    }

    pub fn put(&self, txn: &PendingTransaction, key: &str, value: Bytes) {
        txn.put(CONFIG_KEY_NAMESPACE, key, value);
    }

    pub fn erase(&self, txn: &PendingTransaction, key: &str) {
        txn.erase(CONFIG_KEY_NAMESPACE, key);
    }

    /// Stage an erase for every key currently stored under `prefix`.
    ///
    /// Returns the number of erases staged.
    pub fn delete_prefix(&self, txn: &PendingTransaction, prefix: &str) -> Result<usize> {
        let mut staged = 0;
        for item in self.scan_prefix(prefix)? {
            let (key, _) = item?;
            self.erase(txn, &key);
            staged += 1;
        }
        Ok(staged)
    }

    /// Every key, in order
    pub fn list(&self) -> Result<Vec<String>> {
        self.iter(None)?
            .map(|item| item.map(|(key, _)| key))
            .collect()
    }

    /// `key -> value` for keys under `prefix` (all keys when empty).
    ///
    /// Binary values are replaced by a length placeholder.
    pub fn dump(&self, prefix: &str) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        for item in self.scan_prefix(prefix)? {
            let (key, value) = item?;
            out.insert(key, Value::String(printable_value(&value)));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemStore, Transaction};

    fn store_with(entries: &[(&str, &[u8])]) -> (Arc<MemStore>, ConfigKeyStore) {
        let db = Arc::new(MemStore::new());
        let mut txn = Transaction::new();
        for (k, v) in entries {
            txn.put(CONFIG_KEY_NAMESPACE, k, Bytes::copy_from_slice(v));
        }
        db.apply(&txn).unwrap();
        (db.clone(), ConfigKeyStore::new(db))
    }

    #[test]
    fn test_get_missing() {
        let (_, store) = store_with(&[]);
        assert!(matches!(store.get("nope"), Err(Error::NotFound(_))));
        assert!(!store.exists("nope").unwrap());
    }

    #[test]
    fn test_has_prefix() {
        let (_, store) = store_with(&[
            ("daemon-private/osd.70/x", b"a"),
            ("daemon-private/osd.7/key", b"b"),
        ]);
        assert!(store.has_prefix("daemon-private/osd.7/").unwrap());
        assert!(store.has_prefix("daemon-private/osd.70/").unwrap());
        assert!(!store.has_prefix("daemon-private/osd.8/").unwrap());
        assert!(!store.has_prefix("zzz").unwrap());
    }

    #[test]
    fn test_delete_prefix_stages_only_matches() {
        let (db, store) = store_with(&[
            ("a", b"1"),
            ("p/1", b"2"),
            ("p/2", b"3"),
            ("q", b"4"),
        ]);
        let txn = PendingTransaction::new();
        assert_eq!(store.delete_prefix(&txn, "p/").unwrap(), 2);
        // staged only
        assert!(store.has_prefix("p/").unwrap());

        db.apply(&txn.take()).unwrap();
        assert!(!store.has_prefix("p/").unwrap());
        assert_eq!(store.list().unwrap(), vec!["a", "q"]);
    }

    #[test]
    fn test_dump_prefix_and_binary() {
        let (_, store) = store_with(&[
            ("bin", &[0x00, 0x01]),
            ("txt", b"hello\n"),
            ("x/1", b"one"),
        ]);
        let all = store.dump("").unwrap();
        assert_eq!(all["bin"], "<<< binary blob of length 2 >>>");
        assert_eq!(all["txt"], "hello\n");
        assert_eq!(all.len(), 3);

        let scoped = store.dump("x/").unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped["x/1"], "one");
    }
}
