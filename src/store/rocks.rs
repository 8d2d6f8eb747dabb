//! RocksDB engine
//!
//! Every namespace shares the default column family; a stored key is
//! `namespace \0 key`, so one namespace forms a contiguous key range.

use super::{KeyValueDb, KvIter, Transaction, TxnOp};
use crate::common::utils::prefix_end;
use crate::common::{Error, Result};
use bytes::Bytes;
use rocksdb::{Direction, IteratorMode, Options, ReadOptions, WriteBatch, DB};
use std::path::Path;

const SEPARATOR: u8 = 0;

fn composite_key(namespace: &str, key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(namespace.len() + 1 + key.len());
    out.extend_from_slice(namespace.as_bytes());
    out.push(SEPARATOR);
    out.extend_from_slice(key.as_bytes());
    out
}

pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create the store
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db })
    }

    /// Flush to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl KeyValueDb for RocksStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<Bytes>> {
        Ok(self
            .db
            .get(composite_key(namespace, key))?
            .map(Bytes::from))
    }

    fn iter<'a>(&'a self, namespace: &str, lower_bound: Option<&str>) -> Result<KvIter<'a>> {
        let range_start = composite_key(namespace, "");
        let seek = composite_key(namespace, lower_bound.unwrap_or(""));
        let mut readopts = ReadOptions::default();
        if let Some(end) = prefix_end(&range_start) {
            readopts.set_iterate_upper_bound(end);
        }

        let skip = range_start.len();
        let iter = self
            .db
            .iterator_opt(IteratorMode::From(&seek, Direction::Forward), readopts)
            .map(move |item| -> Result<(String, Bytes)> {
                let (raw_key, value) = item?;
                let key = std::str::from_utf8(&raw_key[skip..])
                    .map_err(|_| Error::Corrupted("key is not valid UTF-8".into()))?
                    .to_string();
                Ok((key, Bytes::from(value.into_vec())))
            });
        Ok(Box::new(iter))
    }

    fn apply(&self, txn: &Transaction) -> Result<()> {
        let mut batch = WriteBatch::default();
        for op in txn.ops() {
            match op {
                TxnOp::Put {
                    namespace,
                    key,
                    value,
                } => batch.put(composite_key(namespace, key), value),
                TxnOp::Erase { namespace, key } => batch.delete(composite_key(namespace, key)),
            }
        }
        self.db.write(batch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_rocks_store() {
        let dir = tempdir().unwrap();
        let store = RocksStore::open(dir.path().join("test.db")).unwrap();

        let mut txn = Transaction::new();
        txn.put("config_key", "a/1", Bytes::from_static(b"one"));
        txn.put("config_key", "a/2", Bytes::from_static(&[0, 0xff]));
        txn.put("config_key", "b", Bytes::from_static(b"bee"));
        txn.put("config_keyz", "a/0", Bytes::from_static(b"neighbour"));
        store.apply(&txn).unwrap();

        assert_eq!(store.get("config_key", "a/2").unwrap().unwrap(), &[0, 0xff][..]);
        assert!(store.get("config_key", "a/0").unwrap().is_none());

        let keys: Vec<String> = store
            .iter("config_key", None)
            .unwrap()
            .map(|kv| kv.unwrap().0)
            .collect();
        assert_eq!(keys, vec!["a/1", "a/2", "b"]);

        let from_b: Vec<String> = store
            .iter("config_key", Some("a/3"))
            .unwrap()
            .map(|kv| kv.unwrap().0)
            .collect();
        assert_eq!(from_b, vec!["b"]);
    }

    #[test]
    fn test_rocks_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let store = RocksStore::open(&path).unwrap();
            let mut txn = Transaction::new();
            txn.put("config_key", "k", Bytes::from_static(b"v"));
            txn.erase("config_key", "missing");
            store.apply(&txn).unwrap();
            store.flush().unwrap();
        }

        let store = RocksStore::open(&path).unwrap();
        assert!(store.exists("config_key", "k").unwrap());
    }
}
