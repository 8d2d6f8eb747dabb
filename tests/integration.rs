//! Integration tests for configkey over the RocksDB engine

use configkey::common::errno;
use configkey::service::lifecycle::daemon_private_prefix;
use configkey::{
    ConfigKeyService, Dispatched, LocalConsensus, LocalMembership, MemberRole, Reply, Request,
    RocksStore, ServiceConfig,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

fn open(path: &Path) -> (Arc<LocalConsensus>, ConfigKeyService) {
    let db = Arc::new(RocksStore::open(path).unwrap());
    let consensus = Arc::new(LocalConsensus::new(db.clone()));
    let membership = Arc::new(LocalMembership::new("mon.a", MemberRole::Leader));
    let service = ConfigKeyService::new(ServiceConfig::default(), db, consensus.clone(), membership);
    (consensus, service)
}

fn request(prefix: &str, key: &str) -> Request {
    Request::client(json!({ "prefix": prefix, "key": key }).to_string())
}

async fn answer(service: &ConfigKeyService, request: Request) -> Reply {
    match service.dispatch(request) {
        Dispatched::Reply(reply) => reply,
        Dispatched::Deferred(deferred) => deferred.resolve().await.unwrap(),
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_values_round_trip_byte_exact() {
    let dir = TempDir::new().unwrap();
    let (_, service) = open(&dir.path().join("db"));

    let values: Vec<Vec<u8>> = vec![
        b"plain".to_vec(),
        b"line one\nline two\n".to_vec(),
        vec![0x00, 0x01, 0x1b, 0x7f, 0xff],
        Vec::new(),
    ];
    for (i, value) in values.iter().enumerate() {
        let key = format!("k{}", i);
        let put = request("config-key put", &key).with_data(value.clone());
        assert!(answer(&service, put).await.is_success());

        let got = answer(&service, request("config-key get", &key)).await;
        assert!(got.is_success());
        assert_eq!(&got.data[..], &value[..]);
    }
}

#[tokio::test]
async fn test_unwritten_key_is_absent() {
    let dir = TempDir::new().unwrap();
    let (_, service) = open(&dir.path().join("db"));

    let exists = answer(&service, request("config-key exists", "never")).await;
    assert_eq!(exists.status, -errno::ENOENT);
    let get = answer(&service, request("config-key get", "never")).await;
    assert_eq!(get.status, -errno::ENOENT);
    assert!(!service.store().exists("never").unwrap());
}

#[tokio::test]
async fn test_delete_absent_key_leaves_store_unchanged() {
    let dir = TempDir::new().unwrap();
    let (consensus, service) = open(&dir.path().join("db"));
    let put = Request::client(
        json!({ "prefix": "config-key set", "key": "a", "val": "1" }).to_string(),
    );
    answer(&service, put).await;
    let before = answer(&service, request("config-key dump", "")).await;

    let reply = answer(&service, request("config-key del", "missing")).await;
    assert_eq!(reply, Reply::ok("no such key 'missing'"));

    let after = answer(&service, request("config-key dump", "")).await;
    assert_eq!(before.data, after.data);
    assert_eq!(consensus.log().len(), 1);
}

#[tokio::test]
async fn test_dump_placeholder_for_binary() {
    let dir = TempDir::new().unwrap();
    let (_, service) = open(&dir.path().join("db"));
    answer(
        &service,
        request("config-key put", "bin").with_data(vec![0x00, 0x01]),
    )
    .await;
    answer(
        &service,
        request("config-key put", "txt").with_data(&b"hello\n"[..]),
    )
    .await;

    let dump = answer(&service, request("config-key dump", "")).await;
    let dumped: serde_json::Value = serde_json::from_slice(&dump.data).unwrap();
    assert_eq!(dumped["bin"], "<<< binary blob of length 2 >>>");
    assert_eq!(dumped["txt"], "hello\n");
}

#[tokio::test]
async fn test_destroy_removes_member_keys_and_persists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let uuid = Uuid::new_v4();
    let daemon = daemon_private_prefix(7);
    {
        let (_, service) = open(&path);
        for key in [
            format!("dm-crypt/osd/{}/luks", uuid),
            format!("{}keyring", daemon),
            "daemon-private/osd.8/keyring".to_string(),
        ] {
            answer(&service, request("config-key put", &key).with_data(&b"x"[..])).await;
        }
        assert!(service.store().has_prefix(&daemon).unwrap());

        service.validate_destroy(7, &uuid).unwrap();
        service.perform_destroy(7, &uuid).unwrap();
        assert!(!service.store().has_prefix(&daemon).unwrap());
    }

    let (_, service) = open(&path);
    let listed = answer(&service, request("config-key list", "")).await;
    let keys: Vec<String> = serde_json::from_slice(&listed.data).unwrap();
    assert_eq!(keys, vec!["daemon-private/osd.8/keyring"]);
}
