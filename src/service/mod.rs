//! The config-key service
//!
//! Reads (`get`, `exists`, `list`, `dump`) are answered from committed state.
//! Writes (`put`/`set`, `del`/`rm`) are only accepted on the leader; followers
//! forward them verbatim. On the leader a write is staged into the pending
//! transaction and the reply is deferred until the proposal commits.
//!
//! ```text
//! RECEIVED ──not in quorum──────────────▶ Parked
//!    │
//!    ├──read verb───────────────────────▶ Reply (sync)
//!    ├──write verb, not leader──────────▶ Forwarded
//!    └──write verb, leader──────────────▶ Deferred (reply after commit)
//! ```

pub mod command;
pub mod lifecycle;
pub mod tick;

pub use command::{CommandMap, Reply, Request, RequestSource, Verb};
pub use lifecycle::SecretCheck;

use crate::common::{Error, Result, ServiceConfig};
use crate::consensus::{CommitHandle, Consensus, Membership, PendingTransaction};
use crate::store::{ConfigKeyStore, KeyValueDb, CONFIG_KEY_NAMESPACE};
use bytes::Bytes;
use std::collections::BTreeSet;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// Service name used in logs
pub const SERVICE_NAME: &str = "config_key";

/// What happened to a dispatched request
#[derive(Debug)]
pub enum Dispatched {
    /// Not in quorum; parked until the member can serve again
    Parked,
    /// Write handed to the leader unmodified
    Forwarded,
    /// Command map could not be decoded; no reply
    Dropped,
    /// Synchronous answer
    Reply(Reply),
    /// Peer-originated request handled; peers get no reply frame
    Silent { status: i32 },
    /// Write staged and proposed; reply once committed
    Deferred(DeferredReply),
}

impl Dispatched {
    /// Why a client got no answer from this member, if it got none.
    pub fn unanswered_error(&self) -> Option<Error> {
        match self {
            Dispatched::Parked => Some(Error::NotQuorate),
            Dispatched::Forwarded => Some(Error::NotLeader),
            Dispatched::Dropped => Some(Error::MalformedCommand(
                "command map could not be decoded".into(),
            )),
            _ => None,
        }
    }
}

/// Reply that becomes available once its proposal commits
#[derive(Debug)]
pub struct DeferredReply {
    commit: CommitHandle,
    reply: Reply,
    source: RequestSource,
}

impl DeferredReply {
    /// Has the proposal carrying this write committed or failed yet?
    pub fn is_resolved(&mut self) -> bool {
        self.commit.is_resolved()
    }

    /// Wait for the commit outcome.
    ///
    /// Returns `None` for peer-originated requests.
    pub async fn resolve(self) -> Option<Reply> {
        let outcome = self.commit.wait().await;
        if self.source.is_peer() {
            return None;
        }
        Some(match outcome {
            Ok(()) => self.reply,
            Err(e) => Reply::error(e.errno(), e.to_string()),
        })
    }
}

enum Handled {
    Reply(Reply),
    Forwarded,
    Deferred { commit: CommitHandle, reply: Reply },
}

pub struct ConfigKeyService {
    config: ServiceConfig,
    store: ConfigKeyStore,
    consensus: Arc<dyn Consensus>,
    membership: Arc<dyn Membership>,
    epoch: AtomicU64,
    tick_period: Mutex<f64>,
    tick_task: Mutex<Option<JoinHandle<()>>>,
    ticks: AtomicU64,
}

impl ConfigKeyService {
    pub fn new(
        config: ServiceConfig,
        db: Arc<dyn KeyValueDb>,
        consensus: Arc<dyn Consensus>,
        membership: Arc<dyn Membership>,
    ) -> Self {
        let tick_period = config.tick_interval;
        Self {
            config,
            store: ConfigKeyStore::new(db),
            consensus,
            membership,
            epoch: AtomicU64::new(0),
            tick_period: Mutex::new(tick_period),
            tick_task: Mutex::new(None),
            ticks: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        SERVICE_NAME
    }

    /// Namespaces owned by this service in the shared store
    pub fn store_prefixes(&self) -> BTreeSet<String> {
        BTreeSet::from([CONFIG_KEY_NAMESPACE.to_string()])
    }

    pub fn store(&self) -> &ConfigKeyStore {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Decode `request`, gate it on quorum and leadership, and run it.
    pub fn dispatch(&self, request: Request) -> Dispatched {
        let role = self.membership.role();
        tracing::debug!(
            "{}({}) [{}] dispatch {}",
            SERVICE_NAME,
            self.epoch(),
            role,
            request.command
        );

        if !role.in_quorum() {
            tracing::info!("{} not in quorum -- waiting", SERVICE_NAME);
            self.consensus.wait_for_readable(request);
            return Dispatched::Parked;
        }

        let cmd = match CommandMap::parse(&request.command) {
            Ok(cmd) => cmd,
            Err(e) => {
                tracing::warn!("dropping request from {:?}: {}", request.source, e);
                return Dispatched::Dropped;
            }
        };

        let source = request.source.clone();
        let handled = match cmd.verb() {
            Ok(Verb::Get) => Handled::Reply(self.handle_get(&cmd.key)),
            Ok(Verb::Exists) => Handled::Reply(self.handle_exists(&cmd.key)),
            Ok(Verb::List) => Handled::Reply(self.handle_list()),
            Ok(Verb::Dump) => Handled::Reply(self.handle_dump(&cmd.key)),
            Ok(Verb::Put) => self.handle_put(&cmd, request),
            Ok(Verb::Delete) => self.handle_delete(&cmd.key, request),
            Err(e) => Handled::Reply(Reply::error(e.errno(), e.to_string())),
        };

        match handled {
            Handled::Forwarded => Dispatched::Forwarded,
            Handled::Reply(reply) if source.is_peer() => Dispatched::Silent {
                status: reply.status,
            },
            Handled::Reply(reply) => Dispatched::Reply(reply),
            Handled::Deferred { commit, reply } => Dispatched::Deferred(DeferredReply {
                commit,
                reply,
                source,
            }),
        }
    }

    fn handle_get(&self, key: &str) -> Reply {
        match self.store.get(key) {
            Ok(value) => Reply::ok(format!("obtained '{}'", key)).with_data(value),
            Err(e) => Reply::error(e.errno(), format!("error obtaining '{}': {}", key, e)),
        }
    }

    fn handle_exists(&self, key: &str) -> Reply {
        match self.store.exists(key) {
            Ok(true) => Reply::ok(format!("key '{}' exists", key)),
            Ok(false) => Reply::error(
                Error::NotFound(key.to_string()).errno(),
                format!("key '{}' doesn't exist", key),
            ),
            Err(e) => Reply::error(e.errno(), e.to_string()),
        }
    }

    fn handle_list(&self) -> Reply {
        let listed = self
            .store
            .list()
            .and_then(|keys| Ok(serde_json::to_vec_pretty(&keys)?));
        match listed {
            Ok(json) => Reply::ok("").with_data(json),
            Err(e) => Reply::error(e.errno(), e.to_string()),
        }
    }

    fn handle_dump(&self, prefix: &str) -> Reply {
        tracing::debug!("dump prefix '{}'", prefix);
        let dumped = self
            .store
            .dump(prefix)
            .and_then(|map| Ok(serde_json::to_vec_pretty(&serde_json::Value::Object(map))?));
        match dumped {
            Ok(json) => Reply::ok("").with_data(json),
            Err(e) => Reply::error(e.errno(), e.to_string()),
        }
    }

    fn handle_put(&self, cmd: &CommandMap, request: Request) -> Handled {
        let value = match &cmd.val {
            Some(val) => {
                if !request.data.is_empty() && request.data != val.as_bytes() {
                    tracing::warn!(
                        "put '{}': using inline value, ignoring attached payload of {} bytes",
                        cmd.key,
                        request.data.len()
                    );
                }
                Bytes::copy_from_slice(val.as_bytes())
            }
            None => request.data.clone(),
        };

        let limit = self.config.max_entry_size;
        if value.len() > limit {
            let err = Error::TooLarge {
                size: value.len(),
                limit,
            };
            return Handled::Reply(Reply::error(
                err.errno(),
                format!(
                    "error: entry size limited to {} bytes. \
                     Use 'max_entry_size' to manually adjust",
                    limit
                ),
            ));
        }

        if !self.membership.is_leader() {
            self.membership.forward_request_leader(request);
            return Handled::Forwarded;
        }

        let commit = self.propose_with(|txn| self.store.put(txn, &cmd.key, value));
        Handled::Deferred {
            commit,
            reply: Reply::ok(format!("set {}", cmd.key)),
        }
    }

    fn handle_delete(&self, key: &str, request: Request) -> Handled {
        if !self.membership.is_leader() {
            self.membership.forward_request_leader(request);
            return Handled::Forwarded;
        }

        match self.store.exists(key) {
            Ok(true) => {}
            Ok(false) => return Handled::Reply(Reply::ok(format!("no such key '{}'", key))),
            Err(e) => return Handled::Reply(Reply::error(e.errno(), e.to_string())),
        }

        let commit = self.propose_with(|txn| self.store.erase(txn, key));
        Handled::Deferred {
            commit,
            reply: Reply::ok("key deleted"),
        }
    }

    /// Stage into the pending transaction, register for its commit, propose.
    fn propose_with(&self, stage: impl FnOnce(&PendingTransaction)) -> CommitHandle {
        let txn = self.consensus.pending_transaction();
        stage(&txn);
        let commit = self.consensus.queue_pending_finisher();
        self.consensus.trigger_propose();
        commit
    }

    /// Dispatch requests parked while out of quorum, in arrival order.
    pub fn redispatch(&self, parked: impl IntoIterator<Item = Request>) -> Vec<Dispatched> {
        parked
            .into_iter()
            .map(|request| {
                tracing::debug!("{} retrying parked request", SERVICE_NAME);
                self.dispatch(request)
            })
            .collect()
    }

    /// Read a value from committed state.
    pub fn get(&self, key: &str) -> Result<Bytes> {
        self.store.get(key)
    }
}
