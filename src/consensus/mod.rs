//! Consensus and cluster-membership collaborators
//!
//! The service never orders or replicates anything itself. It stages
//! mutations into the one active [`PendingTransaction`], asks for a
//! [`CommitHandle`] when a reply depends on durability, and calls
//! `trigger_propose()`. Leadership and quorum state come from [`Membership`].

pub mod local;

pub use local::{LocalConsensus, LocalMembership};

use crate::common::{Error, Result};
use crate::service::Request;
use crate::store::Transaction;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

/// Replicated-log collaborator
pub trait Consensus: Send + Sync {
    /// The batch that the next `trigger_propose()` will hand to the log.
    fn pending_transaction(&self) -> PendingTransaction;

    /// Register interest in the outcome of the next proposal.
    fn queue_pending_finisher(&self) -> CommitHandle;

    /// Propose the pending batch and start a fresh one.
    fn trigger_propose(&self);

    /// Are proposals currently paused?
    fn is_plugged(&self) -> bool;

    /// Park `request` until this member can serve reads again.
    ///
    /// Parking is the whole contract: once the member is readable the host
    /// must hand every parked request back to `ConfigKeyService::redispatch`.
    /// Nothing replies to a parked request before that.
    fn wait_for_readable(&self, request: Request);
}

/// Role of this member in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Probing,
    Electing,
    Leader,
    Peon,
}

impl MemberRole {
    /// Leading or following inside an active quorum
    pub fn in_quorum(&self) -> bool {
        matches!(self, MemberRole::Leader | MemberRole::Peon)
    }
}

impl std::fmt::Display for MemberRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberRole::Probing => write!(f, "probing"),
            MemberRole::Electing => write!(f, "electing"),
            MemberRole::Leader => write!(f, "leader"),
            MemberRole::Peon => write!(f, "peon"),
        }
    }
}

/// Cluster-membership collaborator
pub trait Membership: Send + Sync {
    fn role(&self) -> MemberRole;

    fn is_leader(&self) -> bool {
        self.role() == MemberRole::Leader
    }

    fn in_quorum(&self) -> bool {
        self.role().in_quorum()
    }

    /// Hand `request`, unmodified, to the current leader.
    fn forward_request_leader(&self, request: Request);
}

/// Shared handle on the active batch
///
/// Staging is infallible; only the later commit can fail.
#[derive(Debug, Clone, Default)]
pub struct PendingTransaction {
    inner: Arc<Mutex<Transaction>>,
}

impl PendingTransaction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, namespace: &str, key: &str, value: Bytes) {
        self.lock().put(namespace, key, value);
    }

    pub fn erase(&self, namespace: &str, key: &str) {
        self.lock().erase(namespace, key);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take the staged batch, leaving an empty one behind.
    pub fn take(&self) -> Transaction {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Transaction> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Commit outcome of one proposal
pub type CommitResult = Result<()>;

/// Sender half kept by the consensus layer; fires exactly once.
pub type Finisher = oneshot::Sender<CommitResult>;

/// "Commit pending" handle returned to whoever needs the outcome
#[derive(Debug)]
pub struct CommitHandle {
    rx: oneshot::Receiver<CommitResult>,
    outcome: Option<CommitResult>,
}

impl CommitHandle {
    pub fn channel() -> (Finisher, CommitHandle) {
        let (tx, rx) = oneshot::channel();
        (tx, CommitHandle { rx, outcome: None })
    }

    /// Wait for the proposal to commit or fail.
    pub async fn wait(self) -> CommitResult {
        match self.outcome {
            Some(outcome) => outcome,
            None => self.rx.await.map_err(|_| Error::ProposalDropped)?,
        }
    }

    /// Outcome without blocking; `None` while the proposal is in flight.
    ///
    /// The outcome is kept, so a later `wait()` still sees it.
    pub fn try_outcome(&mut self) -> Option<&CommitResult> {
        if self.outcome.is_none() {
            self.outcome = match self.rx.try_recv() {
                Ok(result) => Some(result),
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => Some(Err(Error::ProposalDropped)),
            };
        }
        self.outcome.as_ref()
    }

    pub fn is_resolved(&mut self) -> bool {
        self.try_outcome().is_some()
    }
}

/// Committed log entry carrying one encoded transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub term: u64,
    pub index: u64,
    pub data: Vec<u8>,
}

impl LogEntry {
    pub fn transaction(&self) -> Result<Transaction> {
        Transaction::decode(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_transaction_take() {
        let pending = PendingTransaction::new();
        let alias = pending.clone();
        pending.put("ns", "a", Bytes::from_static(b"1"));
        alias.erase("ns", "b");
        assert_eq!(pending.len(), 2);

        let txn = alias.take();
        assert_eq!(txn.len(), 2);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_commit_handle_outcomes() {
        let (tx, mut handle) = CommitHandle::channel();
        assert!(handle.try_outcome().is_none());
        tx.send(Ok(())).unwrap();
        assert!(matches!(handle.try_outcome(), Some(Ok(()))));
        assert!(handle.is_resolved());
        assert!(tokio_test::block_on(handle.wait()).is_ok());

        let (tx, handle) = CommitHandle::channel();
        drop(tx);
        let result = tokio_test::block_on(handle.wait());
        assert!(matches!(result, Err(Error::ProposalDropped)));
    }

    #[test]
    fn test_roles() {
        assert!(MemberRole::Peon.in_quorum());
        assert!(!MemberRole::Electing.in_quorum());
        assert_eq!(MemberRole::Leader.to_string(), "leader");
    }
}
