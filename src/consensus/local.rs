//! In-process consensus and membership
//!
//! A single ordered log: proposing appends the encoded batch as the next
//! entry, applies it to the engine and then resolves every queued finisher.
//! Used by the CLI (one-member cluster) and by tests to drive role changes,
//! plugging and propose failures.

use super::{CommitHandle, Consensus, Finisher, LogEntry, MemberRole, Membership, PendingTransaction};
use crate::common::{Error, Result};
use crate::service::Request;
use crate::store::{KeyValueDb, Transaction};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct LogState {
    term: u64,
    plugged: bool,
    propose_requested: bool,
    failure: Option<String>,
    finishers: Vec<Finisher>,
    waiting: Vec<Request>,
    log: Vec<LogEntry>,
}

pub struct LocalConsensus {
    db: Arc<dyn KeyValueDb>,
    pending: PendingTransaction,
    state: Mutex<LogState>,
}

impl LocalConsensus {
    pub fn new(db: Arc<dyn KeyValueDb>) -> Self {
        Self {
            db,
            pending: PendingTransaction::new(),
            state: Mutex::new(LogState::default()),
        }
    }

    pub fn term(&self) -> u64 {
        self.lock().term
    }

    /// Start a new term; later entries carry it.
    pub fn set_term(&self, term: u64) {
        self.lock().term = term;
    }

    /// Pause proposals; triggers are remembered until `unplug()`.
    pub fn plug(&self) {
        self.lock().plugged = true;
    }

    pub fn unplug(&self) {
        let run = {
            let mut state = self.lock();
            state.plugged = false;
            std::mem::take(&mut state.propose_requested)
        };
        if run {
            self.propose();
        }
    }

    /// Make every following proposal fail with `reason` (`None` restores commits).
    pub fn set_failure(&self, reason: Option<String>) {
        self.lock().failure = reason;
    }

    /// Committed entries, oldest first
    pub fn log(&self) -> Vec<LogEntry> {
        self.lock().log.clone()
    }

    /// Requests parked by `wait_for_readable`, ready to be dispatched again.
    pub fn take_waiting(&self) -> Vec<Request> {
        std::mem::take(&mut self.lock().waiting)
    }

    /// Apply committed entries, in order, to another engine.
    pub fn replay(entries: &[LogEntry], db: &dyn KeyValueDb) -> Result<()> {
        for entry in entries {
            db.apply(&entry.transaction()?)?;
        }
        Ok(())
    }

    fn propose(&self) {
        let mut state = self.lock();
        let txn = self.pending.take();
        let finishers = std::mem::take(&mut state.finishers);
        if txn.is_empty() && finishers.is_empty() {
            return;
        }

        let outcome = self.commit(&txn, &mut state);
        drop(state);

        match &outcome {
            Ok(()) => tracing::debug!("committed {} op(s), {} finisher(s)", txn.len(), finishers.len()),
            Err(e) => tracing::warn!("proposal of {} op(s) failed: {}", txn.len(), e),
        }
        let reason = outcome.as_ref().err().map(|e| match e {
            Error::ProposalFailed(reason) => reason.clone(),
            other => other.to_string(),
        });
        for finisher in finishers {
            let result = match &reason {
                None => Ok(()),
                Some(reason) => Err(Error::ProposalFailed(reason.clone())),
            };
            // the requester may be gone; the commit stands regardless
            let _ = finisher.send(result);
        }
    }

    fn commit(&self, txn: &Transaction, state: &mut LogState) -> Result<()> {
        if let Some(reason) = &state.failure {
            return Err(Error::ProposalFailed(reason.clone()));
        }
        let entry = LogEntry {
            term: state.term,
            index: state.log.len() as u64 + 1,
            data: txn.encode()?,
        };
        self.db.apply(&entry.transaction()?)?;
        state.log.push(entry);
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Consensus for LocalConsensus {
    fn pending_transaction(&self) -> PendingTransaction {
        self.pending.clone()
    }

    fn queue_pending_finisher(&self) -> CommitHandle {
        let (tx, handle) = CommitHandle::channel();
        self.lock().finishers.push(tx);
        handle
    }

    fn trigger_propose(&self) {
        {
            let mut state = self.lock();
            if state.plugged {
                state.propose_requested = true;
                return;
            }
        }
        self.propose();
    }

    fn is_plugged(&self) -> bool {
        self.lock().plugged
    }

    fn wait_for_readable(&self, request: Request) {
        self.lock().waiting.push(request);
    }
}

/// Membership state of one member
pub struct LocalMembership {
    name: String,
    role: Mutex<MemberRole>,
    forwarded: Mutex<Vec<Request>>,
}

impl LocalMembership {
    pub fn new(name: impl Into<String>, role: MemberRole) -> Self {
        Self {
            name: name.into(),
            role: Mutex::new(role),
            forwarded: Mutex::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_role(&self, role: MemberRole) {
        tracing::info!("{} is now {}", self.name, role);
        *self.role.lock().unwrap_or_else(PoisonError::into_inner) = role;
    }

    /// Requests handed to the leader, oldest first
    pub fn take_forwarded(&self) -> Vec<Request> {
        std::mem::take(&mut *self.forwarded.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Membership for LocalMembership {
    fn role(&self) -> MemberRole {
        *self.role.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn forward_request_leader(&self, request: Request) {
        self.forwarded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
    }
}
