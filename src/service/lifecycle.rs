//! Member lifecycle: destroy and secret creation
//!
//! Each member owns two key families: `dm-crypt/osd/<uuid>/` for its disk
//! encryption secret and `daemon-private/osd.<id>/` for private daemon state.

use super::ConfigKeyService;
use crate::common::{Error, Result};
use bytes::Bytes;
use uuid::Uuid;

/// Key under which a member's encryption secret lives
const SECRET_KEY_NAME: &str = "luks";

pub fn dmcrypt_prefix(uuid: &Uuid, suffix: &str) -> String {
    format!("dm-crypt/osd/{}/{}", uuid, suffix)
}

pub fn daemon_private_prefix(id: i32) -> String {
    format!("daemon-private/osd.{}/", id)
}

/// Outcome of a successful secret validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretCheck {
    /// No secret stored yet; go ahead and create it
    Create,
    /// The identical secret is already stored; nothing to propose
    Idempotent,
}

impl ConfigKeyService {
    /// Succeeds only if some key exists under either of the member's families.
    pub fn validate_destroy(&self, id: i32, uuid: &Uuid) -> Result<()> {
        let dmcrypt = dmcrypt_prefix(uuid, "");
        let daemon = daemon_private_prefix(id);

        if !self.store.has_prefix(&dmcrypt)? && !self.store.has_prefix(&daemon)? {
            return Err(Error::NotFound(format!("no config-key state for osd.{}", id)));
        }
        Ok(())
    }

    /// Stage deletion of both key families and propose them together.
    pub fn perform_destroy(&self, id: i32, uuid: &Uuid) -> Result<()> {
        let txn = self.consensus.pending_transaction();
        let mut erased = 0;
        for prefix in [dmcrypt_prefix(uuid, ""), daemon_private_prefix(id)] {
            erased += self.store.delete_prefix(&txn, &prefix)?;
        }
        tracing::info!("destroying osd.{} ({}): {} key(s)", id, uuid, erased);

        self.consensus.trigger_propose();
        Ok(())
    }

    /// Check a proposed secret against the stored one; secrets are never replaced.
    pub fn validate_create_secret(&self, uuid: &Uuid, secret: &str) -> Result<SecretCheck> {
        let key = dmcrypt_prefix(uuid, SECRET_KEY_NAME);
        if !self.store.exists(&key)? {
            return Ok(SecretCheck::Create);
        }

        let existing = self.store.get(&key).map_err(|e| {
            tracing::debug!("unable to get dm-crypt key from store: {}", e);
            e
        })?;
        if existing == secret.as_bytes() {
            return Ok(SecretCheck::Idempotent);
        }
        Err(Error::AlreadyExists(
            "dm-crypt key already exists and does not match".into(),
        ))
    }

    /// Stage the member's secret into a plugged multi-step transaction.
    ///
    /// Does not propose; whoever plugged the consensus layer proposes the
    /// whole batch.
    pub fn perform_create_secret(&self, uuid: &Uuid, secret: &str) -> Result<()> {
        if !self.consensus.is_plugged() {
            return Err(Error::NotPlugged);
        }
        let txn = self.consensus.pending_transaction();
        self.store.put(
            &txn,
            &dmcrypt_prefix(uuid, SECRET_KEY_NAME),
            Bytes::copy_from_slice(secret.as_bytes()),
        );
        Ok(())
    }
}
