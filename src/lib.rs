//! # configkey
//!
//! A configuration key/value service that lives inside a replicated
//! state-machine cluster:
//! - Reads are served from committed state on any member in quorum
//! - Writes are accepted on the leader only and replied to once committed
//! - Followers forward writes to the leader unmodified
//! - Member destroy/create logic batches its key changes into one proposal
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │            ConfigKeyService              │
//! │  dispatch ─▶ get/exists/list/dump (sync) │
//! │          └─▶ put/del (deferred)          │
//! └─────┬───────────────────────┬────────────┘
//!       │ staged ops            │ reads
//! ┌─────▼──────────────┐  ┌─────▼────────────┐
//! │ Consensus          │  │ ConfigKeyStore   │
//! │ pending txn,       │  │ (namespace view) │
//! │ propose, finishers │  └─────┬────────────┘
//! └─────┬──────────────┘        │
//!       │ committed batches     │
//! ┌─────▼───────────────────────▼────────────┐
//! │   KeyValueDb (MemStore / RocksStore)     │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! configkey --db ./configkey-data put my/key --val hello
//! configkey --db ./configkey-data get my/key
//! configkey --db ./configkey-data dump my/
//! ```

#![allow(clippy::result_large_err)]

pub mod common;
pub mod consensus;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use common::{Error, Result, ServiceConfig};
pub use consensus::{Consensus, LocalConsensus, LocalMembership, MemberRole, Membership};
pub use service::{ConfigKeyService, Dispatched, Reply, Request, RequestSource};
pub use store::{ConfigKeyStore, KeyValueDb, MemStore, RocksStore};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
