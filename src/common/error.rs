//! Error types for configkey

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// errno values placed (negated) in reply statuses
pub mod errno {
    pub const EIO: i32 = 5;
    pub const ENOENT: i32 = 2;
    pub const EAGAIN: i32 = 11;
    pub const EEXIST: i32 = 17;
    pub const EINVAL: i32 = 22;
    pub const EFBIG: i32 = 27;
    pub const ECANCELED: i32 = 125;
}

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Storage Errors ===
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("entry size limited to {limit} bytes, got {size}")]
    TooLarge { size: usize, limit: usize },

    #[error("{0}")]
    AlreadyExists(String),

    #[error("Corrupted data: {0}")]
    Corrupted(String),

    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Codec error: {0}")]
    Codec(String),

    // === Consensus Errors ===
    #[error("not the leader; request forwarded")]
    NotLeader,

    #[error("Not in quorum")]
    NotQuorate,

    #[error("proposals are not plugged")]
    NotPlugged,

    #[error("proposal failed: {0}")]
    ProposalFailed(String),

    #[error("proposal dropped before commit")]
    ProposalDropped,

    // === Command Errors ===
    #[error("malformed command: {0}")]
    MalformedCommand(String),

    #[error("unrecognized command: {0}")]
    UnknownCommand(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Negative errno-style status for command replies
    pub fn errno(&self) -> i32 {
        let code = match self {
            Error::NotFound(_) => errno::ENOENT,
            Error::TooLarge { .. } => errno::EFBIG,
            Error::AlreadyExists(_) => errno::EEXIST,
            Error::NotLeader | Error::NotQuorate => errno::EAGAIN,
            Error::MalformedCommand(_) | Error::UnknownCommand(_) | Error::InvalidConfig(_) => {
                errno::EINVAL
            }
            Error::NotPlugged | Error::ProposalDropped => errno::ECANCELED,
            Error::Io(_)
            | Error::Corrupted(_)
            | Error::RocksDb(_)
            | Error::Codec(_)
            | Error::ProposalFailed(_)
            | Error::Internal(_) => errno::EIO,
        };
        -code
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}
