//! Command requests, verbs and replies

use crate::common::{Error, Result};
use bytes::Bytes;
use serde::Deserialize;

/// Who sent a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestSource {
    /// External client; gets a reply
    Client(String),
    /// Another cluster member; never gets a reply
    Peer(String),
}

impl RequestSource {
    pub fn is_peer(&self) -> bool {
        matches!(self, RequestSource::Peer(_))
    }
}

/// An incoming command, kept verbatim so it can be forwarded or retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub source: RequestSource,
    /// JSON command map (`{"prefix": "config-key get", "key": "..."}`)
    pub command: String,
    /// Attached binary payload
    pub data: Bytes,
}

impl Request {
    pub fn client(command: impl Into<String>) -> Self {
        Self {
            source: RequestSource::Client("client".to_string()),
            command: command.into(),
            data: Bytes::new(),
        }
    }

    pub fn with_source(mut self, source: RequestSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }
}

/// Command verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Put,
    Delete,
    Exists,
    List,
    Dump,
}

impl Verb {
    pub fn from_prefix(prefix: &str) -> Option<Verb> {
        let verb = match prefix {
            "config-key get" => Verb::Get,
            "config-key put" | "config-key set" => Verb::Put,
            "config-key del" | "config-key rm" => Verb::Delete,
            "config-key exists" => Verb::Exists,
            "config-key list" | "config-key ls" => Verb::List,
            "config-key dump" => Verb::Dump,
            _ => return None,
        };
        Some(verb)
    }

    /// Does this verb mutate the namespace?
    pub fn is_write(&self) -> bool {
        matches!(self, Verb::Put | Verb::Delete)
    }
}

/// Decoded command map
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandMap {
    pub prefix: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub val: Option<String>,
}

impl CommandMap {
    pub fn parse(command: &str) -> Result<Self> {
        serde_json::from_str(command).map_err(|e| Error::MalformedCommand(e.to_string()))
    }

    pub fn verb(&self) -> Result<Verb> {
        Verb::from_prefix(&self.prefix).ok_or_else(|| Error::UnknownCommand(self.prefix.clone()))
    }
}

/// Status, message and optional payload sent back to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// 0 on success, negative errno otherwise
    pub status: i32,
    pub message: String,
    pub data: Bytes,
}

impl Reply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            message: message.into(),
            data: Bytes::new(),
        }
    }

    pub fn error(status: i32, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: Bytes::new(),
        }
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}
