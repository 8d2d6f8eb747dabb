//! Command-line access to a local config-key store
//!
//! Runs the service as leader of a one-member cluster over a RocksDB store,
//! so every write goes through the same stage/propose/commit path.

use bytes::Bytes;
use clap::{Parser, Subcommand};
use configkey::common::is_binary;
use configkey::service::SecretCheck;
use configkey::{
    ConfigKeyService, Consensus, Dispatched, LocalConsensus, LocalMembership, MemberRole, Reply,
    Request, RocksStore, ServiceConfig,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "configkey")]
#[command(about = "config-key store CLI")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database directory
    #[arg(long)]
    db: Option<PathBuf>,

    /// Largest accepted value in bytes
    #[arg(long)]
    max_entry_size: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get a value
    Get { key: String },

    /// Set a value (`set` is an alias)
    #[command(alias = "set")]
    Put {
        key: String,

        /// Inline value
        #[arg(long)]
        val: Option<String>,

        /// Read the value from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Delete a key
    #[command(alias = "rm")]
    Del { key: String },

    /// Check whether a key exists
    Exists { key: String },

    /// List all keys
    #[command(alias = "ls")]
    List,

    /// Dump keys and values, optionally under a prefix
    Dump { prefix: Option<String> },

    /// Delete every key owned by a destroyed member
    Destroy {
        #[arg(long)]
        id: i32,

        #[arg(long)]
        uuid: Uuid,
    },

    /// Store a member's encryption secret
    NewSecret {
        #[arg(long)]
        uuid: Uuid,

        #[arg(long)]
        secret: String,
    },
}

fn command(prefix: &str, key: &str) -> Request {
    Request::client(json!({ "prefix": prefix, "key": key }).to_string())
}

fn print_reply(reply: &Reply) {
    if !reply.data.is_empty() {
        if is_binary(&reply.data) {
            println!("{}", hex::encode(&reply.data));
        } else {
            println!("{}", String::from_utf8_lossy(&reply.data));
        }
    }
    if reply.is_success() {
        if !reply.message.is_empty() {
            eprintln!("{}", reply.message);
        }
    } else {
        eprintln!("Error ({}): {}", reply.status, reply.message);
    }
}

async fn run(service: &ConfigKeyService, request: Request) -> anyhow::Result<Reply> {
    match service.dispatch(request) {
        Dispatched::Reply(reply) => Ok(reply),
        Dispatched::Deferred(deferred) => deferred
            .resolve()
            .await
            .ok_or_else(|| anyhow::anyhow!("no reply for client request")),
        other => {
            let err = other
                .unanswered_error()
                .unwrap_or_else(|| configkey::Error::Internal(format!("{:?}", other)));
            Ok(Reply::error(err.errno(), err.to_string()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(max) = cli.max_entry_size {
        config.max_entry_size = max;
    }
    config.validate()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = Arc::new(RocksStore::open(&config.db_path)?);
    let consensus = Arc::new(LocalConsensus::new(db.clone()));
    let membership = Arc::new(LocalMembership::new(
        config.node_id.clone(),
        MemberRole::Leader,
    ));
    let service = ConfigKeyService::new(config, db.clone(), consensus.clone(), membership);
    consensus.set_term(1);
    service.start(1);

    let reply = match cli.command {
        Commands::Get { key } => run(&service, command("config-key get", &key)).await?,
        Commands::Put { key, val, file } => {
            let mut body = json!({ "prefix": "config-key put", "key": key });
            if let Some(val) = val {
                body["val"] = json!(val);
            }
            let data = match file {
                Some(path) => Bytes::from(std::fs::read(path)?),
                None => Bytes::new(),
            };
            run(&service, Request::client(body.to_string()).with_data(data)).await?
        }
        Commands::Del { key } => run(&service, command("config-key del", &key)).await?,
        Commands::Exists { key } => run(&service, command("config-key exists", &key)).await?,
        Commands::List => run(&service, command("config-key list", "")).await?,
        Commands::Dump { prefix } => {
            run(&service, command("config-key dump", prefix.as_deref().unwrap_or(""))).await?
        }
        Commands::Destroy { id, uuid } => match service.validate_destroy(id, &uuid) {
            Ok(()) => {
                service.perform_destroy(id, &uuid)?;
                Reply::ok(format!("destroyed config-key state of osd.{}", id))
            }
            Err(e) => Reply::error(e.errno(), e.to_string()),
        },
        Commands::NewSecret { uuid, secret } => match service
            .validate_create_secret(&uuid, &secret)
        {
            Ok(SecretCheck::Create) => {
                consensus.plug();
                let staged = service.perform_create_secret(&uuid, &secret);
                consensus.trigger_propose();
                consensus.unplug();
                staged?;
                Reply::ok(format!("stored secret for {}", uuid))
            }
            Ok(SecretCheck::Idempotent) => Reply::ok(format!("secret for {} already stored", uuid)),
            Err(e) => Reply::error(e.errno(), e.to_string()),
        },
    };

    service.shutdown();
    db.flush()?;
    print_reply(&reply);
    if !reply.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
