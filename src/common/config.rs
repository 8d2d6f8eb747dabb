//! Configuration for the config-key service

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix (`CONFIGKEY_MAX_ENTRY_SIZE=...`)
pub const ENV_PREFIX: &str = "CONFIGKEY";

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Member name used in log lines
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Storage engine directory
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Largest value accepted by put/set, in bytes
    #[serde(default = "default_max_entry_size")]
    pub max_entry_size: usize,

    /// Maintenance tick period in seconds (<= 0 disables)
    #[serde(default = "default_tick_interval")]
    pub tick_interval: f64,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_node_id() -> String {
    "mon.a".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./configkey-data")
}
fn default_max_entry_size() -> usize {
    64 * 1024
}
fn default_tick_interval() -> f64 {
    5.0
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            db_path: default_db_path(),
            max_entry_size: default_max_entry_size(),
            tick_interval: default_tick_interval(),
            log_level: default_log_level(),
        }
    }
}

impl ServiceConfig {
    /// Load from an optional TOML file, then `CONFIGKEY_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let conf: ServiceConfig = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_entry_size == 0 {
            return Err(Error::InvalidConfig("max_entry_size must be positive".into()));
        }
        if self.tick_interval.is_nan() {
            return Err(Error::InvalidConfig("tick_interval is not a number".into()));
        }
        Ok(())
    }
}

/// Tick period, or `None` when ticking is disabled
pub(crate) fn period_from_secs(secs: f64) -> Option<Duration> {
    if secs > 0.0 && secs.is_finite() {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let conf = ServiceConfig::default();
        assert_eq!(conf.max_entry_size, 65536);
        assert_eq!(period_from_secs(conf.tick_interval), Some(Duration::from_secs(5)));
    }

    // The only test touching CONFIGKEY_* variables; they are process-wide.
    #[test]
    fn test_load_file_then_environment() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "node_id = \"mon.b\"\nmax_entry_size = 128\ntick_interval = 0").unwrap();

        let conf = ServiceConfig::load(Some(file.path())).unwrap();
        assert_eq!(conf.node_id, "mon.b");
        assert_eq!(conf.max_entry_size, 128);
        assert_eq!(period_from_secs(conf.tick_interval), None);
        assert_eq!(conf.log_level, "info");

        std::env::set_var("CONFIGKEY_MAX_ENTRY_SIZE", "4096");
        let loaded = ServiceConfig::load(Some(file.path()));
        std::env::remove_var("CONFIGKEY_MAX_ENTRY_SIZE");
        let conf = loaded.unwrap();
        assert_eq!(conf.max_entry_size, 4096);
        assert_eq!(conf.node_id, "mon.b");
    }

    #[test]
    fn test_rejects_zero_entry_size() {
        let conf = ServiceConfig {
            max_entry_size: 0,
            ..Default::default()
        };
        assert!(matches!(conf.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_negative_period_disables() {
        assert_eq!(period_from_secs(-1.0), None);
        assert_eq!(period_from_secs(0.5), Some(Duration::from_millis(500)));
    }
}
