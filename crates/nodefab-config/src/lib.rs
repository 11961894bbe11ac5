//! Configuration loading for nodefab deployments.
//!
//! A TOML file plus `NODEFAB_`-prefixed environment variables, merged
//! over built-in defaults, producing the core's
//! [`BootstrapConfig`](nodefab_core::BootstrapConfig) and the static
//! cluster member list. The embedding daemon calls [`load`] once at
//! startup and hands the pieces to the provisioner.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use nodefab_core::BootstrapConfig;

/// Config file location when `NODEFAB_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nodefab/config.toml";

/// Environment variable naming an alternate config file.
pub const CONFIG_PATH_ENV: &str = "NODEFAB_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
///
/// ```toml
/// [bootstrap]
/// ovsdb_port = 6640
/// auto_recovery = true
/// openflow_port = 6653
///
/// [cluster]
/// members = ["10.10.0.2", "10.10.0.3"]
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Provisioning tunables, passed through to the core.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,

    /// Static cluster description, for deployments without an external
    /// election feed.
    #[serde(default)]
    pub cluster: ClusterSection,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ClusterSection {
    /// Addresses of all cluster members, this instance included. They
    /// become the integration bridges' OpenFlow controller list.
    #[serde(default)]
    pub members: Vec<IpAddr>,
}

impl Config {
    /// Render the effective configuration as TOML, for operator
    /// inspection.
    pub fn render(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bootstrap.ovsdb_port == 0 {
            return Err(ConfigError::Validation {
                field: "bootstrap.ovsdb_port".into(),
                reason: "port must be non-zero".into(),
            });
        }
        if self.bootstrap.openflow_port == 0 {
            return Err(ConfigError::Validation {
                field: "bootstrap.openflow_port".into(),
                reason: "port must be non-zero".into(),
            });
        }
        Ok(())
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `NODEFAB_CONFIG` if set, otherwise
/// [`DEFAULT_CONFIG_PATH`].
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

// ── Config loading ──────────────────────────────────────────────────

/// Load configuration from the canonical path plus environment.
///
/// A missing file is not an error; defaults and environment still
/// apply. Environment variables use `__` as the section separator, e.g.
/// `NODEFAB_BOOTSTRAP__OVSDB_PORT=6641`.
pub fn load() -> Result<Config, ConfigError> {
    load_from(config_path())
}

/// Load configuration from an explicit file path plus environment.
pub fn load_from(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NODEFAB_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;

    debug!(
        path = %path.display(),
        members = config.cluster.members.len(),
        "configuration loaded"
    );
    Ok(config)
}

/// Load configuration, falling back to defaults on any failure.
pub fn load_or_default() -> Config {
    load().unwrap_or_default()
}
