//! Server configuration.
//!
//! Supports loading from YAML files with environment variable overrides, matching the
//! precedence described for the external HTTP collaborator: file, then CLI/env.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dmxx_core::config::ConfigSnapshot;
use serde::Deserialize;

/// Server configuration loaded from YAML with environment overrides.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind the HTTP/WebSocket server to.
    /// Override: `DMXX_HOST`
    pub host: String,

    /// Port to bind the HTTP server to. `0` picks any available port in the default
    /// scan range.
    /// Override: `DMXX_PORT`
    pub port: u16,

    /// Password accepted by `/api/auth/login` for the implicit admin grant.
    pub password: String,

    /// Secret key used to sign issued bearer tokens.
    pub secret_key: String,

    /// IP addresses/CIDR ranges that auto-authenticate without a token.
    pub ip_whitelist: Vec<dmxx_core::auth::WhitelistRule>,

    /// Nominal output tick rate in Hz.
    pub output_rate_hz: u32,

    /// Directory holding the persisted configuration snapshot (universes, fixtures,
    /// patches, scenes, groups, grids, mapping tables, profiles).
    /// Override: `DMXX_DATA_DIR`
    pub data_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let core_default = dmxx_core::Config::default();
        Self {
            host: core_default.host,
            port: core_default.port,
            password: core_default.password,
            secret_key: core_default.secret_key,
            ip_whitelist: core_default.ip_whitelist,
            output_rate_hz: core_default.output_rate_hz,
            data_dir: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, then applies environment overrides. A
    /// missing file is not fatal; a malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DMXX_HOST") {
            self.host = val;
        }

        if let Ok(val) = std::env::var("DMXX_PORT") {
            if let Ok(port) = val.parse() {
                self.port = port;
            }
        }

        // DMXX_DATA_DIR is handled by clap via #[arg(env = ...)] in main.rs.
    }

    /// Converts to dmxx-core's `Config` type.
    pub fn to_core_config(&self) -> dmxx_core::Config {
        dmxx_core::Config {
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone(),
            secret_key: self.secret_key.clone(),
            ip_whitelist: self.ip_whitelist.clone(),
            output_rate_hz: self.output_rate_hz,
        }
    }

    /// Loads the persisted configuration snapshot from `<data_dir>/state.yaml`. A missing
    /// data directory or state file starts the server with an empty snapshot (no
    /// universes, no scenes); a present-but-malformed file is fatal, matching the
    /// "failure to load the persisted store aborts startup" rule.
    pub fn load_snapshot(&self) -> Result<ConfigSnapshot> {
        let Some(dir) = &self.data_dir else {
            return Ok(ConfigSnapshot::default());
        };
        let path = dir.join("state.yaml");
        if !path.exists() {
            return Ok(ConfigSnapshot::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let snapshot: ConfigSnapshot = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        snapshot
            .validate()
            .with_context(|| format!("Persisted state file failed validation: {}", path.display()))?;
        Ok(snapshot)
    }
}
