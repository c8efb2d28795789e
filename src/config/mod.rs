//! Service configuration
//!
//! Defaults are embedded at compile time and overridden by an optional
//! `scand.toml` (or an explicit `--config` path) and then by `SCAND_`-prefixed
//! environment variables, nested keys split on `__`
//! (e.g. `SCAND_SERVER__PORT=9000`, `SCAND_DATABASE__PATH=/tmp/scans.db`).

use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Main configuration structure for scand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Result store configuration
    pub database: DatabaseConfig,

    /// HTTP listener configuration
    pub server: ServerConfig,

    /// Built-in command executor configuration
    pub scanner: ScannerConfig,
}

/// Result store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file location; parent directories are created on open
    pub path: PathBuf,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,
}

/// Built-in command executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Default executor kind for submissions that do not name one
    pub kind: String,

    /// Program to run, with the scan target appended as the final argument
    pub command: String,

    /// Arguments placed before the target
    pub args: Vec<String>,

    /// Exit/cancellation polling interval while the program runs
    pub poll_interval_ms: u64,
}

impl ServiceConfig {
    /// Load with the standard layering: embedded defaults, then `scand.toml`
    /// from the working directory, then environment variables.
    pub fn load() -> Result<Self> {
        Self::load_with_custom_config(None)
    }

    /// Load with an explicit config file in place of `scand.toml`.
    pub fn load_with_custom_config(custom_config: Option<&str>) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        if let Some(custom_path) = custom_config {
            figment = figment.merge(Toml::file(custom_path));
        } else {
            figment = figment.merge(Toml::file("scand.toml"));
        }

        // Environment variables always have highest priority
        let config = figment
            .merge(Env::prefixed("SCAND_").split("__"))
            .extract()
            .context("invalid configuration")?;
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn embedded_defaults_cover_every_section() {
        let config = ServiceConfig::load_with_custom_config(Some("does-not-exist.toml")).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/data/scans.db"));
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.scanner.kind, "command");
        assert_eq!(config.scanner.poll_interval_ms, 200);
    }

    #[test]
    fn listen_addr_joins_host_and_port() {
        let config = ServiceConfig::load_with_custom_config(Some("does-not-exist.toml")).unwrap();
        assert_eq!(config.listen_addr(), "0.0.0.0:8000");
    }

    #[test]
    fn custom_file_overrides_only_what_it_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scand.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[server]\nport = 9100").unwrap();

        let config = ServiceConfig::load_with_custom_config(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.server.port, 9100);
        // Untouched sections keep their defaults.
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.database.path, PathBuf::from("/data/scans.db"));
    }
}
