//! Configuration file management module
//!
//! Handles YAML configuration file parsing, validation, and default-value
//! generation. Loaded once at startup; the resulting `Config` is immutable
//! for the life of the process — no hot-reload, no atomic swap.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::net::TcpStream;

use crate::backend::ServerConfig;
use crate::constants::{get_home_config_path, get_system_config_path, DEFAULT_LISTEN_ADDR};

/// The two named L7 pools; "l4" is a flat list since there is exactly
/// one L4 pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct L7Config {
    #[serde(default)]
    pub r#static: Vec<ServerConfig>,
    #[serde(default)]
    pub dynamic: Vec<ServerConfig>,
}

/// Complete configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub l4: Vec<ServerConfig>,

    #[serde(default)]
    pub l7: L7Config,
}

fn default_listen() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn new() -> Self {
        Self {
            listen: default_listen(),
            log_level: default_log_level(),
            l4: Vec::new(),
            l7: L7Config::default(),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid listen address: {}", self.listen))
    }

    /// Resolves which config file to load.
    ///
    /// 1. Path given on the CLI.
    /// 2. `$HOME/.bifrost/config.yaml`.
    /// 3. `/etc/bifrost/config.yaml`.
    pub fn resolve_config_path(cli_path: Option<&Path>) -> Result<std::path::PathBuf> {
        if let Some(path) = cli_path {
            return Ok(path.to_path_buf());
        }

        let home_path = get_home_config_path();
        if home_path.exists() {
            return Ok(home_path);
        }

        let system_path = get_system_config_path();
        if system_path.exists() {
            return Ok(system_path);
        }

        Ok(home_path)
    }

    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read configuration file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("configuration file parsing failed: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.l4.is_empty() && self.l7.r#static.is_empty() && self.l7.dynamic.is_empty() {
            bail!("at least one backend is required across l4, l7.static or l7.dynamic");
        }

        self.listen_addr()?;

        let mut seen = HashSet::new();
        for backend in self.l4.iter().chain(self.l7.r#static.iter()).chain(self.l7.dynamic.iter()) {
            if backend.port == 0 {
                bail!("invalid backend port for {}: must be 1-65535", backend.host);
            }
            if backend.weight == 0 {
                bail!("invalid backend weight for {}: must be >= 1", backend.address());
            }
            let key = backend.address();
            if !seen.insert(key.clone()) {
                bail!("duplicate backend address: {}", key);
            }
        }

        Ok(())
    }

    pub fn default_template() -> String {
        r#"# bifrost listen address
listen: "0.0.0.0:3000"

# Logging verbosity: trace, debug, info, warn, error
log_level: "info"

# L4 (raw TCP) backend pool
l4:
  - host: "127.0.0.1"
    port: 9000
    weight: 1
  - host: "127.0.0.1"
    port: 9001
    weight: 1

# L7 (HTTP) backend pools, keyed by URL classification
l7:
  static:
    - host: "127.0.0.1"
      port: 9100
      weight: 1
  dynamic:
    - host: "127.0.0.1"
      port: 9200
      weight: 1
"#
        .to_string()
    }

    pub async fn init_default_file() -> Result<std::path::PathBuf> {
        let path = get_home_config_path();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create config directory: {}", parent.display()))?;
        }

        if !path.exists() {
            fs::write(&path, Self::default_template())
                .await
                .with_context(|| format!("failed to create default config file: {}", path.display()))?;
            log::info!("default configuration file created: {}", path.display());
        }

        Ok(path)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the `check` CLI command: load, validate, and probe every
/// configured backend's reachability.
pub async fn validate_config_file(cli_path: Option<std::path::PathBuf>) -> Result<()> {
    let path = Config::resolve_config_path(cli_path.as_deref())?;

    log::info!("validating configuration file: {}", path.display());

    let config = Config::load_from_file(&path).await?;

    log::info!("configuration syntax validation passed");
    log::info!("  - listen address: {}", config.listen);
    log::info!("  - log level: {}", config.log_level);
    log::info!("  - l4 backends: {}", config.l4.len());
    log::info!("  - l7 static backends: {}", config.l7.r#static.len());
    log::info!("  - l7 dynamic backends: {}", config.l7.dynamic.len());

    log::info!("checking backend connectivity...");
    let mut healthy = 0;
    let mut unhealthy = 0;

    let all_backends = config
        .l4
        .iter()
        .chain(config.l7.r#static.iter())
        .chain(config.l7.dynamic.iter());

    for backend in all_backends {
        match check_connectivity(backend).await {
            Ok(()) => {
                log::info!("  [OK] {} - connection successful", backend.address());
                healthy += 1;
            }
            Err(e) => {
                log::warn!("  [FAIL] {} - {}", backend.address(), e);
                unhealthy += 1;
            }
        }
    }

    log::info!("validation complete: {} healthy, {} unhealthy", healthy, unhealthy);

    if healthy == 0 {
        bail!("cannot connect to any backend; check your configuration");
    }

    Ok(())
}

async fn check_connectivity(backend: &ServerConfig) -> Result<()> {
    let addr = backend.to_socket_addr()?;
    match tokio::time::timeout(Duration::from_secs(1), TcpStream::connect(&addr)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => bail!("connection failed: {}", e),
        Err(_) => bail!("connection timeout"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_listen_addr() {
        let config = Config::default();
        assert!(config.listen_addr().is_ok());
    }

    #[test]
    fn validate_rejects_empty_backends() {
        let config = Config::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_backend_addresses() {
        let mut config = Config::new();
        config.l4 = vec![
            ServerConfig { host: "127.0.0.1".into(), port: 9000, weight: 1 },
            ServerConfig { host: "127.0.0.1".into(), port: 9000, weight: 1 },
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_weight() {
        let mut config = Config::new();
        config.l4 = vec![ServerConfig { host: "127.0.0.1".into(), port: 9000, weight: 0 }];
        // weight 0 is accepted by ServerConfig (floors to 1 at runtime via
        // Server::weight()), but the config layer still flags it so typos
        // surface at load time rather than silently at select time.
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_backends_split_across_l4_and_l7() {
        let mut config = Config::new();
        config.l4 = vec![ServerConfig { host: "127.0.0.1".into(), port: 9000, weight: 1 }];
        config.l7.r#static = vec![ServerConfig { host: "127.0.0.1".into(), port: 9100, weight: 1 }];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_template_parses_and_validates() {
        let parsed: Config = serde_yaml::from_str(&Config::default_template()).unwrap();
        assert!(parsed.validate().is_ok());
    }

    #[tokio::test]
    async fn load_from_file_reads_and_validates_an_on_disk_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, Config::default_template()).unwrap();

        let config = Config::load_from_file(&path).await.unwrap();
        assert_eq!(config.listen, "0.0.0.0:3000");
        assert_eq!(config.l4.len(), 2);
    }

    #[tokio::test]
    async fn load_from_file_rejects_a_config_with_no_backends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "listen: \"0.0.0.0:3000\"\n").unwrap();

        assert!(Config::load_from_file(&path).await.is_err());
    }

    #[tokio::test]
    async fn load_from_file_errors_on_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.yaml");
        assert!(Config::load_from_file(&path).await.is_err());
    }
}
