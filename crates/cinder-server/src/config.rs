//! Server configuration and command line
//!
//! Settings come from an optional TOML file; flags given to `cinder serve`
//! override the file.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cinder_logging::{ConsoleFormat, LogConfig};
use cinder_paste::{DEFAULT_MAX_CONTENT_BYTES, LifecycleConfig, RateLimitConfig};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind: SocketAddr,
    /// Origin used in returned paste URLs, e.g. `https://paste.example`.
    /// Without it the origin is built from `Host`, over `http` unless a
    /// trusted proxy sends `X-Forwarded-Proto: https`.
    pub public_origin: Option<String>,
    /// Largest accepted `content` string, in bytes
    pub max_content_bytes: usize,
    /// Header carrying the client address when behind a proxy,
    /// e.g. `cf-connecting-ip`. Setting it also trusts the proxy's
    /// `X-Forwarded-Proto`.
    pub client_ip_header: Option<String>,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitSettings,
    pub lifecycle: LifecycleSettings,
    pub storage: StorageSettings,
    pub log: LogConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            public_origin: None,
            max_content_bytes: DEFAULT_MAX_CONTENT_BYTES,
            client_ip_header: None,
            cors: CorsConfig::default(),
            rate_limit: RateLimitSettings::default(),
            lifecycle: LifecycleSettings::default(),
            storage: StorageSettings::default(),
            log: LogConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load a TOML file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `cinder serve` flags on top of the loaded settings
    pub fn apply_overrides(&mut self, args: &ServeArgs) {
        if let Some(bind) = args.bind {
            self.bind = bind;
        }
        if let Some(origin) = &args.public_origin {
            self.public_origin = Some(origin.clone());
        }
        if let Some(level) = &args.log_level {
            self.log.level = level.clone();
        }
        if args.pretty {
            self.log.console.enabled = true;
            self.log.console.format = ConsoleFormat::Pretty;
            self.log.console.ansi = true;
        }
        if let Some(backend) = args.storage {
            self.storage.backend = backend;
        }
        if let Some(path) = &args.data_path {
            self.storage.path = path.clone();
        }
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            id_length: self.lifecycle.id_length,
            max_id_attempts: self.lifecycle.max_id_attempts,
            expiry_grace: Duration::from_secs(self.lifecycle.expiry_grace_secs),
            max_content_bytes: self.max_content_bytes,
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit.max_requests,
            // A zero window would store counters that are dead on arrival
            window: Duration::from_secs(self.rate_limit.window_secs.max(1)),
        }
    }
}

/// Origins allowed to call the API from a browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins, or scheme and host matching any port
    /// (`http://localhost` admits `http://localhost:5173`)
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "http://localhost".to_string(),
                "http://127.0.0.1".to_string(),
            ],
        }
    }
}

impl CorsConfig {
    pub fn allows(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| {
            origin == allowed
                || origin
                    .strip_prefix(allowed.as_str())
                    .is_some_and(|rest| rest.starts_with(':'))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Paste creations allowed per client and window
    pub max_requests: u64,
    /// Window length; `0` is treated as one second
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let defaults = RateLimitConfig::default();
        Self {
            max_requests: defaults.max_requests,
            window_secs: defaults.window.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleSettings {
    pub id_length: usize,
    pub max_id_attempts: u32,
    pub expiry_grace_secs: u64,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        let defaults = LifecycleConfig::default();
        Self {
            id_length: defaults.id_length,
            max_id_attempts: defaults.max_id_attempts,
            expiry_grace_secs: defaults.expiry_grace.as_secs(),
        }
    }
}

/// Which key-value store holds pastes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory; everything is lost on restart
    #[default]
    Memory,
    /// A redb database file
    Redb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Database file for the redb backend
    pub path: PathBuf,
    /// How often expired entries are purged
    pub sweep_interval_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            path: PathBuf::from("./data/cinder.redb"),
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Parser)]
#[command(name = "cinder", version, about = "Burn-after-read encrypted pastebin")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),
    /// Encrypt stdin under a fresh key and print the paste content and key
    Seal {
        /// Server origin, used to print a complete share URL
        #[arg(long, requires = "id")]
        origin: Option<String>,
        /// Paste id returned by the server
        #[arg(long, requires = "origin")]
        id: Option<String>,
    },
    /// Decrypt paste content read from stdin with the key in a share URL
    Open {
        /// Share URL including the `#key` fragment
        url: String,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Listen address, e.g. 0.0.0.0:8787
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Origin used in returned paste URLs
    #[arg(long)]
    pub public_origin: Option<String>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
    /// Human-readable console logs instead of JSONL
    #[arg(long)]
    pub pretty: bool,
    /// Storage backend
    #[arg(long, value_enum)]
    pub storage: Option<StorageBackend>,
    /// Database file for the redb backend
    #[arg(long)]
    pub data_path: Option<PathBuf>,
}
