//! # Configuration
//!
//! `starjar.toml`, overridden by `STARJAR_*` environment variables, overridden
//! by CLI flags.
//!
//! ```toml
//! database = "starjar.redb"
//! backend = "redb"
//! default_lang = "en"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! rate_limit = 100
//!
//! [auth]
//! api_key = "..."
//!
//! [seed]
//! users = [{ username = "mom", password = "...", is_admin = true }]
//! rewards = true
//! ```

use serde::Deserialize;
use starjar_core::{LedgerError, SeedUser, default_seed_users, primitives::DEFAULT_LANG};
use std::path::{Path, PathBuf};

/// Environment variables read by `apply_env`.
pub const ENV_DB: &str = "STARJAR_DB";
pub const ENV_BACKEND: &str = "STARJAR_BACKEND";
pub const ENV_API_KEY: &str = "STARJAR_API_KEY";
pub const ENV_DEFAULT_LANG: &str = "STARJAR_DEFAULT_LANG";
pub const ENV_RATE_LIMIT: &str = "STARJAR_RATE_LIMIT";

fn default_database() -> PathBuf {
    PathBuf::from("starjar.redb")
}

fn default_backend() -> Backend {
    Backend::Redb
}

fn default_lang() -> String {
    DEFAULT_LANG.to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_rate_limit() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ACID database file.
    Redb,
    /// Process-lifetime store, lost on exit.
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redb" => Ok(Self::Redb),
            "memory" => Ok(Self::Memory),
            other => Err(LedgerError::InvalidInput(format!(
                "unknown backend '{}', expected 'redb' or 'memory'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redb => f.write_str("redb"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Requests per second per logged-in user. 0 disables limiting.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            rate_limit: default_rate_limit(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Bearer key required on every endpoint except `/health`. Unset disables auth.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// First-run content, applied only to empty tables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedConfig {
    #[serde(default = "default_seed_users")]
    pub users: Vec<SeedUser>,
    /// Seed the default reward catalog.
    #[serde(default = "default_true")]
    pub rewards: bool,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            users: default_seed_users(),
            rewards: true,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StarjarConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default = "default_backend")]
    pub backend: Backend,
    #[serde(default = "default_lang")]
    pub default_lang: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

impl Default for StarjarConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            backend: default_backend(),
            default_lang: default_lang(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            seed: SeedConfig::default(),
        }
    }
}

impl StarjarConfig {
    /// Parse a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, LedgerError> {
        toml::from_str(content).map_err(|e| LedgerError::InvalidInput(format!("config: {}", e)))
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            LedgerError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Load `path` if given, else defaults, then apply the process environment.
    pub fn resolve(path: Option<&Path>) -> Result<Self, LedgerError> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `STARJAR_*` overrides from `lookup`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), LedgerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(db) = get(ENV_DB) {
            self.database = PathBuf::from(db);
        }
        if let Some(backend) = get(ENV_BACKEND) {
            self.backend = backend.parse()?;
        }
        if let Some(key) = get(ENV_API_KEY) {
            self.auth.api_key = Some(key);
        }
        if let Some(lang) = get(ENV_DEFAULT_LANG) {
            self.default_lang = lang;
        }
        if let Some(limit) = get(ENV_RATE_LIMIT) {
            self.server.rate_limit = limit.parse().map_err(|_| {
                LedgerError::InvalidInput(format!(
                    "{} must be a number, got '{}'",
                    ENV_RATE_LIMIT, limit
                ))
            })?;
        }
        Ok(())
    }

    /// The configured API key, if non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.auth.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

// =============================================================================
// TESTS
// =============================================================================
