//! TOML configuration parsing and validation.
//!
//! The checker is configured via a TOML file (default
//! `./config/dapa.toml`). Every section except `[db]` and `[server]`
//! has defaults, so a minimal file is:
//!
//! ```toml
//! [db]
//! path = "./data/dapa.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```
//!
//! # Sections
//!
//! | Section | Purpose |
//! |---------|---------|
//! | `[db]` | Backend (`sqlite` or `memory`) and SQLite file path |
//! | `[server]` | HTTP bind address |
//! | `[checker]` | Daily limit, quota scope, history page size, collaborator timeout |
//! | `[domain_age]` | Domain-age provider (`rdap`, `mock`, `disabled`) |
//! | `[[auth.users]]` | Bearer tokens mapped to identities |

use anyhow::{Context, Result};
use dapa_checker_core::models::{Identity, ANONYMOUS_IDENTITY};
use dapa_checker_core::quota::{QuotaPolicy, QuotaScope, DEFAULT_DAILY_LIMIT};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub checker: CheckerConfig,
    #[serde(default)]
    pub domain_age: DomainAgeConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_backend() -> String {
    "sqlite".to_string()
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/dapa.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CheckerConfig {
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default)]
    pub quota_scope: QuotaScope,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            daily_limit: DEFAULT_DAILY_LIMIT,
            quota_scope: QuotaScope::default(),
            history_limit: default_history_limit(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_daily_limit() -> u32 {
    DEFAULT_DAILY_LIMIT
}
fn default_history_limit() -> usize {
    10
}
fn default_timeout_ms() -> u64 {
    5_000
}

impl CheckerConfig {
    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy::new(self.daily_limit, self.quota_scope)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DomainAgeConfig {
    #[serde(default = "default_domain_age_provider")]
    pub provider: String,
    #[serde(default = "default_rdap_base")]
    pub base_url: String,
    #[serde(default = "default_domain_age_timeout")]
    pub timeout_secs: u64,
}

impl Default for DomainAgeConfig {
    fn default() -> Self {
        Self {
            provider: default_domain_age_provider(),
            base_url: default_rdap_base(),
            timeout_secs: default_domain_age_timeout(),
        }
    }
}

fn default_domain_age_provider() -> String {
    "mock".to_string()
}
fn default_rdap_base() -> String {
    "https://rdap.org".to_string()
}
fn default_domain_age_timeout() -> u64 {
    4
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub users: Vec<AuthUser>,
}

/// A bearer token accepted by the API and the identity it stands for.
#[derive(Debug, Deserialize, Clone)]
pub struct AuthUser {
    pub token: String,
    pub identity: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub admin: bool,
}

impl Config {
    /// In-memory store, defaults everywhere. Used by tests and
    /// `dapa check` when no config file exists.
    pub fn in_memory() -> Self {
        Self {
            db: DbConfig {
                backend: "memory".to_string(),
                path: default_db_path(),
            },
            server: ServerConfig {
                bind: "127.0.0.1:7341".to_string(),
            },
            checker: CheckerConfig::default(),
            domain_age: DomainAgeConfig {
                provider: "disabled".to_string(),
                ..DomainAgeConfig::default()
            },
            auth: AuthConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    match config.db.backend.as_str() {
        "sqlite" | "memory" => {}
        other => anyhow::bail!("Unknown db backend: '{}'. Must be sqlite or memory.", other),
    }

    if config.checker.daily_limit == 0 {
        anyhow::bail!("checker.daily_limit must be >= 1");
    }
    if config.checker.history_limit == 0 {
        anyhow::bail!("checker.history_limit must be >= 1");
    }
    if config.checker.timeout_ms == 0 {
        anyhow::bail!("checker.timeout_ms must be > 0");
    }

    match config.domain_age.provider.as_str() {
        "rdap" | "mock" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown domain_age provider: '{}'. Must be rdap, mock, or disabled.",
            other
        ),
    }

    let mut seen = std::collections::HashSet::new();
    for user in &config.auth.users {
        if user.token.trim().is_empty() {
            anyhow::bail!("auth.users entries need a non-empty token");
        }
        parse_identity(&user.identity).context("invalid identity in auth.users")?;
        if !seen.insert(user.token.as_str()) {
            anyhow::bail!("duplicate token in auth.users for '{}'", user.identity);
        }
    }

    Ok(())
}

/// Parse a caller identity given in config or on the command line.
///
/// The anonymous sentinel is reserved so no real caller can read or
/// spend the pooled anonymous quota.
pub fn parse_identity(raw: &str) -> Result<Identity> {
    let value = raw.trim();
    if value.is_empty() {
        anyhow::bail!("identity must not be empty");
    }
    if value == ANONYMOUS_IDENTITY {
        anyhow::bail!("identity '{}' is reserved for anonymous callers", ANONYMOUS_IDENTITY);
    }
    Ok(Identity::new(value))
}
