use crate::error::ExporterError;
use crate::metrics::vocabulary;
use crate::target::{AuthMode, Credential, Target};
use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub credentials: HashMap<String, CredentialConfig>,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_seconds: u64,
}

/// What a scrape does when a poll of the same target is already running.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverlapMode {
    /// Join the in-flight poll
    #[default]
    Wait,
    /// Serve the last completed outcome when fresh enough, else join
    Cached,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    /// Global scrape deadline
    #[serde(default = "default_scrape_timeout")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default = "default_fetch_parallelism")]
    pub fetch_parallelism: usize,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
    #[serde(default)]
    pub overlap: OverlapMode,
    #[serde(default = "default_cached_max_age")]
    pub cached_max_age_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CredentialConfig {
    pub username: String,
    pub password: SecretString,
    #[serde(default)]
    pub auth: AuthMode,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TargetConfig {
    pub address: String,
    pub credential: String,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default = "default_true")]
    pub verify_tls: bool,
    /// Extra labels for every series of this target, e.g. `rack = "r12"`
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9610
}

fn default_shutdown_grace() -> u64 {
    5
}

fn default_scrape_timeout() -> u64 {
    30
}

fn default_max_concurrency() -> usize {
    16
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_depth() -> usize {
    5
}

fn default_fetch_parallelism() -> usize {
    4
}

fn default_session_ttl() -> u64 {
    1800
}

fn default_cached_max_age() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: default_port(),
            shutdown_grace_seconds: default_shutdown_grace(),
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_scrape_timeout(),
            max_concurrency: default_max_concurrency(),
            request_timeout_seconds: default_request_timeout(),
            max_depth: default_max_depth(),
            fetch_parallelism: default_fetch_parallelism(),
            session_ttl_seconds: default_session_ttl(),
            overlap: OverlapMode::default(),
            cached_max_age_seconds: default_cached_max_age(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("REDFISH_EXPORTER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> std::result::Result<(), ExporterError> {
        let scrape = &self.scrape;
        if scrape.timeout_seconds == 0 || scrape.request_timeout_seconds == 0 {
            return Err(ExporterError::Config(
                "scrape timeouts must be greater than zero".to_string(),
            ));
        }
        if scrape.max_concurrency == 0 {
            return Err(ExporterError::Config(
                "max_concurrency must be greater than zero".to_string(),
            ));
        }
        if scrape.fetch_parallelism == 0 {
            return Err(ExporterError::Config(
                "fetch_parallelism must be greater than zero".to_string(),
            ));
        }
        if scrape.max_depth == 0 {
            return Err(ExporterError::Config(
                "max_depth must be greater than zero".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.targets.len());
        for target in &self.targets {
            if target.address.trim().is_empty() {
                return Err(ExporterError::Config(
                    "target address must not be empty".to_string(),
                ));
            }
            if !seen.insert(target.address.as_str()) {
                return Err(ExporterError::Config(format!(
                    "duplicate target address: {}",
                    target.address
                )));
            }
            if !self.credentials.contains_key(&target.credential) {
                return Err(ExporterError::Config(format!(
                    "target {} references unknown credential '{}'",
                    target.address, target.credential
                )));
            }
            if target.timeout_seconds == Some(0) {
                return Err(ExporterError::Config(format!(
                    "target {} has a zero timeout",
                    target.address
                )));
            }
            if let Some(name) = target.labels.keys().find(|name| !is_operator_label(name)) {
                return Err(ExporterError::Config(format!(
                    "target {} has invalid or reserved label '{}'",
                    target.address, name
                )));
            }
        }

        Ok(())
    }

    /// Resolves credential references into the immutable target set.
    pub fn targets(&self) -> std::result::Result<Vec<Target>, ExporterError> {
        self.targets
            .iter()
            .map(|t| {
                let credential = self.credentials.get(&t.credential).ok_or_else(|| {
                    ExporterError::Config(format!(
                        "target {} references unknown credential '{}'",
                        t.address, t.credential
                    ))
                })?;
                Ok(Target {
                    address: t.address.clone(),
                    credential: Credential {
                        username: credential.username.clone(),
                        password: credential.password.clone(),
                        auth: credential.auth,
                    },
                    timeout: t.timeout_seconds.map(Duration::from_secs),
                    verify_tls: t.verify_tls,
                    labels: t.labels.clone(),
                })
            })
            .collect()
    }
}

/// A valid Prometheus label name that no exported metric already uses.
fn is_operator_label(name: &str) -> bool {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    valid
        && !name.starts_with("__")
        && !vocabulary::ALL
            .iter()
            .any(|def| def.labels.contains(&name))
}
