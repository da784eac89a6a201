//! Monitored targets and their credentials.

use crate::metrics::Labels;
use secrecy::SecretString;
use serde::Deserialize;
use std::time::Duration;

/// How requests to a BMC are authenticated.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Redfish SessionService login, `X-Auth-Token` on every request
    #[default]
    Session,
    /// HTTP basic authentication on every request
    Basic,
}

#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password: SecretString,
    pub auth: AuthMode,
}

/// One monitored BMC. Identity is the address.
#[derive(Debug, Clone)]
pub struct Target {
    /// `host[:port]` (implies https) or a full `http(s)://` base URL
    pub address: String,
    pub credential: Credential,
    /// Overrides the global scrape deadline when shorter
    pub timeout: Option<Duration>,
    pub verify_tls: bool,
    /// Operator labels added to every series of this target, e.g. `rack`
    pub labels: Labels,
}

impl Target {
    pub fn new(address: impl Into<String>, credential: Credential) -> Self {
        Self {
            address: address.into(),
            credential,
            timeout: None,
            verify_tls: true,
            labels: Labels::new(),
        }
    }

    /// Base URL requests are issued against, without a trailing slash.
    pub fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("https://{}", address)
        }
    }
}
