use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP server error: {0}")]
    Server(String),
}

/// Failure to obtain a session from a BMC.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication failed: {target} rejected the credential (HTTP {status})")]
    InvalidCredential { target: String, status: u16 },

    #[error("Target unreachable: {target}: {source}")]
    Unreachable {
        target: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected authentication response from {target}: {reason}")]
    Protocol { target: String, reason: String },
}

/// Failure to fetch a single Redfish resource.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("session expired")]
    SessionExpired,

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed resource document: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("session expired during resource walk")]
    SessionExpired,

    #[error("failed to fetch essential resource {path}: {source}")]
    Essential {
        path: String,
        #[source]
        source: FetchError,
    },
}

/// Conditions that prevent a scrape from producing any result.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScrapeError {
    #[error("No targets configured")]
    NoTargets,

    #[error("Unknown target: {0}")]
    UnknownTarget(String),
}
