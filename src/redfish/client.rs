//! Redfish HTTP Client
//!
//! One client per target. Talks to the BMC over HTTP(S) and shares the
//! process-wide [`SessionStore`].
//!
//! # Authentication
//!
//! - **session** (default): `POST /redfish/v1/SessionService/Sessions` with the
//!   credential; the returned `X-Auth-Token` is attached to every request and
//!   the session is deleted on logout.
//! - **basic**: HTTP basic auth on every request, no login round trip.
//!
//! # Failure Handling
//!
//! - Transient transport errors (connect, timeout, reset) are retried once
//! - A 401 invalidates the cached session and surfaces
//!   [`FetchError::SessionExpired`]; re-authentication is the caller's decision
//! - Bodies are decoded as raw JSON; missing or extra properties never fail a fetch

use crate::error::{AuthError, ExporterError, FetchError};
use crate::redfish::session::{Session, SessionAuth, SessionStore};
use crate::redfish::types::{normalize_path, ResourceDocument};
use crate::target::{AuthMode, Target};
use reqwest::{header, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Redfish SessionService collection used for login
pub const SESSIONS_PATH: &str = "/redfish/v1/SessionService/Sessions";

const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Delay before the single retry of a transient failure
const RETRY_BACKOFF: Duration = Duration::from_millis(200);

/// Tunables shared by every client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub request_timeout: Duration,
    pub session_ttl: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            session_ttl: Duration::from_secs(1800),
        }
    }
}

/// Client for one BMC's Redfish API
pub struct RedfishClient {
    target: Arc<Target>,
    base_url: String,
    http: reqwest::Client,
    store: Arc<SessionStore>,
    session_ttl: Duration,
    /// Fingerprint of URL and credential, stamped on every negotiated session
    identity: u64,
}

impl RedfishClient {
    pub fn new(
        target: Arc<Target>,
        store: Arc<SessionStore>,
        settings: &ClientSettings,
    ) -> Result<Self, ExporterError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.request_timeout)
            .danger_accept_invalid_certs(!target.verify_tls)
            .build()?;

        Ok(Self {
            base_url: target.base_url(),
            identity: fingerprint(&target),
            target,
            http,
            store,
            session_ttl: settings.session_ttl,
        })
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn address(&self) -> &str {
        &self.target.address
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Returns the cached session or negotiates a new one.
    ///
    /// The per-target slot stays locked during negotiation, which makes
    /// concurrent callers wait for and reuse the same session.
    pub async fn authenticate(&self) -> Result<Arc<Session>, AuthError> {
        let slot = self.store.slot(self.address());
        let mut guard = slot.lock().await;

        if let Some(session) = guard.as_ref() {
            if session.owner() != self.identity {
                debug!(bmc = %self.address(), "Cached session belongs to another credential");
            } else if session.is_expired() {
                debug!(bmc = %self.address(), "Cached session reached its expiry estimate");
            } else {
                return Ok(session.clone());
            }
            if let Some(stale) = guard.take() {
                self.spawn_logout(stale);
            }
        }

        let session = Arc::new(self.negotiate().await?.owned_by(self.identity));
        *guard = Some(session.clone());
        Ok(session)
    }

    async fn negotiate(&self) -> Result<Session, AuthError> {
        let credential = &self.target.credential;
        let id = self.store.next_id();

        if credential.auth == AuthMode::Basic {
            return Ok(Session::new(id, SessionAuth::Basic, None, self.session_ttl));
        }

        self.store.record_negotiation();
        debug!(bmc = %self.address(), "Creating Redfish session");

        let body = serde_json::json!({
            "UserName": credential.username,
            "Password": credential.password.expose_secret(),
        });

        let response = self
            .http
            .post(self.url(SESSIONS_PATH))
            .header(header::ACCEPT, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|source| AuthError::Unreachable {
                target: self.address().to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AuthError::InvalidCredential {
                target: self.address().to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(AuthError::Protocol {
                target: self.address().to_string(),
                reason: format!("session creation returned HTTP {}", status.as_u16()),
            });
        }

        let token = response
            .headers()
            .get(AUTH_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| SecretString::new(v.into()))
            .ok_or_else(|| AuthError::Protocol {
                target: self.address().to_string(),
                reason: "response carried no X-Auth-Token".to_string(),
            })?;

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(normalize_path);

        info!(bmc = %self.address(), "Established Redfish session");
        Ok(Session::new(
            id,
            SessionAuth::Token(token),
            location,
            self.session_ttl,
        ))
    }

    fn authorize(&self, request: RequestBuilder, session: &Session) -> RequestBuilder {
        match session.auth() {
            SessionAuth::Token(token) => request.header(AUTH_TOKEN_HEADER, token.expose_secret()),
            SessionAuth::Basic => request.basic_auth(
                &self.target.credential.username,
                Some(self.target.credential.password.expose_secret()),
            ),
        }
    }

    /// GETs one resource with the session attached.
    pub async fn fetch(&self, session: &Session, path: &str) -> Result<ResourceDocument, FetchError> {
        let url = self.url(path);
        let mut retried = false;

        let response = loop {
            let request = self
                .authorize(self.http.get(&url), session)
                .header(header::ACCEPT, "application/json");

            match request.send().await {
                Ok(response) => break response,
                Err(err) if !retried && is_transient(&err) => {
                    debug!(bmc = %self.address(), path, error = %err, "Retrying transient failure");
                    retried = true;
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(err) if err.is_timeout() => return Err(FetchError::Timeout),
                Err(err) => return Err(FetchError::Transport(err)),
            }
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            if self.store.invalidate(self.address(), session.id()).await {
                warn!(bmc = %self.address(), path, "Session rejected, cache entry cleared");
            }
            return Err(FetchError::SessionExpired);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body: serde_json::Value = response.json().await.map_err(|err| {
            if err.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Decode(err.to_string())
            }
        })?;
        if !body.is_object() {
            return Err(FetchError::Decode(format!("{} is not a JSON object", path)));
        }

        Ok(ResourceDocument::new(path, body))
    }

    /// Deletes the cached session on the BMC, best-effort.
    pub async fn logout(&self) {
        if let Some(session) = self.store.take(self.address()).await {
            delete_session(&self.http, &self.base_url, self.address(), &session).await;
        }
    }

    fn spawn_logout(&self, session: Arc<Session>) {
        let http = self.http.clone();
        let base_url = self.base_url.clone();
        let address = self.address().to_string();
        tokio::spawn(async move {
            delete_session(&http, &base_url, &address, &session).await;
        });
    }
}

async fn delete_session(http: &reqwest::Client, base_url: &str, address: &str, session: &Session) {
    let (SessionAuth::Token(token), Some(path)) = (session.auth(), session.logout_path()) else {
        return;
    };

    let result = http
        .delete(format!("{}{}", base_url, path))
        .header(AUTH_TOKEN_HEADER, token.expose_secret())
        .send()
        .await;

    match result {
        Ok(response) => debug!(bmc = %address, status = %response.status(), "Logged out Redfish session"),
        Err(err) => debug!(bmc = %address, error = %err, "Session logout failed"),
    }
}

fn fingerprint(target: &Target) -> u64 {
    let credential = &target.credential;
    let mut hasher = DefaultHasher::new();
    target.base_url().hash(&mut hasher);
    credential.username.hash(&mut hasher);
    (credential.auth == AuthMode::Basic).hash(&mut hasher);
    credential.password.expose_secret().hash(&mut hasher);
    hasher.finish()
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}
