//! Session Cache
//!
//! Holds at most one authenticated session per target, keyed by target address.
//! Each target owns an async mutex slot; whoever negotiates a new session holds
//! that slot for the duration of the login request, so two concurrent callers
//! for the same target never negotiate in parallel.

use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

/// Credential material attached to every request of a session
#[derive(Debug, Clone)]
pub enum SessionAuth {
    /// `X-Auth-Token` obtained from the SessionService
    Token(SecretString),
    /// HTTP basic auth; nothing was negotiated
    Basic,
}

/// An authentication handle bound to one target
#[derive(Debug)]
pub struct Session {
    id: u64,
    auth: SessionAuth,
    logout_path: Option<String>,
    expires_at: Instant,
    owner: u64,
}

impl Session {
    pub fn new(id: u64, auth: SessionAuth, logout_path: Option<String>, ttl: Duration) -> Self {
        Self {
            id,
            auth,
            logout_path,
            expires_at: Instant::now() + ttl,
            owner: 0,
        }
    }

    /// Tags the session with the fingerprint of the credential that created it.
    pub fn owned_by(mut self, owner: u64) -> Self {
        self.owner = owner;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn owner(&self) -> u64 {
        self.owner
    }

    pub fn auth(&self) -> &SessionAuth {
        &self.auth
    }

    pub fn logout_path(&self) -> Option<&str> {
        self.logout_path.as_deref()
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

pub(crate) type SessionSlot = Arc<AsyncMutex<Option<Arc<Session>>>>;

/// Process-wide session cache shared by every client.
#[derive(Debug, Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<String, SessionSlot>>,
    next_id: AtomicU64,
    negotiations: AtomicU64,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn slot(&self, target: &str) -> SessionSlot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(None)))
            .clone()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub(crate) fn record_negotiation(&self) {
        self.negotiations.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of login requests issued since the store was created.
    pub fn negotiations(&self) -> u64 {
        self.negotiations.load(Ordering::SeqCst)
    }

    /// Currently cached session for `target`, if any.
    pub async fn cached(&self, target: &str) -> Option<Arc<Session>> {
        let slot = self.slot(target);
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Clears the cached session of `target` if it is still `session_id`.
    ///
    /// Returns whether an entry was removed. A session refreshed by someone
    /// else in the meantime is left alone.
    pub async fn invalidate(&self, target: &str, session_id: u64) -> bool {
        let slot = self.slot(target);
        let mut guard = slot.lock().await;
        match guard.as_ref() {
            Some(session) if session.id() == session_id => {
                *guard = None;
                true
            }
            _ => false,
        }
    }

    /// Removes `target` from the store, returning its session for logout.
    pub async fn take(&self, target: &str) -> Option<Arc<Session>> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots.remove(target)?
        };
        let mut guard = slot.lock().await;
        guard.take()
    }

    /// Addresses that currently have a slot.
    pub fn targets(&self) -> Vec<String> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.keys().cloned().collect()
    }
}
