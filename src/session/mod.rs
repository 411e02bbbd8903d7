// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Browser Sessions
//!
//! A browser is identified by a random id in a signed cookie. Server-side
//! state lives in [`SessionTable`]s keyed by that id; each owner keeps its own
//! table, so the handshake state and the identity provider's state never
//! share a namespace.

pub mod handshake;

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
};
use hkdf::Hkdf;
use lru::LruCache;
use sha2::Sha256;
use tower_cookies::{cookie::SameSite, Cookie, Cookies, Key};
use uuid::Uuid;

pub use handshake::HandshakeStore;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "discourse_sso_session";

const COOKIE_KEY_INFO: &[u8] = b"discourse-sso-bridge session cookie";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Signing key and attributes of the session cookie.
#[derive(Clone)]
pub struct SessionKeys {
    key: Key,
    secure: bool,
}

impl SessionKeys {
    /// Derives a 64-byte cookie key from an arbitrary-length secret.
    pub fn derive(secret: &str, secure: bool) -> Result<Self, hkdf::InvalidLength> {
        let hkdf = Hkdf::<Sha256>::new(None, secret.as_bytes());
        let mut key_bytes = [0u8; 64];
        hkdf.expand(COOKIE_KEY_INFO, &mut key_bytes)?;

        Ok(Self {
            key: Key::from(&key_bytes),
            secure,
        })
    }

    /// Returns the session id carried by the request, issuing a new one when
    /// the cookie is absent or its signature does not check out.
    pub fn resolve(&self, cookies: &Cookies) -> SessionId {
        let signed = cookies.signed(&self.key);

        if let Some(id) = signed
            .get(SESSION_COOKIE)
            .and_then(|cookie| cookie.value().parse::<Uuid>().ok())
        {
            return SessionId(id);
        }

        let id = SessionId::new();
        signed.add(
            Cookie::build((SESSION_COOKIE, id.to_string()))
                .path("/")
                .http_only(true)
                .secure(self.secure)
                .same_site(SameSite::Lax)
                .build(),
        );
        id
    }
}

/// Axum extractor for the caller's session id.
///
/// Requires `tower_cookies::CookieManagerLayer` on the router.
#[derive(Debug, Clone, Copy)]
pub struct BrowserSession(pub SessionId);

impl<S> FromRequestParts<S> for BrowserSession
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let cookies = Cookies::from_request_parts(parts, state).await?;
        let keys = SessionKeys::from_ref(state);
        Ok(BrowserSession(keys.resolve(&cookies)))
    }
}

struct Entry<T> {
    value: T,
    inserted_at: Instant,
}

/// In-memory per-session storage, bounded in both size and age.
///
/// The least recently used session is evicted once `capacity` is reached;
/// entries older than the lifetime are dropped when read.
pub struct SessionTable<T> {
    entries: Arc<Mutex<LruCache<SessionId, Entry<T>>>>,
    lifetime: Duration,
}

impl<T> Clone for SessionTable<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            lifetime: self.lifetime,
        }
    }
}

impl<T: Clone> SessionTable<T> {
    pub fn new(capacity: usize, lifetime: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Arc::new(Mutex::new(LruCache::new(capacity))),
            lifetime,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<SessionId, Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: &SessionId) -> Option<T> {
        let mut entries = self.lock();
        if let Some(entry) = entries.get(id) {
            if entry.inserted_at.elapsed() < self.lifetime {
                return Some(entry.value.clone());
            }
            entries.pop(id);
        }
        None
    }

    /// Stores `value`, restarting the session's lifetime.
    pub fn insert(&self, id: SessionId, value: T) {
        self.lock().put(
            id,
            Entry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, id: &SessionId) -> Option<T> {
        self.lock().pop(id).map(|entry| entry.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn table_round_trip() {
        let table = SessionTable::new(16, HOUR);
        let id = SessionId::new();

        assert!(table.get(&id).is_none());
        table.insert(id, "value".to_string());
        assert_eq!(table.get(&id).as_deref(), Some("value"));
        assert_eq!(table.remove(&id).as_deref(), Some("value"));
        assert!(table.get(&id).is_none());
    }

    #[test]
    fn sessions_are_isolated() {
        let table = SessionTable::new(16, HOUR);
        let a = SessionId::new();
        let b = SessionId::new();

        table.insert(a, 1u32);
        assert_eq!(table.get(&a), Some(1));
        assert_eq!(table.get(&b), None);
    }

    #[test]
    fn expired_entries_are_hidden() {
        let table = SessionTable::new(16, Duration::from_millis(1));
        let id = SessionId::new();

        table.insert(id, 1u32);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(table.get(&id), None);
    }

    #[test]
    fn cookieless_flood_is_bounded_by_capacity() {
        let table = SessionTable::new(100, HOUR);
        let first = SessionId::new();
        table.insert(first, 0u32);

        let mut last = first;
        for n in 1..50_000u32 {
            last = SessionId::new();
            table.insert(last, n);
        }

        assert_eq!(table.get(&first), None);
        assert_eq!(table.get(&last), Some(49_999));
        assert_eq!(table.lock().len(), 100);
    }

    #[test]
    fn recently_used_sessions_survive_eviction() {
        let table = SessionTable::new(2, HOUR);
        let (a, b, c) = (SessionId::new(), SessionId::new(), SessionId::new());

        table.insert(a, 'a');
        table.insert(b, 'b');
        assert_eq!(table.get(&a), Some('a'));
        table.insert(c, 'c');

        assert_eq!(table.get(&a), Some('a'));
        assert_eq!(table.get(&b), None);
        assert_eq!(table.get(&c), Some('c'));
    }

    #[test]
    fn cookie_key_derivation_is_deterministic() {
        let a = SessionKeys::derive("dummy_secret_key", true).unwrap();
        let b = SessionKeys::derive("dummy_secret_key", true).unwrap();
        let c = SessionKeys::derive("another", true).unwrap();
        assert_eq!(a.key.master(), b.key.master());
        assert_ne!(a.key.master(), c.key.master());
    }
}
