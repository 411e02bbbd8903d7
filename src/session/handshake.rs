// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-session storage of the verified forum payload between `/sso/login`
//! and `/sso/auth`.

use std::time::Duration;

use super::{SessionId, SessionTable};
use crate::sso::Nonce;

#[derive(Clone)]
pub struct HandshakeStore {
    nonces: SessionTable<Nonce>,
}

impl HandshakeStore {
    pub fn new(capacity: usize, lifetime: Duration) -> Self {
        Self {
            nonces: SessionTable::new(capacity, lifetime),
        }
    }

    /// Records the nonce for `session`, replacing any earlier one.
    ///
    /// The nonce is left in place after a successful login; the forum rejects
    /// a replayed nonce on its side.
    pub fn capture(&self, session: &SessionId, nonce: Nonce) {
        self.nonces.insert(*session, nonce);
    }

    pub fn nonce(&self, session: &SessionId) -> Option<Nonce> {
        self.nonces.get(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_capture_replaces_earlier() {
        let store = HandshakeStore::new(16, Duration::from_secs(60));
        let session = SessionId::new();

        assert!(store.nonce(&session).is_none());

        store.capture(&session, Nonce::new("nonce=1"));
        store.capture(&session, Nonce::new("nonce=2"));
        assert_eq!(store.nonce(&session), Some(Nonce::new("nonce=2")));
    }

    #[test]
    fn nonce_survives_reads() {
        let store = HandshakeStore::new(16, Duration::from_secs(60));
        let session = SessionId::new();

        store.capture(&session, Nonce::new("nonce=1"));
        assert!(store.nonce(&session).is_some());
        assert!(store.nonce(&session).is_some());
    }
}
