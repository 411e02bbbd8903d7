// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::BridgeConfig;
use crate::error::SsoError;
use crate::identity::IdentityProvider;
use crate::session::{HandshakeStore, SessionKeys};
use crate::sso::{AttributePolicy, Handshake, SharedSecret, DISCOURSE};

#[derive(Clone)]
pub struct AppState {
    pub handshake: Arc<Handshake>,
    pub identity: Arc<dyn IdentityProvider>,
    pub handshakes: HandshakeStore,
    pub session_keys: SessionKeys,
}

impl AppState {
    pub fn new(
        config: &BridgeConfig,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, SsoError> {
        let secret = SharedSecret::new(&config.discourse_secret_key)
            .map_err(|e| SsoError::Internal(format!("unusable DISCOURSE_SECRET_KEY: {e}")))?;
        let policy = AttributePolicy {
            rules: config.userinfo_sso_map.clone(),
            defaults: config.default_sso_attributes.clone(),
            vocabulary: DISCOURSE,
        };
        let session_keys = SessionKeys::derive(&config.secret_key, config.secure_cookies())
            .map_err(|e| SsoError::Internal(format!("unusable SECRET_KEY: {e}")))?;

        Ok(Self {
            handshake: Arc::new(Handshake::new(secret, policy, config.discourse_url.clone())),
            identity,
            handshakes: HandshakeStore::new(config.session_capacity, config.session_lifetime()),
            session_keys,
        })
    }
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        state.session_keys.clone()
    }
}
