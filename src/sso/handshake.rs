// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The two halves of the SSO handshake, free of any HTTP or session types.
//!
//! ```text
//! Idle ──begin──▶ NonceCaptured ──(identity provider)──▶ AttributesResolved ──complete──▶ Completed
//!   └──────────────────────────────── any failure ─────────────────────────────────────▶ Rejection
//! ```
//!
//! The handlers in `api::sso` own the transport: they persist the nonce
//! between the two calls and turn the results into redirects.

use std::fmt;

use thiserror::Error;

use super::mapper::AttributePolicy;
use super::payload::{self, PayloadError, SignedPayload};
use super::signature::SharedSecret;
use super::validator::{validate, MissingAttributes};
use super::{AttributeSet, ClaimSet};

/// Position of a login attempt in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    NonceCaptured,
    Authenticating,
    AttributesResolved,
    Completed,
}

impl HandshakeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeState::Idle => "idle",
            HandshakeState::NonceCaptured => "nonce_captured",
            HandshakeState::Authenticating => "authenticating",
            HandshakeState::AttributesResolved => "attributes_resolved",
            HandshakeState::Completed => "completed",
        }
    }
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The decoded inbound payload, carried from login to callback.
///
/// Despite the name this is the whole decoded query string the forum sent,
/// not just its `nonce` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    pub fn new(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Why a handshake was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("missing `sso` or `sig` parameter")]
    MissingParameters,
    #[error("invalid SSO payload: {0}")]
    InvalidPayload(#[from] PayloadError),
    #[error("no verified SSO login in progress for this session")]
    MissingNonce,
    #[error("authenticated identity lacks forum attributes: {0}")]
    MissingAttributes(#[from] MissingAttributes),
}

impl Rejection {
    /// State the attempt was in when it was refused.
    pub fn state(&self) -> HandshakeState {
        match self {
            Rejection::MissingParameters | Rejection::InvalidPayload(_) => HandshakeState::Idle,
            Rejection::MissingNonce => HandshakeState::Authenticating,
            Rejection::MissingAttributes(_) => HandshakeState::AttributesResolved,
        }
    }

    /// Refused before the login was accepted (a malformed or forged request),
    /// as opposed to after the user authenticated.
    pub fn is_bad_request(&self) -> bool {
        self.state() == HandshakeState::Idle
    }
}

/// Result of a completed handshake.
#[derive(Debug, Clone)]
pub struct Completion {
    pub attributes: AttributeSet,
    /// Forum URL the browser is sent to.
    pub redirect: String,
}

/// Configured SSO handshake for one forum.
#[derive(Debug, Clone)]
pub struct Handshake {
    secret: SharedSecret,
    policy: AttributePolicy,
    forum_url: String,
}

impl Handshake {
    pub fn new(
        secret: SharedSecret,
        policy: AttributePolicy,
        forum_url: impl Into<String>,
    ) -> Self {
        Self {
            secret,
            policy,
            forum_url: forum_url.into(),
        }
    }

    pub fn forum_url(&self) -> &str {
        &self.forum_url
    }

    /// `Idle → NonceCaptured`: verifies the forum's request and extracts the nonce.
    pub fn begin(&self, sso: Option<&str>, sig: Option<&str>) -> Result<Nonce, Rejection> {
        let (Some(sso), Some(sig)) = (
            sso.filter(|value| !value.is_empty()),
            sig.filter(|value| !value.is_empty()),
        ) else {
            return Err(Rejection::MissingParameters);
        };

        let decoded = payload::open(sso, sig, &self.secret)?;
        Ok(Nonce::new(decoded))
    }

    /// `AttributesResolved → Completed`: maps the claims, checks them and signs
    /// the answer for the forum.
    pub fn complete(
        &self,
        nonce: Option<&Nonce>,
        claims: &ClaimSet,
    ) -> Result<Completion, Rejection> {
        let nonce = nonce.ok_or(Rejection::MissingNonce)?;

        let attributes = self.policy.resolve(claims);
        validate(&attributes, &self.policy.vocabulary)?;

        let query = payload::build_query(nonce.as_str(), &attributes);
        let redirect = SignedPayload::seal(&query, &self.secret).login_url(&self.forum_url);

        Ok(Completion {
            attributes,
            redirect,
        })
    }
}
