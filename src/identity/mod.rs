// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Provider Seam
//!
//! The SSO handlers only need three things from whoever authenticates the
//! user: either hand over the claims of an authenticated session or a URL to
//! send the browser to, finish a login when the browser comes back, and end a
//! session. [`IdentityProvider`] is that contract; [`oidc::OidcIdentity`] is
//! the OpenID Connect implementation used in production.

pub mod error;
pub mod oidc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::session::SessionId;
pub use crate::sso::ClaimSet;
pub use error::IdentityError;
pub use oidc::OidcIdentity;

/// Outcome of asking for the current user's identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Authentication {
    /// The session is authenticated; these are its claims.
    Authenticated(ClaimSet),
    /// The browser has to visit this URL first.
    Redirect(String),
}

/// Outcome of ending a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The provider wants to see the browser (RP-initiated logout).
    Redirect(String),
    /// Local state is gone; nothing more to do.
    Complete,
}

/// Query parameters the provider sends back to the redirect URI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorizationResponse {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the session's claims, or where to send the browser so that it
    /// comes back to `return_to` authenticated.
    async fn authenticate(
        &self,
        session: &SessionId,
        return_to: &str,
    ) -> Result<Authentication, IdentityError>;

    /// Finishes a login started by [`authenticate`](Self::authenticate) and
    /// returns the `return_to` it was started with.
    async fn complete(
        &self,
        session: &SessionId,
        response: AuthorizationResponse,
    ) -> Result<String, IdentityError>;

    /// Forgets the session's identity.
    async fn logout(&self, session: &SessionId) -> Result<LogoutOutcome, IdentityError>;
}
