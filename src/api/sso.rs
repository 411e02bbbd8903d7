// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Forum-facing SSO endpoints.

use axum::extract::{Query, State};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Found, AUTH_PATH};
use crate::error::SsoError;
use crate::identity::Authentication;
use crate::session::BrowserSession;
use crate::sso::{HandshakeState, Rejection};
use crate::state::AppState;

/// Query the forum sends to `/sso/login`.
#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub sso: Option<String>,
    pub sig: Option<String>,
}

fn log_rejection(rejection: Rejection) -> Rejection {
    debug!(state = %rejection.state(), reason = %rejection, "SSO handshake rejected");
    rejection
}

/// `GET /` sends stray visitors to the forum.
pub async fn index(State(state): State<AppState>) -> Found {
    Found(state.handshake.forum_url().to_string())
}

/// `GET /sso/login`: verifies the forum's signed request and remembers it
/// for this browser session.
pub async fn login(
    State(state): State<AppState>,
    BrowserSession(session): BrowserSession,
    Query(query): Query<LoginQuery>,
) -> Result<Found, SsoError> {
    let nonce = state
        .handshake
        .begin(query.sso.as_deref(), query.sig.as_deref())
        .map_err(log_rejection)?;

    state.handshakes.capture(&session, nonce);
    debug!(%session, state = %HandshakeState::NonceCaptured, "SSO nonce captured");

    Ok(Found(AUTH_PATH.to_string()))
}

/// `GET /sso/auth`: authenticates the user, then answers the forum with the
/// signed attribute payload.
pub async fn authorize(
    State(state): State<AppState>,
    BrowserSession(session): BrowserSession,
) -> Result<Found, SsoError> {
    let authentication = state
        .identity
        .authenticate(&session, AUTH_PATH)
        .await
        .map_err(|err| {
            warn!(error = %err, error_code = err.error_code(), "Identity provider unavailable");
            err
        })?;

    let claims = match authentication {
        Authentication::Redirect(url) => return Ok(Found(url)),
        Authentication::Authenticated(claims) => claims,
    };

    let nonce = state.handshakes.nonce(&session);
    let completion = state
        .handshake
        .complete(nonce.as_ref(), &claims)
        .map_err(log_rejection)?;

    debug!(
        %session,
        state = %HandshakeState::Completed,
        external_id = completion.attributes.get("external_id").map(String::as_str),
        "SSO login completed"
    );

    Ok(Found(completion.redirect))
}
