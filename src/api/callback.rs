// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::extract::{Query, State};
use tracing::warn;

use super::Found;
use crate::error::SsoError;
use crate::identity::AuthorizationResponse;
use crate::session::BrowserSession;
use crate::state::AppState;

/// `GET /redirect_uri`: the identity provider's callback.
pub async fn redirect_uri(
    State(state): State<AppState>,
    BrowserSession(session): BrowserSession,
    Query(response): Query<AuthorizationResponse>,
) -> Result<Found, SsoError> {
    let return_to = state
        .identity
        .complete(&session, response)
        .await
        .map_err(|err| {
            warn!(error = %err, error_code = err.error_code(), "OpenID callback failed");
            err
        })?;

    Ok(Found(return_to))
}
