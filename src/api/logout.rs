// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::extract::State;
use tracing::{debug, warn};

use super::{Found, INDEX_PATH};
use crate::error::SsoError;
use crate::identity::LogoutOutcome;
use crate::session::BrowserSession;
use crate::state::AppState;

/// `GET /logout`: ends the identity session.
///
/// The provider may first want to see the browser; it sends it back here,
/// where the session is already gone and the user lands on the index.
pub async fn logout(
    State(state): State<AppState>,
    BrowserSession(session): BrowserSession,
) -> Result<Found, SsoError> {
    let outcome = state.identity.logout(&session).await.map_err(|err| {
        warn!(error = %err, error_code = err.error_code(), "Logout failed");
        err
    })?;

    match outcome {
        LogoutOutcome::Redirect(url) => {
            debug!(%session, "Redirecting to provider logout");
            Ok(Found(url))
        }
        LogoutOutcome::Complete => Ok(Found(INDEX_PATH.to_string())),
    }
}
