// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity provider errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The callback arrived without a login started from this browser session
    #[error("no login in progress for this session")]
    NoPendingLogin,
    /// The callback's `state` does not match the one issued
    #[error("authorization state mismatch")]
    StateMismatch,
    /// The provider reported an error on the callback
    #[error("identity provider refused the login: {0}")]
    Denied(String),
    /// The callback carries neither an authorization code nor an error
    #[error("authorization response is missing the code")]
    MissingCode,
    /// The ID token failed verification
    #[error("ID token rejected: {0}")]
    InvalidToken(String),
    /// Discovery, token exchange or userinfo call failed
    #[error("identity provider request failed: {0}")]
    Provider(String),
    #[error("identity provider misconfigured: {0}")]
    Configuration(String),
}

#[derive(Serialize)]
struct IdentityErrorBody {
    error: String,
    error_code: String,
}

impl IdentityError {
    pub fn error_code(&self) -> &'static str {
        match self {
            IdentityError::NoPendingLogin => "no_pending_login",
            IdentityError::StateMismatch => "state_mismatch",
            IdentityError::Denied(_) => "access_denied",
            IdentityError::MissingCode => "missing_code",
            IdentityError::InvalidToken(_) => "invalid_token",
            IdentityError::Provider(_) => "provider_error",
            IdentityError::Configuration(_) => "configuration_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            IdentityError::NoPendingLogin
            | IdentityError::StateMismatch
            | IdentityError::Denied(_)
            | IdentityError::MissingCode
            | IdentityError::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            IdentityError::Provider(_) => StatusCode::BAD_GATEWAY,
            IdentityError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(IdentityErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
