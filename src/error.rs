// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::identity::IdentityError;
use crate::sso::Rejection;

/// Page shown when the user is authenticated but the login cannot proceed.
pub const FORBIDDEN_PAGE: &str = include_str!("../templates/403.html");

#[derive(Debug, Error)]
pub enum SsoError {
    /// Missing or forged request from the forum
    #[error("{0}")]
    BadRequest(String),
    /// No login in progress, or the identity lacks mandatory attributes
    #[error("{0}")]
    Forbidden(String),
    #[error(transparent)]
    Upstream(#[from] IdentityError),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl SsoError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            SsoError::BadRequest(_) => StatusCode::BAD_REQUEST,
            SsoError::Forbidden(_) => StatusCode::FORBIDDEN,
            SsoError::Upstream(err) => err.status_code(),
            SsoError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Rejection> for SsoError {
    fn from(rejection: Rejection) -> Self {
        if rejection.is_bad_request() {
            SsoError::BadRequest(rejection.to_string())
        } else {
            SsoError::Forbidden(rejection.to_string())
        }
    }
}

impl IntoResponse for SsoError {
    fn into_response(self) -> Response {
        match self {
            SsoError::Forbidden(_) => (StatusCode::FORBIDDEN, Html(FORBIDDEN_PAGE)).into_response(),
            SsoError::Upstream(err) => err.into_response(),
            other => {
                let status = other.status_code();
                let body = Json(ErrorBody {
                    error: other.to_string(),
                });
                (status, body).into_response()
            }
        }
    }
}
