// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_cookies::CookieManagerLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod callback;
pub mod health;
pub mod logout;
pub mod sso;

pub const INDEX_PATH: &str = "/";
/// Entry point the forum's SSO setting points at.
pub const LOGIN_PATH: &str = "/sso/login";
pub const AUTH_PATH: &str = "/sso/auth";
/// Must match the redirect URI registered with the identity provider.
pub const CALLBACK_PATH: &str = "/redirect_uri";
pub const LOGOUT_PATH: &str = "/logout";
pub const HEALTH_PATH: &str = "/health";

/// `302 Found` to the given location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found(pub String);

impl IntoResponse for Found {
    fn into_response(self) -> Response {
        (StatusCode::FOUND, [(header::LOCATION, self.0)]).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(INDEX_PATH, get(sso::index))
        .route(LOGIN_PATH, get(sso::login))
        .route(AUTH_PATH, get(sso::authorize))
        .route(CALLBACK_PATH, get(callback::redirect_uri))
        .route(LOGOUT_PATH, get(logout::logout))
        .route(HEALTH_PATH, get(health::health))
        .with_state(state)
        .layer(CookieManagerLayer::new())
        .layer(TraceLayer::new_for_http())
}
