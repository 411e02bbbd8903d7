// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Discourse SSO Bridge - OpenID Connect login for Discourse forums
//!
//! The forum hands the browser a signed SSO request; the bridge verifies it,
//! authenticates the user against an OpenID Connect provider, maps the
//! provider's claims onto the forum's attribute vocabulary and sends the
//! browser back with a signed answer.
//!
//! ## Modules
//!
//! - `api` - HTTP handlers and router (Axum)
//! - `config` - Layered runtime configuration
//! - `identity` - Identity provider seam and the OpenID Connect client
//! - `session` - Browser sessions and per-session storage
//! - `sso` - Discourse SSO protocol core (signing, codec, mapping)

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod session;
pub mod sso;
pub mod state;
