// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Discourse SSO Core
//!
//! Everything between "the forum sent a signed request" and "the forum gets a
//! signed answer", with no dependency on the web framework:
//!
//! - `vocabulary` - the forum's attribute schema
//! - `signature` - HMAC-SHA256 sign / verify
//! - `payload` - base64 + percent-encoding codec
//! - `mapper` - claims → attributes, defaults
//! - `validator` - required attributes
//! - `handshake` - the two handshake transitions

use std::collections::BTreeMap;

use serde_json::Value;

pub mod handshake;
pub mod mapper;
pub mod payload;
pub mod signature;
pub mod validator;
pub mod vocabulary;

pub use handshake::{Completion, Handshake, HandshakeState, Nonce, Rejection};
pub use mapper::AttributePolicy;
pub use signature::SharedSecret;
pub use vocabulary::{Vocabulary, DISCOURSE};

/// Claims about the authenticated user, as supplied by the identity provider.
pub type ClaimSet = BTreeMap<String, Value>;

/// Forum attributes, ordered by key so encoding and signing see the same bytes.
pub type AttributeSet = BTreeMap<String, String>;

/// Explicit claim key → attribute key rules.
pub type MappingRules = BTreeMap<String, String>;

/// Attribute values used when the claims do not provide one.
pub type DefaultAttributes = BTreeMap<String, String>;
