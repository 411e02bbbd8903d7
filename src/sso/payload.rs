// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! SSO payload codec.
//!
//! Wire format, outbound:
//!
//! 1. query string `<nonce>&key=<quoted value>&...`
//! 2. `sso` = base64 of the query string
//! 3. `sig` = hex HMAC-SHA256 over the base64 text (not the plain query)
//! 4. `sso` is percent-encoded once more for the redirect URL
//!
//! Inbound is the mirror image: the signature is checked over `sso` as it
//! arrived and only then is it base64-decoded.

use base64ct::{Base64, Encoding};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use thiserror::Error;

use super::signature::{sign, verify, SharedSecret};
use super::AttributeSet;

/// Characters left untouched by [`quote`]: alphanumerics plus `_ . - ~ /`.
const QUOTE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'_')
    .remove(b'.')
    .remove(b'-')
    .remove(b'~')
    .remove(b'/');

/// Path on the forum that consumes a signed SSO response.
pub const FORUM_LOGIN_PATH: &str = "/session/sso_login";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("signature does not match payload")]
    BadSignature,
    #[error("payload is not valid base64")]
    InvalidBase64,
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,
}

/// Percent-encodes a value the way the forum's SSO consumer expects.
pub fn quote(value: &str) -> String {
    utf8_percent_encode(value, QUOTE_SET).to_string()
}

pub fn encode(query: &str) -> String {
    Base64::encode_string(query.as_bytes())
}

/// Decodes an `sso` value into the query string it carries.
///
/// ASCII whitespace is ignored; the forum's encoder wraps long output.
pub fn decode(sso: &str) -> Result<String, PayloadError> {
    let compact: String = sso.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = Base64::decode_vec(&compact).map_err(|_| PayloadError::InvalidBase64)?;
    String::from_utf8(bytes).map_err(|_| PayloadError::InvalidUtf8)
}

/// Verifies an inbound `sso`/`sig` pair and returns the decoded query string.
pub fn open(sso: &str, sig: &str, secret: &SharedSecret) -> Result<String, PayloadError> {
    if !verify(sso.as_bytes(), sig, secret) {
        return Err(PayloadError::BadSignature);
    }
    decode(sso)
}

/// Builds the response query string: the nonce payload followed by each
/// attribute as `&key=quoted-value`, in the attribute set's order.
pub fn build_query(nonce: &str, attributes: &AttributeSet) -> String {
    let mut query = String::from(nonce);
    for (key, value) in attributes {
        query.push('&');
        query.push_str(key);
        query.push('=');
        query.push_str(&quote(value));
    }
    query
}

/// A base64 payload together with its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    /// Base64 text, before transport encoding.
    pub sso: String,
    pub sig: String,
}

impl SignedPayload {
    pub fn seal(query: &str, secret: &SharedSecret) -> Self {
        let sso = encode(query);
        let sig = sign(sso.as_bytes(), secret);
        Self { sso, sig }
    }

    /// Redirect target on the forum carrying this payload.
    pub fn login_url(&self, forum_url: &str) -> String {
        format!(
            "{}{}?sso={}&sig={}",
            forum_url.trim_end_matches('/'),
            FORUM_LOGIN_PATH,
            quote(&self.sso),
            self.sig
        )
    }
}
