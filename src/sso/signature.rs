// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HMAC-SHA256 signing and verification of SSO payloads.
//!
//! The same primitive is used in both directions: inbound requests are
//! verified over the `sso` value exactly as received, outbound responses are
//! signed over the base64 form of the response query string.

use std::fmt;

use hmac::{digest::InvalidLength, Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Symmetric secret shared out-of-band with the forum.
///
/// The keyed MAC state is built once and cloned for every operation.
#[derive(Clone)]
pub struct SharedSecret {
    mac: HmacSha256,
}

impl SharedSecret {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, InvalidLength> {
        Ok(Self {
            mac: <HmacSha256 as Mac>::new_from_slice(secret.as_ref())?,
        })
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// Hex-encoded HMAC-SHA256 of `payload`.
pub fn sign(payload: &[u8], secret: &SharedSecret) -> String {
    let mut mac = secret.mac.clone();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks a hex signature against `payload` in constant time.
///
/// Only the lowercase form [`sign`] produces is accepted; anything else,
/// including uppercase hex, never verifies.
pub fn verify(payload: &[u8], signature: &str, secret: &SharedSecret) -> bool {
    if signature.bytes().any(|b| b.is_ascii_uppercase()) {
        return false;
    }
    let Ok(expected) = hex::decode(signature) else {
        return false;
    };

    let mut mac = secret.mac.clone();
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}
