// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Discourse SSO Attribute Vocabulary
//!
//! The set of attribute names the Discourse SSO consumer understands. This is
//! a copy of Discourse's own schema (`lib/discourse_connect_base.rb`, formerly
//! `lib/single_sign_on.rb`) and must be kept in step with it by hand.
//!
//! | Table | Meaning |
//! |-------|---------|
//! | `ALL_ATTRIBUTES` | every accepted attribute |
//! | `BOOL_ATTRIBUTES` | attributes sent as the literal `true` / `false` |
//! | `REQUIRED_ATTRIBUTES` | attributes Discourse refuses to log in without |
//! | `REQUEST_ATTRIBUTES` | attributes the forum's own request carries |

/// Revision of the Discourse schema the tables below were taken from.
pub const VOCABULARY_VERSION: &str = "2019-02-24";

const ALL_ATTRIBUTES: &[&str] = &[
    "add_groups",
    "admin",
    "avatar_force_update",
    "avatar_url",
    "bio",
    "card_background_url",
    "email",
    "external_id",
    "groups",
    "locale",
    "locale_force_update",
    "moderator",
    "name",
    "nonce",
    "profile_background_url",
    "remove_groups",
    "require_activation",
    "return_sso_url",
    "suppress_welcome_message",
    "title",
    "username",
    "website",
];

const BOOL_ATTRIBUTES: &[&str] = &[
    "admin",
    "avatar_force_update",
    "locale_force_update",
    "moderator",
    "require_activation",
    "suppress_welcome_message",
];

const REQUIRED_ATTRIBUTES: &[&str] = &["email", "external_id"];

/// Already present in the echoed request payload; a second copy would let the
/// identity provider contradict the forum.
const REQUEST_ATTRIBUTES: &[&str] = &["nonce", "return_sso_url"];

/// A versioned attribute vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct Vocabulary {
    pub version: &'static str,
    all: &'static [&'static str],
    bools: &'static [&'static str],
    required: &'static [&'static str],
    request: &'static [&'static str],
}

/// The vocabulary of the Discourse SSO consumer.
pub const DISCOURSE: Vocabulary = Vocabulary {
    version: VOCABULARY_VERSION,
    all: ALL_ATTRIBUTES,
    bools: BOOL_ATTRIBUTES,
    required: REQUIRED_ATTRIBUTES,
    request: REQUEST_ATTRIBUTES,
};

impl Vocabulary {
    /// Whether `key` is an attribute the forum accepts.
    pub fn is_known(&self, key: &str) -> bool {
        self.all.contains(&key)
    }

    /// Whether `key` must be canonicalized to `true` / `false`.
    pub fn is_bool(&self, key: &str) -> bool {
        self.bools.contains(&key)
    }

    /// Whether `key` comes from the forum's request and must not be mapped.
    pub fn is_request_owned(&self, key: &str) -> bool {
        self.request.contains(&key)
    }

    pub fn required(&self) -> &'static [&'static str] {
        self.required
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        DISCOURSE
    }
}
