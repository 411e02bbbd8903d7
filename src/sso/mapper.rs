// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Claim → forum attribute mapping.
//!
//! Each claim key is resolved against, in order:
//!
//! 1. the operator's explicit rules (used as-is, no vocabulary check);
//! 2. a `discourse_`-namespaced claim naming a known attribute
//!    (`discourse_admin` → `admin`);
//! 3. the claim key itself when it is a known attribute.
//!
//! Anything else is dropped, as is any claim or default landing on an
//! attribute the forum's request already carries (`nonce`, `return_sso_url`).
//! Claims are visited in lexicographic key order, so when two claims land on
//! the same attribute the later key wins.

use std::borrow::Cow;

use serde_json::Value;

use super::vocabulary::Vocabulary;
use super::{AttributeSet, ClaimSet, DefaultAttributes, MappingRules};

const NAMESPACE_PREFIX: &str = "discourse_";

/// Everything needed to turn a claim set into forum attributes.
#[derive(Debug, Clone, Default)]
pub struct AttributePolicy {
    pub rules: MappingRules,
    pub defaults: DefaultAttributes,
    pub vocabulary: Vocabulary,
}

impl AttributePolicy {
    /// Maps `claims` and fills the gaps from the configured defaults.
    pub fn resolve(&self, claims: &ClaimSet) -> AttributeSet {
        let mut attributes = map_claims(claims, &self.rules, &self.vocabulary);
        apply_defaults(&mut attributes, &self.defaults);
        attributes.retain(|key, _| !self.vocabulary.is_request_owned(key));
        attributes
    }
}

/// Finds the forum attribute a claim key maps to, if any.
pub fn resolve_attribute<'a>(
    claim: &'a str,
    rules: &'a MappingRules,
    vocabulary: &Vocabulary,
) -> Option<Cow<'a, str>> {
    if let Some(target) = rules.get(claim).filter(|target| !target.is_empty()) {
        return Some(Cow::Borrowed(target.as_str()));
    }

    if let Some(attribute) = claim.strip_prefix(NAMESPACE_PREFIX) {
        if vocabulary.is_known(attribute) {
            return Some(Cow::Borrowed(attribute));
        }
    }

    vocabulary.is_known(claim).then_some(Cow::Borrowed(claim))
}

/// `"false"`, `"f"` and `"0"` (any case) are false, everything else is true.
pub fn canonical_bool(value: &str) -> &'static str {
    match value.to_ascii_lowercase().as_str() {
        "false" | "f" | "0" => "false",
        _ => "true",
    }
}

/// Renders a claim value as attribute text.
///
/// Arrays become comma separated lists so that multi-valued claims such as
/// group memberships arrive in the form the forum reads.
pub fn claim_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(claim_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

pub fn map_claims(
    claims: &ClaimSet,
    rules: &MappingRules,
    vocabulary: &Vocabulary,
) -> AttributeSet {
    let mut attributes = AttributeSet::new();

    for (claim, value) in claims {
        let Some(attribute) = resolve_attribute(claim, rules, vocabulary) else {
            continue;
        };
        if vocabulary.is_request_owned(&attribute) {
            continue;
        }

        let text = claim_text(value);
        let text = if vocabulary.is_bool(&attribute) {
            canonical_bool(&text).to_string()
        } else {
            text
        };

        attributes.insert(attribute.into_owned(), text);
    }

    attributes
}

/// Inserts defaults for keys the mapping did not produce. Never overrides.
pub fn apply_defaults(attributes: &mut AttributeSet, defaults: &DefaultAttributes) {
    for (key, value) in defaults {
        attributes
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}
