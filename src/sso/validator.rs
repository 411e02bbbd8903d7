// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Required attribute enforcement.

use thiserror::Error;

use super::vocabulary::Vocabulary;
use super::AttributeSet;

/// The authenticated identity lacks one or more mandatory forum attributes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing required attributes: {}", .0.join(", "))]
pub struct MissingAttributes(pub Vec<&'static str>);

/// Every required attribute must be present with a non-empty value.
pub fn validate(
    attributes: &AttributeSet,
    vocabulary: &Vocabulary,
) -> Result<(), MissingAttributes> {
    let missing: Vec<&'static str> = vocabulary
        .required()
        .iter()
        .copied()
        .filter(|key| attributes.get(*key).map_or(true, |value| value.is_empty()))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingAttributes(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sso::vocabulary::DISCOURSE;

    fn attributes(pairs: &[(&str, &str)]) -> AttributeSet {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn complete_set_passes() {
        let set = attributes(&[("email", "a@b.c"), ("external_id", "42"), ("name", "")]);
        assert!(validate(&set, &DISCOURSE).is_ok());
    }

    #[test]
    fn reports_every_missing_attribute() {
        let err = validate(&attributes(&[("name", "x")]), &DISCOURSE).unwrap_err();
        assert_eq!(err, MissingAttributes(vec!["email", "external_id"]));
        assert_eq!(err.to_string(), "missing required attributes: email, external_id");
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let set = attributes(&[("email", ""), ("external_id", "42")]);
        assert_eq!(
            validate(&set, &DISCOURSE),
            Err(MissingAttributes(vec!["email"]))
        );
    }
}
