// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Requested-vs-offered contract checking.
//!
//! Determines whether a candidate's offered [`Contract`] can satisfy a
//! consumer's [`Requirement`]. Used by the checked and tracking adapters,
//! both on the synchronous fetch path and on every asynchronously-delivered
//! candidate.
//!
//! # Compatibility Rules
//!
//! | Policy    | Rule                                            |
//! |-----------|-------------------------------------------------|
//! | Scope     | Must match exactly                              |
//! | Api level | Offered level >= requested minimum              |
//! | Features  | Offered set must contain every requested feature|
//!
//! A mismatch is **terminal**: the candidate can never satisfy the request,
//! so the caller deletes the slot instead of retrying.

use log;

/// Visibility scope a candidate is offered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Visible to one application only.
    Private,
    /// Visible to every application on the host.
    Shared,
    /// Visible across the whole runtime, including system modules.
    Global,
}

/// What a consumer requires from a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Required visibility scope (exact match).
    pub scope: Scope,
    /// Minimum api level the candidate must offer.
    pub min_api_level: u32,
    /// Features the candidate must offer (subset semantics).
    pub features: Vec<String>,
}

impl Requirement {
    /// Requirement with no feature constraints at the given scope/level.
    pub fn new(scope: Scope, min_api_level: u32) -> Self {
        Self {
            scope,
            min_api_level,
            features: Vec::new(),
        }
    }

    /// Add a required feature (builder style).
    #[must_use]
    pub fn feature(mut self, name: impl Into<String>) -> Self {
        self.features.push(name.into());
        self
    }
}

/// What a candidate offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    /// Offered visibility scope.
    pub scope: Scope,
    /// Offered api level.
    pub api_level: u32,
    /// Offered feature set.
    pub features: Vec<String>,
}

impl Contract {
    /// Contract with no features at the given scope/level.
    pub fn new(scope: Scope, api_level: u32) -> Self {
        Self {
            scope,
            api_level,
            features: Vec::new(),
        }
    }

    /// Add an offered feature (builder style).
    #[must_use]
    pub fn feature(mut self, name: impl Into<String>) -> Self {
        self.features.push(name.into());
        self
    }
}

/// First policy that failed a compatibility check, with both sides' values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    /// Scopes differ.
    Scope { required: Scope, offered: Scope },
    /// Offered api level below the requested minimum.
    ApiLevel { required: u32, offered: u32 },
    /// A requested feature is not offered.
    MissingFeature(String),
}

impl std::fmt::Display for Mismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mismatch::Scope { required, offered } => {
                write!(f, "scope mismatch (required={required:?}, offered={offered:?})")
            }
            Mismatch::ApiLevel { required, offered } => {
                write!(f, "api level too low (required>={required}, offered={offered})")
            }
            Mismatch::MissingFeature(name) => write!(f, "missing feature '{name}'"),
        }
    }
}

impl std::error::Error for Mismatch {}

/// Check whether `offered` can satisfy `required`.
///
/// Returns the first failing policy. A failing check genuinely rejects —
/// the warn line is diagnostics, not the decision.
pub fn check(required: &Requirement, offered: &Contract) -> Result<(), Mismatch> {
    // 1. Scope must match exactly
    if required.scope != offered.scope {
        log::warn!(
            "[compat] scope mismatch (required={:?}, offered={:?})",
            required.scope,
            offered.scope
        );
        return Err(Mismatch::Scope {
            required: required.scope,
            offered: offered.scope,
        });
    }

    // 2. Offered api level >= requested minimum
    if offered.api_level < required.min_api_level {
        log::warn!(
            "[compat] api level too low (required>={}, offered={})",
            required.min_api_level,
            offered.api_level
        );
        return Err(Mismatch::ApiLevel {
            required: required.min_api_level,
            offered: offered.api_level,
        });
    }

    // 3. Offered features must contain every requested feature
    for feature in &required.features {
        if !offered.features.iter().any(|f| f == feature) {
            log::warn!("[compat] missing feature '{}'", feature);
            return Err(Mismatch::MissingFeature(feature.clone()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_contract_is_compatible() {
        let req = Requirement::new(Scope::Shared, 3).feature("spi");
        let offer = Contract::new(Scope::Shared, 3).feature("spi");
        assert_eq!(check(&req, &offer), Ok(()));
    }

    #[test]
    fn test_scope_must_match_exactly() {
        let req = Requirement::new(Scope::Shared, 1);
        let offer = Contract::new(Scope::Global, 1);
        assert_eq!(
            check(&req, &offer),
            Err(Mismatch::Scope {
                required: Scope::Shared,
                offered: Scope::Global,
            })
        );
    }

    #[test]
    fn test_higher_api_level_is_compatible() {
        let req = Requirement::new(Scope::Private, 2);
        let offer = Contract::new(Scope::Private, 5);
        assert_eq!(check(&req, &offer), Ok(()));
    }

    #[test]
    fn test_lower_api_level_is_rejected() {
        let req = Requirement::new(Scope::Private, 4);
        let offer = Contract::new(Scope::Private, 2);
        assert_eq!(
            check(&req, &offer),
            Err(Mismatch::ApiLevel {
                required: 4,
                offered: 2,
            })
        );
    }

    #[test]
    fn test_feature_subset_is_compatible() {
        let req = Requirement::new(Scope::Global, 1).feature("tx");
        let offer = Contract::new(Scope::Global, 1).feature("tx").feature("metrics");
        assert_eq!(check(&req, &offer), Ok(()));
    }

    #[test]
    fn test_missing_feature_is_rejected() {
        let req = Requirement::new(Scope::Global, 1).feature("tx").feature("ha");
        let offer = Contract::new(Scope::Global, 1).feature("tx");
        assert_eq!(check(&req, &offer), Err(Mismatch::MissingFeature("ha".into())));
    }

    #[test]
    fn test_no_required_features_matches_empty_offer() {
        let req = Requirement::new(Scope::Shared, 0);
        let offer = Contract::new(Scope::Shared, 0);
        assert_eq!(check(&req, &offer), Ok(()));
    }
}
