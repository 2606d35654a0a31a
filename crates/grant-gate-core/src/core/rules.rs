// grant-gate-core/src/core/rules.rs
// ============================================================================
// Module: Policy Rules
// Description: RBAC-shaped permission rules and the coverage relation.
// Purpose: Decide whether one rule set fully implies another.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`PolicyRule`] grants verbs over API groups x resources (optionally
//! narrowed to resource names) or over non-resource URLs. Coverage is decided
//! by breaking the requested rules into atomic rules (one verb, one group, one
//! resource, at most one name) and requiring each atomic rule to be covered by
//! at least one held rule.
//!
//! A resource rule that omits `apiGroups` addresses the core group (`""`).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Wildcard matching every value of a rule dimension.
pub const WILDCARD: &str = "*";
/// API group name of the core group.
pub const CORE_API_GROUP: &str = "";

// ============================================================================
// SECTION: Policy Rule
// ============================================================================

/// RBAC-style permission grant.
///
/// # Invariants
/// - Dimensions are treated as sets; order only affects display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    /// Granted verbs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verbs: Vec<String>,
    /// API groups the rule applies to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_groups: Vec<String>,
    /// Resources the rule applies to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    /// Resource names; empty means every name.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,
    /// Non-resource URLs; a trailing `*` matches by prefix.
    #[serde(default, rename = "nonResourceURLs", skip_serializing_if = "Vec::is_empty")]
    pub non_resource_urls: Vec<String>,
}

/// Structural rule validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// The rule grants no verbs.
    #[error("rule must include at least one verb")]
    MissingVerbs,
    /// The rule names neither resources nor non-resource URLs.
    #[error("rule must include resources or nonResourceURLs")]
    MissingTargets,
    /// The rule mixes resource and non-resource targets.
    #[error("rule must not mix resources and nonResourceURLs")]
    MixedTargets,
}

impl PolicyRule {
    /// Creates an empty rule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with the given verbs.
    #[must_use]
    pub fn with_verbs<I, S>(mut self, verbs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.verbs = verbs.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a copy with the given API groups.
    #[must_use]
    pub fn with_api_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.api_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a copy with the given resources.
    #[must_use]
    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a copy with the given resource names.
    #[must_use]
    pub fn with_resource_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Returns a copy with the given non-resource URLs.
    #[must_use]
    pub fn with_non_resource_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.non_resource_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Validates the structural shape of the rule.
    ///
    /// # Errors
    ///
    /// Returns [`RuleError`] when the rule has no verbs or no targets.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.verbs.is_empty() {
            return Err(RuleError::MissingVerbs);
        }
        let has_resources = !self.resources.is_empty();
        let has_urls = !self.non_resource_urls.is_empty();
        match (has_resources, has_urls) {
            (false, false) => Err(RuleError::MissingTargets),
            (true, true) => Err(RuleError::MixedTargets),
            _ => Ok(()),
        }
    }

    /// Returns the API groups, defaulting resource rules to the core group.
    fn effective_api_groups(&self) -> Vec<&str> {
        if self.api_groups.is_empty() && !self.resources.is_empty() {
            vec![CORE_API_GROUP]
        } else {
            self.api_groups.iter().map(String::as_str).collect()
        }
    }

    /// Splits the rule into atomic rules of one verb and one target each.
    #[must_use]
    pub fn breakdown(&self) -> Vec<Self> {
        let mut atoms = Vec::new();
        for group in self.effective_api_groups() {
            for resource in &self.resources {
                for verb in &self.verbs {
                    let base = Self::new()
                        .with_api_groups([group])
                        .with_resources([resource.as_str()])
                        .with_verbs([verb.as_str()]);
                    if self.resource_names.is_empty() {
                        atoms.push(base);
                    } else {
                        for name in &self.resource_names {
                            atoms.push(base.clone().with_resource_names([name.as_str()]));
                        }
                    }
                }
            }
        }
        for url in &self.non_resource_urls {
            for verb in &self.verbs {
                atoms.push(
                    Self::new().with_non_resource_urls([url.as_str()]).with_verbs([verb.as_str()]),
                );
            }
        }
        atoms
    }

    /// Returns true when this held rule implies the requested rule.
    #[must_use]
    pub fn covers(&self, requested: &Self) -> bool {
        let verbs = has(&self.verbs, WILDCARD) || has_all(&self.verbs, &requested.verbs);
        let held_groups = self.effective_api_groups();
        let groups = held_groups.contains(&WILDCARD)
            || requested.effective_api_groups().iter().all(|group| held_groups.contains(group));
        let resources = resources_cover_all(&self.resources, &requested.resources);
        let urls = urls_cover_all(&self.non_resource_urls, &requested.non_resource_urls);
        let names = if requested.resource_names.is_empty() {
            self.resource_names.is_empty()
        } else {
            self.resource_names.is_empty()
                || has_all(&self.resource_names, &requested.resource_names)
        };
        verbs && groups && resources && names && urls
    }

    /// Returns true when the rule allows a single resource request.
    ///
    /// `resource` may carry a subresource as `resource/subresource`.
    #[must_use]
    pub fn allows(&self, verb: &str, api_group: &str, resource: &str, name: Option<&str>) -> bool {
        if self.resources.is_empty() {
            return false;
        }
        let verb_ok = has(&self.verbs, WILDCARD) || has(&self.verbs, verb);
        let groups = self.effective_api_groups();
        let group_ok = groups.contains(&WILDCARD) || groups.contains(&api_group);
        let resource_ok = self.resources.iter().any(|held| resource_matches(held, resource));
        let name_ok = match name {
            Some(name) => self.resource_names.is_empty() || has(&self.resource_names, name),
            None => self.resource_names.is_empty(),
        };
        verb_ok && group_ok && resource_ok && name_ok
    }
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.resources.is_empty() {
            let groups: Vec<String> =
                self.effective_api_groups().iter().map(|group| format!("\"{group}\"")).collect();
            parts.push(format!("apiGroups=[{}]", groups.join(",")));
            parts.push(format!("resources=[{}]", self.resources.join(",")));
        }
        if !self.resource_names.is_empty() {
            parts.push(format!("resourceNames=[{}]", self.resource_names.join(",")));
        }
        if !self.non_resource_urls.is_empty() {
            parts.push(format!("nonResourceURLs=[{}]", self.non_resource_urls.join(",")));
        }
        parts.push(format!("verbs=[{}]", self.verbs.join(",")));
        write!(f, "{{{}}}", parts.join(" "))
    }
}

// ============================================================================
// SECTION: Coverage
// ============================================================================

/// Returns the atomic requested rules that no held rule covers.
///
/// An empty result means `held` fully implies `requested`.
#[must_use]
pub fn uncovered_rules(held: &[PolicyRule], requested: &[PolicyRule]) -> Vec<PolicyRule> {
    let mut missing = Vec::new();
    for rule in requested {
        for atom in rule.breakdown() {
            if !held.iter().any(|owner| owner.covers(&atom)) {
                missing.push(atom);
            }
        }
    }
    missing
}

/// Returns true when `held` fully implies `requested`.
#[must_use]
pub fn covers(held: &[PolicyRule], requested: &[PolicyRule]) -> bool {
    uncovered_rules(held, requested).is_empty()
}

// ============================================================================
// SECTION: Matching Helpers
// ============================================================================

/// Returns true when `set` contains `value`.
fn has(set: &[String], value: &str) -> bool {
    set.iter().any(|item| item == value)
}

/// Returns true when `set` contains every entry of `values`.
fn has_all(set: &[String], values: &[String]) -> bool {
    values.iter().all(|value| has(set, value))
}

/// Returns true when the held resources cover every requested resource.
fn resources_cover_all(held: &[String], requested: &[String]) -> bool {
    if has(held, WILDCARD) {
        return true;
    }
    requested.iter().all(|path| {
        if has(held, path) {
            return true;
        }
        match path.split_once('/') {
            Some((_, subresource)) => has(held, &format!("*/{subresource}")),
            None => false,
        }
    })
}

/// Returns true when the held URLs cover every requested URL.
fn urls_cover_all(held: &[String], requested: &[String]) -> bool {
    requested.iter().all(|path| held.iter().any(|owner| url_covers(owner, path)))
}

/// Returns true when one held URL covers a requested URL.
fn url_covers(owner: &str, path: &str) -> bool {
    if owner == path {
        return true;
    }
    owner.strip_suffix('*').is_some_and(|prefix| path.starts_with(prefix.trim_end_matches('*')))
}

/// Returns true when a held resource entry matches a requested resource.
fn resource_matches(held: &str, requested: &str) -> bool {
    if held == WILDCARD || held == requested {
        return true;
    }
    match (requested.split_once('/'), held.strip_prefix("*/")) {
        (Some((_, subresource)), Some(held_sub)) => held_sub == subresource,
        _ => false,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
