// grant-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Grant Gate Interfaces
// Description: Backend-agnostic interfaces for caches, resolvers, and checks.
// Purpose: Define the contract surfaces consumed by rule resolution.
// Dependencies: crate::core, async-trait, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how Grant Gate reads platform state without owning it.
//! Caches are read-through snapshots kept fresh by an external watcher; the
//! core only reads them and registers secondary indexes. Not-found is a
//! distinct, expected outcome that callers decide whether to tolerate.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ObjectMeta;
use crate::core::PolicyRule;
use crate::core::UserInfo;

// ============================================================================
// SECTION: Caches
// ============================================================================

/// Cache lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The object does not exist.
    #[error("{kind} \"{name}\" not found")]
    NotFound {
        /// Object kind label.
        kind: &'static str,
        /// Requested key.
        name: String,
    },
    /// The requested index was never registered.
    #[error("index \"{0}\" does not exist")]
    UnknownIndex(String),
    /// An index with the same name is already registered.
    #[error("index \"{0}\" already exists")]
    DuplicateIndex(String),
    /// The backing store failed.
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheError {
    /// Returns true for the not-found outcome.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Secondary index function: maps an object to its index keys.
pub type IndexFn<T> = Arc<dyn Fn(&T) -> Vec<String> + Send + Sync>;

/// Label equality selector for cache listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Labels that must be present with the given values.
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Selector matching every object.
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// Returns true when the metadata satisfies the selector.
    #[must_use]
    pub fn matches(&self, meta: &ObjectMeta) -> bool {
        self.match_labels.iter().all(|(key, value)| meta.labels.get(key) == Some(value))
    }
}

/// Read-only cache of platform objects with secondary indexes.
pub trait ObjectCache<T>: Send + Sync {
    /// Returns the object stored under `key` (`name` or `namespace/name`).
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::NotFound`] when absent, or a backend error.
    fn get(&self, key: &str) -> Result<T, CacheError>;

    /// Lists objects whose labels satisfy the selector.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] when the backend fails.
    fn list(&self, selector: &LabelSelector) -> Result<Vec<T>, CacheError>;

    /// Returns the objects stored under `key` in the named index.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnknownIndex`] when the index is missing.
    fn get_by_index(&self, index: &str, key: &str) -> Result<Vec<T>, CacheError>;

    /// Registers a secondary index. Existing objects are indexed immediately.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::DuplicateIndex`] when the name is taken.
    fn add_indexer(&self, name: &str, index: IndexFn<T>) -> Result<(), CacheError>;
}

/// Registers an index unless one with the same name already exists.
///
/// # Errors
///
/// Returns [`CacheError`] for failures other than a duplicate name.
pub fn ensure_indexer<T>(
    cache: &dyn ObjectCache<T>,
    name: &str,
    index: IndexFn<T>,
) -> Result<(), CacheError> {
    match cache.add_indexer(name, index) {
        Ok(()) | Err(CacheError::DuplicateIndex(_)) => Ok(()),
        Err(err) => Err(err),
    }
}

// ============================================================================
// SECTION: Rule Resolution
// ============================================================================

/// Rule resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A referenced role template does not exist.
    #[error("role template \"{0}\" not found")]
    TemplateNotFound(String),
    /// A cluster role backing an external template does not exist.
    #[error("cluster role \"{0}\" not found")]
    ClusterRoleNotFound(String),
    /// A global role does not exist.
    #[error("global role \"{0}\" not found")]
    GlobalRoleNotFound(String),
    /// An inherited cluster role of a global role failed to resolve.
    #[error("unable to resolve rules for role template \"{name}\": {source}")]
    InheritedTemplate {
        /// Inherited template name.
        name: String,
        /// Underlying failure.
        #[source]
        source: Box<ResolveError>,
    },
    /// A cache read failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// Several resolvers failed.
    #[error("{}", join_errors(.0))]
    Aggregate(Vec<ResolveError>),
}

impl ResolveError {
    /// Returns true when the failure stems from a missing object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::TemplateNotFound(_)
            | Self::ClusterRoleNotFound(_)
            | Self::GlobalRoleNotFound(_) => true,
            Self::InheritedTemplate {
                source, ..
            } => source.is_not_found(),
            Self::Cache(err) => err.is_not_found(),
            Self::Aggregate(errors) => errors.iter().all(Self::is_not_found),
        }
    }
}

/// Joins aggregated errors into one message.
fn join_errors(errors: &[ResolveError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Rules gathered from one or more sources, with per-source failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRules {
    /// Rules that resolved successfully.
    pub rules: Vec<PolicyRule>,
    /// Failures from sources that could not be resolved.
    pub errors: Vec<ResolveError>,
}

impl ResolvedRules {
    /// Keeps the rules of a source that resolved and records one that failed.
    pub fn absorb<E: Into<ResolveError>>(&mut self, result: Result<Vec<PolicyRule>, E>) {
        match result {
            Ok(rules) => self.rules.extend(rules),
            Err(err) => self.errors.push(err.into()),
        }
    }

    /// Converts into a strict result, failing when any source failed.
    ///
    /// # Errors
    ///
    /// Returns the single failure, or [`ResolveError::Aggregate`] for several.
    pub fn into_result(mut self) -> Result<Vec<PolicyRule>, ResolveError> {
        match self.errors.len() {
            0 => Ok(self.rules),
            1 => Err(self.errors.remove(0)),
            _ => Err(ResolveError::Aggregate(self.errors)),
        }
    }
}

/// Answers "which rules does this principal hold at this scope".
pub trait RuleResolver: Send + Sync {
    /// Returns the rules `user` holds at `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when a source cannot be resolved.
    fn rules_for(&self, user: &UserInfo, scope: &str) -> Result<Vec<PolicyRule>, ResolveError>;

    /// Returns the rules `user` holds at `scope`, keeping partial results.
    fn resolve(&self, user: &UserInfo, scope: &str) -> ResolvedRules {
        match self.rules_for(user, scope) {
            Ok(rules) => ResolvedRules {
                rules,
                errors: Vec::new(),
            },
            Err(err) => ResolvedRules {
                rules: Vec::new(),
                errors: vec![err],
            },
        }
    }
}

// ============================================================================
// SECTION: Permission Checks
// ============================================================================

/// Live permission check request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessReview {
    /// Requester identity.
    pub user: UserInfo,
    /// Verb being checked.
    pub verb: String,
    /// API group of the resource.
    pub api_group: String,
    /// Resource type.
    pub resource: String,
    /// Scope (namespace) of the check; empty for cluster-wide.
    pub scope: String,
    /// Optional resource name.
    #[serde(default)]
    pub name: Option<String>,
}

impl fmt::Display for AccessReview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{} in \"{}\" for \"{}\"",
            self.verb, self.resource, self.api_group, self.scope, self.user.username
        )
    }
}

/// Permission check errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionCheckError {
    /// The checker could not be reached or failed.
    #[error("permission check transport error: {0}")]
    Transport(String),
    /// The checker failed to resolve the requester's rules.
    #[error("permission check resolution error: {0}")]
    Resolution(#[from] ResolveError),
}

/// Live permission checker (for example a subject access review client).
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Returns whether the review is allowed.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionCheckError`] when the check cannot be answered.
    async fn check(&self, review: &AccessReview) -> Result<bool, PermissionCheckError>;
}
