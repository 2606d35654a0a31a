// grant-gate-core/src/runtime/circular.rs
// ============================================================================
// Module: Circular Reference Detection
// Description: Cycle detection over the role template inheritance graph.
// Purpose: Reject templates that inherit themselves or are still inherited.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! A depth-first walk starts from the submitted template (not the cached
//! copy, which may be stale or absent) and follows inherited names. Templates
//! on the current path are in progress; a reference back to one of them is a
//! cycle, and the referencing template is returned as the conflict. This
//! covers cycles that never return to the submitted template, such as
//! `a -> b -> c -> b`. A missing template anywhere along the walk is an error,
//! so a dangling reference is never mistaken for an acyclic graph.
//!
//! The reverse edges are kept in the [`RT_BY_INHERITED_INDEX`] index so a
//! template that is still inherited can be found without a full scan.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::core::RoleTemplate;
use crate::interfaces::CacheError;
use crate::interfaces::IndexFn;
use crate::interfaces::ObjectCache;
use crate::interfaces::ensure_indexer;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Role template index keyed by inherited template name.
pub const RT_BY_INHERITED_INDEX: &str = "rt-by-inherited";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Cycle detection errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CircularRefError {
    /// An inherited template does not exist.
    #[error("role template \"{0}\" not found")]
    TemplateNotFound(String),
    /// A cache read failed.
    #[error(transparent)]
    Cache(CacheError),
}

// ============================================================================
// SECTION: Detection
// ============================================================================

/// Walk state of a template name.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    /// On the current path.
    InProgress,
    /// Fully explored without finding a cycle.
    Done,
}

/// Returns the template that closes a cycle reachable from `template`, if any.
///
/// Self-reference returns `template` itself. For a cycle through `template`
/// the conflict is the template that re-references it.
///
/// # Errors
///
/// Returns [`CircularRefError`] when an inherited template is missing or a
/// lookup fails.
pub fn check_circular_ref(
    templates: &dyn ObjectCache<RoleTemplate>,
    template: &RoleTemplate,
) -> Result<Option<RoleTemplate>, CircularRefError> {
    let mut visits = BTreeMap::from([(template.name().to_string(), Visit::InProgress)]);
    let mut path: Vec<(RoleTemplate, usize)> = vec![(template.clone(), 0)];

    while let Some((current, next)) = path.last_mut() {
        let Some(name) = current.role_template_names.get(*next).cloned() else {
            visits.insert(current.name().to_string(), Visit::Done);
            path.pop();
            continue;
        };
        *next += 1;
        match visits.get(&name) {
            Some(Visit::InProgress) => return Ok(Some(current.clone())),
            Some(Visit::Done) => continue,
            None => {}
        }
        let inherited = templates.get(&name).map_err(|err| {
            if err.is_not_found() {
                CircularRefError::TemplateNotFound(name.clone())
            } else {
                CircularRefError::Cache(err)
            }
        })?;
        visits.insert(name, Visit::InProgress);
        path.push((inherited, 0));
    }
    Ok(None)
}

// ============================================================================
// SECTION: Reverse References
// ============================================================================

/// Index function mapping a template to the names it inherits.
fn inherited_names(template: &RoleTemplate) -> Vec<String> {
    template.role_template_names.clone()
}

/// Registers the inherited-name index on the template cache.
///
/// # Errors
///
/// Returns [`CacheError`] when the index cannot be registered.
pub fn register_inherited_index(templates: &dyn ObjectCache<RoleTemplate>) -> Result<(), CacheError> {
    let index: IndexFn<RoleTemplate> = Arc::new(inherited_names);
    ensure_indexer(templates, RT_BY_INHERITED_INDEX, index)
}

/// Returns the names of templates that directly inherit `name`, sorted.
///
/// # Errors
///
/// Returns [`CacheError::UnknownIndex`] when [`register_inherited_index`] was
/// never called for this cache.
pub fn templates_inheriting(
    templates: &dyn ObjectCache<RoleTemplate>,
    name: &str,
) -> Result<Vec<String>, CacheError> {
    let mut names: Vec<String> = templates
        .get_by_index(RT_BY_INHERITED_INDEX, name)?
        .into_iter()
        .map(|template| template.metadata.name)
        .filter(|inheritor| inheritor != name)
        .collect();
    names.sort();
    Ok(names)
}
