// grant-gate-core/src/runtime/template.rs
// ============================================================================
// Module: Role Template Resolver
// Description: Flattens role templates and their inheritance into rules.
// Purpose: Produce the full rule set granted by a role template.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Resolution walks the inheritance graph depth-first with an explicit stack,
//! appending each template's rules in visitation order. A `seen` set bounds
//! the walk to each template once; it guarantees termination, not acyclicity,
//! so templates are checked with [`crate::runtime::check_circular_ref`] before
//! they are admitted. Missing templates or cluster roles abort the whole
//! resolution; partial rule sets are never returned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::ClusterRole;
use crate::core::Feature;
use crate::core::PolicyRule;
use crate::core::RoleTemplate;
use crate::core::TemplateContext;
use crate::interfaces::CacheError;
use crate::interfaces::ObjectCache;
use crate::interfaces::ResolveError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Feature flag enabling explicit rules on external templates.
pub const EXTERNAL_RULES_FEATURE: &str = "external-rules";

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Flattens role templates into policy rules.
#[derive(Clone)]
pub struct RoleTemplateResolver {
    /// Role template lookup.
    templates: Arc<dyn ObjectCache<RoleTemplate>>,
    /// Cluster role lookup for external templates.
    cluster_roles: Arc<dyn ObjectCache<ClusterRole>>,
    /// Feature flag lookup.
    features: Arc<dyn ObjectCache<Feature>>,
    /// Value used when the external-rules feature object is absent.
    external_rules_default: bool,
}

impl RoleTemplateResolver {
    /// Creates a resolver over the given lookups.
    #[must_use]
    pub fn new(
        templates: Arc<dyn ObjectCache<RoleTemplate>>,
        cluster_roles: Arc<dyn ObjectCache<ClusterRole>>,
        features: Arc<dyn ObjectCache<Feature>>,
    ) -> Self {
        Self {
            templates,
            cluster_roles,
            features,
            external_rules_default: false,
        }
    }

    /// Returns a copy using `enabled` when the feature object is absent.
    #[must_use]
    pub const fn with_external_rules_default(mut self, enabled: bool) -> Self {
        self.external_rules_default = enabled;
        self
    }

    /// Returns the role template lookup.
    #[must_use]
    pub fn template_cache(&self) -> &Arc<dyn ObjectCache<RoleTemplate>> {
        &self.templates
    }

    /// Looks up a template by name and flattens it.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::TemplateNotFound`] when the template or any
    /// inherited template is missing.
    pub fn rules_from_template_name(&self, name: &str) -> Result<Vec<PolicyRule>, ResolveError> {
        let template = self.lookup_template(name)?;
        self.rules_from_template(&template)
    }

    /// Flattens a template and everything it inherits.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError`] when an inherited template or a required
    /// cluster role is missing, or when a lookup fails.
    pub fn rules_from_template(
        &self,
        template: &RoleTemplate,
    ) -> Result<Vec<PolicyRule>, ResolveError> {
        let mut rules = Vec::new();
        let mut seen = BTreeSet::new();
        let mut external_rules_enabled = None;
        let mut stack: Vec<RoleTemplate> = vec![template.clone()];

        while let Some(current) = stack.pop() {
            if !seen.insert(current.name().to_string()) {
                continue;
            }
            if current.external {
                let enabled = match external_rules_enabled {
                    Some(enabled) => enabled,
                    None => {
                        let enabled = self.external_rules_enabled()?;
                        external_rules_enabled = Some(enabled);
                        enabled
                    }
                };
                rules.extend(self.external_rules(&current, enabled)?);
            }
            rules.extend(current.rules.iter().cloned());

            let mut children = Vec::with_capacity(current.role_template_names.len());
            for name in &current.role_template_names {
                if seen.contains(name) {
                    continue;
                }
                children.push(self.lookup_template(name)?);
            }
            stack.extend(children.into_iter().rev());
        }
        Ok(rules)
    }

    /// Returns the implicit rules contributed by an external template.
    fn external_rules(
        &self,
        template: &RoleTemplate,
        external_rules_enabled: bool,
    ) -> Result<Vec<PolicyRule>, ResolveError> {
        if external_rules_enabled {
            if !template.external_rules.is_empty() {
                return Ok(template.external_rules.clone());
            }
            return self.backing_cluster_role_rules(template.name());
        }
        if template.context == TemplateContext::Cluster {
            return self.backing_cluster_role_rules(template.name());
        }
        Ok(Vec::new())
    }

    /// Returns the rules of the cluster role backing an external template.
    fn backing_cluster_role_rules(&self, name: &str) -> Result<Vec<PolicyRule>, ResolveError> {
        match self.cluster_roles.get(name) {
            Ok(role) => Ok(role.rules),
            Err(err) if err.is_not_found() => Err(ResolveError::ClusterRoleNotFound(name.to_string())),
            Err(err) => Err(ResolveError::Cache(err)),
        }
    }

    /// Reads the external-rules feature flag.
    fn external_rules_enabled(&self) -> Result<bool, ResolveError> {
        match self.features.get(EXTERNAL_RULES_FEATURE) {
            Ok(feature) => Ok(feature.enabled()),
            Err(CacheError::NotFound {
                ..
            }) => Ok(self.external_rules_default),
            Err(err) => Err(ResolveError::Cache(err)),
        }
    }

    /// Fetches a template, mapping not-found to a named resolution error.
    fn lookup_template(&self, name: &str) -> Result<RoleTemplate, ResolveError> {
        match self.templates.get(name) {
            Ok(template) => Ok(template),
            Err(err) if err.is_not_found() => Err(ResolveError::TemplateNotFound(name.to_string())),
            Err(err) => Err(ResolveError::Cache(err)),
        }
    }
}
