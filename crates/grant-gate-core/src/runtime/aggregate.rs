// grant-gate-core/src/runtime/aggregate.rs
// ============================================================================
// Module: Aggregate Rule Resolver
// Description: Union of several rule resolvers.
// Purpose: Present the full effective rule set of a requester to escalation checks.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! The aggregate queries every resolver, even after one fails, so the caller
//! can still admit a request the successfully resolved rules already cover.
//! Results are concatenated without deduplication.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use crate::core::PolicyRule;
use crate::core::UserInfo;
use crate::interfaces::ResolveError;
use crate::interfaces::ResolvedRules;
use crate::interfaces::RuleResolver;

// ============================================================================
// SECTION: Aggregate Resolver
// ============================================================================

/// Unions the rules of several resolvers.
#[derive(Clone, Default)]
pub struct AggregateRuleResolver {
    /// Resolvers queried in order.
    resolvers: Vec<Arc<dyn RuleResolver>>,
}

impl AggregateRuleResolver {
    /// Creates an aggregate over the given resolvers.
    #[must_use]
    pub fn new(resolvers: Vec<Arc<dyn RuleResolver>>) -> Self {
        Self {
            resolvers,
        }
    }

    /// Returns a copy with one more resolver appended.
    #[must_use]
    pub fn with(mut self, resolver: Arc<dyn RuleResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Returns the number of resolvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true when no resolvers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl RuleResolver for AggregateRuleResolver {
    fn rules_for(&self, user: &UserInfo, scope: &str) -> Result<Vec<PolicyRule>, ResolveError> {
        self.resolve(user, scope).into_result()
    }

    fn resolve(&self, user: &UserInfo, scope: &str) -> ResolvedRules {
        let mut resolved = ResolvedRules::default();
        for resolver in &self.resolvers {
            let partial = resolver.resolve(user, scope);
            resolved.rules.extend(partial.rules);
            resolved.errors.extend(partial.errors);
        }
        resolved
    }
}
