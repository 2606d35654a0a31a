// grant-gate-core/src/runtime/escalation.rs
// ============================================================================
// Module: Escalation Checker
// Description: Coverage check and escalate-verb bypass for grants.
// Purpose: Deny grants of rules the requester does not already hold.
// Dependencies: crate::core, crate::interfaces, thiserror, tokio
// ============================================================================

//! ## Overview
//! [`confirm_no_escalation`] requires every requested rule to be covered by
//! the rules the resolver reports for the requester at a scope.
//! [`escalation_authorized`] performs the live `escalate` verb check that lets
//! a caller skip coverage entirely. A failed or timed-out live check never
//! authorizes; the caller falls back to coverage.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::PolicyRule;
use crate::core::UserInfo;
use crate::core::uncovered_rules;
use crate::interfaces::AccessReview;
use crate::interfaces::PermissionCheckError;
use crate::interfaces::PermissionChecker;
use crate::interfaces::ResolveError;
use crate::interfaces::RuleResolver;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Verb authorizing grants beyond the requester's own rules.
pub const ESCALATE_VERB: &str = "escalate";

// ============================================================================
// SECTION: Coverage Check
// ============================================================================

/// Escalation check failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscalationError {
    /// Requested rules are not covered by the requester's rules.
    #[error("{}", uncovered_message(.user, .scope, .missing))]
    Uncovered {
        /// Requester username.
        user: String,
        /// Scope the rules were resolved at.
        scope: String,
        /// Atomic rules with no covering held rule.
        missing: Vec<PolicyRule>,
    },
    /// Requested rules are uncovered and some rule sources failed to resolve.
    #[error("unable to resolve held rules: {source}")]
    Resolution {
        /// Resolution failure.
        source: ResolveError,
        /// Atomic rules uncovered by the rules that did resolve.
        missing: Vec<PolicyRule>,
    },
}

impl EscalationError {
    /// Returns the first uncovered rule.
    #[must_use]
    pub fn first_missing(&self) -> Option<&PolicyRule> {
        self.missing().first()
    }

    /// Returns every uncovered rule.
    #[must_use]
    pub fn missing(&self) -> &[PolicyRule] {
        match self {
            Self::Uncovered {
                missing, ..
            }
            | Self::Resolution {
                missing, ..
            } => missing,
        }
    }
}

/// Formats an uncovered-rules message, leading with the first rule.
fn uncovered_message(user: &str, scope: &str, missing: &[PolicyRule]) -> String {
    let first = missing.first().map(ToString::to_string).unwrap_or_default();
    let all = missing.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
    format!(
        "{first} not held by user \"{user}\" in scope \"{scope}\"; uncovered rules: [{all}]"
    )
}

/// Confirms the requester already holds every requested rule at `scope`.
///
/// Resolver failures are tolerated when the rules that did resolve already
/// cover the request.
///
/// # Errors
///
/// Returns [`EscalationError::Uncovered`] when rules are missing, or
/// [`EscalationError::Resolution`] when rules are missing and a source failed.
pub fn confirm_no_escalation(
    user: &UserInfo,
    requested: &[PolicyRule],
    scope: &str,
    resolver: &dyn RuleResolver,
) -> Result<(), EscalationError> {
    let resolved = resolver.resolve(user, scope);
    let missing = uncovered_rules(&resolved.rules, requested);
    if missing.is_empty() {
        return Ok(());
    }
    match resolved.into_result() {
        Ok(_) => Err(EscalationError::Uncovered {
            user: user.username.clone(),
            scope: scope.to_string(),
            missing,
        }),
        Err(source) => Err(EscalationError::Resolution {
            source,
            missing,
        }),
    }
}

// ============================================================================
// SECTION: Escalate Verb Bypass
// ============================================================================

/// Target of an escalate-verb check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalateTarget<'a> {
    /// API group of the resource being written.
    pub api_group: &'a str,
    /// Resource type being written.
    pub resource: &'a str,
    /// Scope of the write; empty for cluster-wide.
    pub scope: &'a str,
}

/// Outcome of the escalate-verb check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalateCheck {
    /// The requester holds `escalate`; coverage is skipped.
    Authorized,
    /// The requester does not hold `escalate`.
    NotAuthorized,
    /// The check failed or timed out; treated as not authorized.
    CheckFailed(String),
}

impl EscalateCheck {
    /// Returns true only for [`EscalateCheck::Authorized`].
    #[must_use]
    pub const fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized)
    }
}

/// Checks whether the requester holds `escalate` on the target.
///
/// The live check is bounded by `timeout`. Failures are reported as
/// [`EscalateCheck::CheckFailed`] and never authorize.
pub async fn escalation_authorized(
    checker: &dyn PermissionChecker,
    user: &UserInfo,
    target: EscalateTarget<'_>,
    timeout: Duration,
) -> EscalateCheck {
    let review = AccessReview {
        user: user.clone(),
        verb: ESCALATE_VERB.to_string(),
        api_group: target.api_group.to_string(),
        resource: target.resource.to_string(),
        scope: target.scope.to_string(),
        name: None,
    };
    match tokio::time::timeout(timeout, checker.check(&review)).await {
        Ok(Ok(true)) => EscalateCheck::Authorized,
        Ok(Ok(false)) => EscalateCheck::NotAuthorized,
        Ok(Err(err)) => EscalateCheck::CheckFailed(err.to_string()),
        Err(_) => EscalateCheck::CheckFailed(format!(
            "permission check for {review} timed out after {}ms",
            timeout.as_millis()
        )),
    }
}

// ============================================================================
// SECTION: Rule-Based Permission Checker
// ============================================================================

/// Answers permission checks from locally resolved rules.
#[derive(Clone)]
pub struct RuleBasedPermissionChecker {
    /// Resolver supplying the requester's rules.
    resolver: Arc<dyn RuleResolver>,
}

impl RuleBasedPermissionChecker {
    /// Creates a checker over the given resolver.
    #[must_use]
    pub fn new(resolver: Arc<dyn RuleResolver>) -> Self {
        Self {
            resolver,
        }
    }
}

#[async_trait]
impl PermissionChecker for RuleBasedPermissionChecker {
    async fn check(&self, review: &AccessReview) -> Result<bool, PermissionCheckError> {
        let resolved = self.resolver.resolve(&review.user, &review.scope);
        let allowed = resolved.rules.iter().any(|rule| {
            rule.allows(&review.verb, &review.api_group, &review.resource, review.name.as_deref())
        });
        if allowed {
            return Ok(true);
        }
        resolved.into_result()?;
        Ok(false)
    }
}
