// grant-gate-core/tests/escalation.rs
// ============================================================================
// Module: Escalation Checker Tests
// Description: Coverage checks and the escalate-verb bypass.
// ============================================================================
//! ## Overview
//! Validates escalation denials, tolerance of partial resolution failures, and
//! fail-safe handling of live permission checks.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grant_gate_core::AccessReview;
use grant_gate_core::EscalateCheck;
use grant_gate_core::EscalateTarget;
use grant_gate_core::EscalationError;
use grant_gate_core::PermissionCheckError;
use grant_gate_core::PermissionChecker;
use grant_gate_core::PolicyRule;
use grant_gate_core::ResolveError;
use grant_gate_core::ResolvedRules;
use grant_gate_core::RuleBasedPermissionChecker;
use grant_gate_core::RuleResolver;
use grant_gate_core::UserInfo;
use grant_gate_core::confirm_no_escalation;
use grant_gate_core::escalation_authorized;

use crate::common::rule;

/// Resolver returning fixed rules for scope `ns1` only.
struct StaticResolver {
    rules: Vec<PolicyRule>,
    error: Option<ResolveError>,
}

impl RuleResolver for StaticResolver {
    fn rules_for(&self, user: &UserInfo, scope: &str) -> Result<Vec<PolicyRule>, ResolveError> {
        self.resolve(user, scope).into_result()
    }

    fn resolve(&self, _user: &UserInfo, scope: &str) -> ResolvedRules {
        ResolvedRules {
            rules: if scope == "ns1" { self.rules.clone() } else { Vec::new() },
            errors: self.error.clone().into_iter().collect(),
        }
    }
}

fn holding(rules: Vec<PolicyRule>) -> StaticResolver {
    StaticResolver {
        rules,
        error: None,
    }
}

fn alice() -> UserInfo {
    UserInfo::new("alice", Vec::<String>::new())
}

// ============================================================================
// SECTION: Coverage
// ============================================================================

#[test]
fn missing_verb_is_reported() {
    let resolver = holding(vec![rule(&["get"], &["pods"])]);
    let err = confirm_no_escalation(&alice(), &[rule(&["get", "list"], &["pods"])], "ns1", &resolver)
        .unwrap_err();

    assert_eq!(err.missing(), &[rule(&["list"], &["pods"]).with_api_groups([""])]);
    assert!(err.to_string().starts_with("{apiGroups=[\"\"] resources=[pods] verbs=[list]}"));
    assert!(err.to_string().contains("alice"));
}

#[test]
fn held_rules_are_scoped() {
    let resolver = holding(vec![rule(&["get"], &["pods"])]);
    assert!(confirm_no_escalation(&alice(), &[rule(&["get"], &["pods"])], "ns1", &resolver).is_ok());
    assert!(confirm_no_escalation(&alice(), &[rule(&["get"], &["pods"])], "ns2", &resolver).is_err());
}

#[test]
fn universal_wildcard_covers_any_resource_request() {
    let admin = PolicyRule::new().with_verbs(["*"]).with_api_groups(["*"]).with_resources(["*"]);
    let resolver = holding(vec![admin]);
    let requested = vec![
        rule(&["delete", "escalate"], &["secrets", "deployments/scale"]),
        PolicyRule::new()
            .with_verbs(["create"])
            .with_api_groups(["apps", "management.grant-gate.io"])
            .with_resources(["roletemplates"])
            .with_resource_names(["x"]),
    ];
    assert!(confirm_no_escalation(&alice(), &requested, "ns1", &resolver).is_ok());
}

#[test]
fn resolution_error_is_tolerated_when_rules_are_covered() {
    let resolver = StaticResolver {
        rules: vec![rule(&["*"], &["pods"])],
        error: Some(ResolveError::TemplateNotFound("stale".to_string())),
    };
    assert!(confirm_no_escalation(&alice(), &[rule(&["get"], &["pods"])], "ns1", &resolver).is_ok());

    let err =
        confirm_no_escalation(&alice(), &[rule(&["get"], &["secrets"])], "ns1", &resolver).unwrap_err();
    assert!(matches!(err, EscalationError::Resolution { .. }));
    assert_eq!(err.first_missing().map(|rule| rule.resources[0].as_str()), Some("secrets"));
}

// ============================================================================
// SECTION: Escalate Verb
// ============================================================================

struct FixedChecker(Result<bool, PermissionCheckError>);

#[async_trait]
impl PermissionChecker for FixedChecker {
    async fn check(&self, review: &AccessReview) -> Result<bool, PermissionCheckError> {
        assert_eq!(review.verb, "escalate");
        self.0.clone()
    }
}

struct SlowChecker;

#[async_trait]
impl PermissionChecker for SlowChecker {
    async fn check(&self, _review: &AccessReview) -> Result<bool, PermissionCheckError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(true)
    }
}

const TARGET: EscalateTarget<'static> = EscalateTarget {
    api_group: "management.grant-gate.io",
    resource: "roletemplates",
    scope: "",
};

#[tokio::test]
async fn escalate_verb_authorizes() {
    let outcome =
        escalation_authorized(&FixedChecker(Ok(true)), &alice(), TARGET, Duration::from_secs(1))
            .await;
    assert_eq!(outcome, EscalateCheck::Authorized);

    let outcome =
        escalation_authorized(&FixedChecker(Ok(false)), &alice(), TARGET, Duration::from_secs(1))
            .await;
    assert_eq!(outcome, EscalateCheck::NotAuthorized);
}

#[tokio::test]
async fn failed_check_never_authorizes() {
    let checker = FixedChecker(Err(PermissionCheckError::Transport("connection reset".to_string())));
    let outcome = escalation_authorized(&checker, &alice(), TARGET, Duration::from_secs(1)).await;
    assert!(matches!(outcome, EscalateCheck::CheckFailed(ref reason) if reason.contains("reset")));
    assert!(!outcome.is_authorized());
}

#[tokio::test]
async fn timed_out_check_never_authorizes() {
    let outcome =
        escalation_authorized(&SlowChecker, &alice(), TARGET, Duration::from_millis(20)).await;
    assert!(matches!(outcome, EscalateCheck::CheckFailed(ref reason) if reason.contains("timed out")));
}

#[tokio::test]
async fn rule_based_checker_answers_from_held_rules() {
    let escalate = PolicyRule::new()
        .with_verbs(["escalate"])
        .with_api_groups(["management.grant-gate.io"])
        .with_resources(["roletemplates"]);
    let checker = RuleBasedPermissionChecker::new(Arc::new(holding(vec![escalate])));
    let in_scope = EscalateTarget {
        scope: "ns1",
        ..TARGET
    };

    let outcome = escalation_authorized(&checker, &alice(), in_scope, Duration::from_secs(1)).await;
    assert_eq!(outcome, EscalateCheck::Authorized);
    let outcome = escalation_authorized(&checker, &alice(), TARGET, Duration::from_secs(1)).await;
    assert_eq!(outcome, EscalateCheck::NotAuthorized);
}
