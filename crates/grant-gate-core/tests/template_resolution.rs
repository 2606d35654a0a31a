// grant-gate-core/tests/template_resolution.rs
// ============================================================================
// Module: Role Template Resolution Tests
// Description: Flattening of role templates, inheritance, and external rules.
// ============================================================================
//! ## Overview
//! Validates inheritance flattening, external template sources, and failure
//! on missing references.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use grant_gate_core::ResolveError;
use grant_gate_core::TemplateContext;

use crate::common::Fixture;
use crate::common::rule;
use crate::common::template;

#[test]
fn inherited_rules_are_flattened() {
    let fixture = Fixture::new();
    fixture.add_template(template("a", vec![], &["b"]));
    fixture.add_template(template("b", vec![rule(&["get", "list"], &["pods"])], &[]));

    let rules = fixture.template_resolver().rules_from_template_name("a").unwrap();
    assert_eq!(rules, vec![rule(&["get", "list"], &["pods"])]);
}

#[test]
fn rules_follow_depth_first_visitation_order() {
    let fixture = Fixture::new();
    fixture.add_template(template("root", vec![rule(&["get"], &["root"])], &["left", "right"]));
    fixture.add_template(template("left", vec![rule(&["get"], &["left"])], &["leaf"]));
    fixture.add_template(template("right", vec![rule(&["get"], &["right"])], &[]));
    fixture.add_template(template("leaf", vec![rule(&["get"], &["leaf"])], &[]));

    let rules = fixture.template_resolver().rules_from_template_name("root").unwrap();
    let resources: Vec<&str> = rules.iter().map(|rule| rule.resources[0].as_str()).collect();
    assert_eq!(resources, vec!["root", "left", "leaf", "right"]);
}

#[test]
fn shared_ancestor_is_visited_once() {
    let fixture = Fixture::new();
    fixture.add_template(template("top", vec![], &["x", "y"]));
    fixture.add_template(template("x", vec![], &["base"]));
    fixture.add_template(template("y", vec![], &["base"]));
    fixture.add_template(template("base", vec![rule(&["get"], &["pods"])], &[]));

    let rules = fixture.template_resolver().rules_from_template_name("top").unwrap();
    assert_eq!(rules.len(), 1);
}

#[test]
fn missing_inherited_template_fails_resolution() {
    let fixture = Fixture::new();
    fixture.add_template(template("a", vec![rule(&["get"], &["pods"])], &["ghost"]));

    let err = fixture.template_resolver().rules_from_template_name("a").unwrap_err();
    assert_eq!(err, ResolveError::TemplateNotFound("ghost".to_string()));
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn missing_top_level_template_fails_resolution() {
    let fixture = Fixture::new();
    let err = fixture.template_resolver().rules_from_template_name("nope").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn external_rules_are_used_verbatim_without_cluster_role_lookup() {
    let fixture = Fixture::new();
    fixture.set_external_rules(true);
    let mut external = template("ext", vec![], &[]);
    external.external = true;
    external.external_rules = vec![rule(&["update"], &["nodes"])];
    fixture.add_template(external.clone());

    let rules = fixture.template_resolver().rules_from_template(&external).unwrap();
    assert_eq!(rules, vec![rule(&["update"], &["nodes"])]);
    assert_eq!(fixture.cluster_roles.gets(), 0);
}

#[test]
fn external_template_without_rules_uses_backing_cluster_role() {
    let fixture = Fixture::new();
    fixture.set_external_rules(true);
    fixture.add_cluster_role("ext", vec![rule(&["watch"], &["secrets"])]);
    let mut external = template("ext", vec![], &[]);
    external.external = true;

    let rules = fixture.template_resolver().rules_from_template(&external).unwrap();
    assert_eq!(rules, vec![rule(&["watch"], &["secrets"])]);
}

#[test]
fn external_template_missing_cluster_role_is_an_error() {
    let fixture = Fixture::new();
    fixture.set_external_rules(true);
    let mut external = template("ext", vec![], &[]);
    external.external = true;

    let err = fixture.template_resolver().rules_from_template(&external).unwrap_err();
    assert_eq!(err, ResolveError::ClusterRoleNotFound("ext".to_string()));
}

#[test]
fn legacy_external_cluster_context_uses_cluster_role() {
    let fixture = Fixture::new();
    fixture.set_external_rules(false);
    fixture.add_cluster_role("legacy", vec![rule(&["get"], &["nodes"])]);
    let mut external = template("legacy", vec![], &[]);
    external.external = true;
    external.external_rules = vec![rule(&["delete"], &["nodes"])];
    external.context = TemplateContext::Cluster;

    let rules = fixture.template_resolver().rules_from_template(&external).unwrap();
    assert_eq!(rules, vec![rule(&["get"], &["nodes"])]);
}

#[test]
fn legacy_external_project_context_contributes_nothing() {
    let fixture = Fixture::new();
    fixture.set_external_rules(false);
    fixture.add_cluster_role("legacy", vec![rule(&["get"], &["nodes"])]);
    let mut external = template("legacy", vec![rule(&["get"], &["pods"])], &[]);
    external.external = true;
    external.context = TemplateContext::Project;

    let rules = fixture.template_resolver().rules_from_template(&external).unwrap();
    assert_eq!(rules, vec![rule(&["get"], &["pods"])]);
    assert_eq!(fixture.cluster_roles.gets(), 0);
}

#[test]
fn absent_feature_object_uses_configured_default() {
    let fixture = Fixture::new();
    let mut external = template("ext", vec![], &[]);
    external.external = true;
    external.external_rules = vec![rule(&["update"], &["nodes"])];
    external.context = TemplateContext::Project;

    let off = fixture.template_resolver().rules_from_template(&external).unwrap();
    assert!(off.is_empty());

    let on = fixture
        .template_resolver()
        .with_external_rules_default(true)
        .rules_from_template(&external)
        .unwrap();
    assert_eq!(on, vec![rule(&["update"], &["nodes"])]);
}
