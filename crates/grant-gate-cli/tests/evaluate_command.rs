// grant-gate-cli/tests/evaluate_command.rs
// ============================================================================
// Module: CLI Evaluate Command Tests
// Description: Offline evaluation through the library and the binary.
// Purpose: Ensure snapshot evaluation matches webhook answers and fails closed.
// Dependencies: grant-gate-cli binary, tempfile
// ============================================================================

//! ## Overview
//! Builds a small snapshot in which `alice` owns cluster `c1`, then asks
//! whether she may bind a viewer template on `c1` and on `c2`.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;
use std::sync::Arc;

use grant_gate_admission::AdmissionMode;
use grant_gate_admission::AdmissionRequest;
use grant_gate_admission::AdmissionResponse;
use grant_gate_admission::AdmissionReview;
use grant_gate_admission::MemoryAuditSink;
use grant_gate_admission::Operation;
use grant_gate_admission::management_resource;
use grant_gate_cli::AdmissionInput;
use grant_gate_cli::ClusterSnapshot;
use grant_gate_cli::Evaluation;
use grant_gate_cli::evaluate;
use grant_gate_config::CONFIG_ENV_VAR;
use grant_gate_config::GrantGateConfig;
use grant_gate_core::BindingSubject;
use grant_gate_core::ClusterRoleTemplateBinding;
use grant_gate_core::ObjectMeta;
use grant_gate_core::PolicyRule;
use grant_gate_core::RoleTemplate;
use grant_gate_core::TemplateContext;
use grant_gate_core::UserInfo;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn grant_gate_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_grant-gate"))
}

fn template(name: &str, rules: Vec<PolicyRule>) -> RoleTemplate {
    RoleTemplate {
        rules,
        context: TemplateContext::Cluster,
        ..RoleTemplate::named(name)
    }
}

fn crtb(name: &str, user: &str, template: &str, cluster: &str) -> ClusterRoleTemplateBinding {
    ClusterRoleTemplateBinding {
        metadata: ObjectMeta::namespaced(cluster, name),
        subject: BindingSubject::user(user),
        role_template_name: template.to_string(),
        cluster_name: cluster.to_string(),
    }
}

fn snapshot() -> ClusterSnapshot {
    let everything = PolicyRule::new()
        .with_verbs(["*"])
        .with_api_groups(["*"])
        .with_resources(["*"]);
    let viewer = PolicyRule::new().with_verbs(["get"]).with_resources(["pods"]);
    ClusterSnapshot {
        role_templates: vec![template("c-owner", vec![everything]), template("viewer", vec![viewer])],
        cluster_role_template_bindings: vec![crtb("alice-owner", "alice", "c-owner", "c1")],
        ..ClusterSnapshot::default()
    }
}

fn binding_request(cluster: &str) -> AdmissionRequest {
    let binding = crtb("bob-viewer", "bob", "viewer", cluster);
    AdmissionRequest::new(
        format!("uid-{cluster}"),
        management_resource("clusterroletemplatebindings"),
        Operation::Create,
        UserInfo::new("alice", Vec::<String>::new()),
    )
    .with_object(serde_json::to_value(binding).unwrap())
}

/// Writes snapshot, request, and a quiet config into a fresh directory.
fn workspace(request: &serde_json::Value) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("snapshot.json"), serde_json::to_vec(&snapshot()).unwrap()).unwrap();
    fs::write(dir.path().join("request.json"), serde_json::to_vec(request).unwrap()).unwrap();
    fs::write(dir.path().join("grant-gate.toml"), "[audit]\nsink = \"none\"\n").unwrap();
    dir
}

fn run_evaluate(dir: &Path, extra: &[&str]) -> Output {
    let snapshot = dir.join("snapshot.json");
    let request = dir.join("request.json");
    let config = dir.join("grant-gate.toml");
    Command::new(grant_gate_bin())
        .env_remove(CONFIG_ENV_VAR)
        .arg("evaluate")
        .arg("--snapshot")
        .arg(&snapshot)
        .arg("--request")
        .arg(&request)
        .arg("--config")
        .arg(&config)
        .args(extra)
        .output()
        .expect("run grant-gate")
}

async fn evaluate_request(request: AdmissionRequest) -> (Evaluation, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::new());
    let evaluation = evaluate(
        snapshot(),
        AdmissionInput::Request(request),
        &GrantGateConfig::default(),
        AdmissionMode::Validate,
        audit.clone(),
    )
    .await
    .unwrap();
    (evaluation, audit)
}

// ============================================================================
// SECTION: Library
// ============================================================================

#[tokio::test]
async fn binding_on_owned_cluster_is_admitted() {
    let (evaluation, audit) = evaluate_request(binding_request("c1")).await;
    assert!(evaluation.allowed(), "{evaluation:?}");
    assert!(matches!(evaluation, Evaluation::Response(_)));
    assert_eq!(audit.events_labeled("admission_decision").len(), 1);
}

#[tokio::test]
async fn binding_on_foreign_cluster_is_unauthorized() {
    let (evaluation, _audit) = evaluate_request(binding_request("c2")).await;
    assert!(!evaluation.allowed());
    let response = evaluation.response().unwrap();
    assert_eq!(response.code(), 401);
    assert_eq!(response.uid, "uid-c2");
}

#[test]
fn input_shape_is_detected() {
    let request = binding_request("c1");
    let review = serde_json::to_vec(&AdmissionReview::from_request(request.clone())).unwrap();
    assert!(matches!(AdmissionInput::from_slice(&review).unwrap(), AdmissionInput::Review(_)));

    let bare = serde_json::to_vec(&request).unwrap();
    assert_eq!(AdmissionInput::from_slice(&bare).unwrap(), AdmissionInput::Request(request));

    assert!(AdmissionInput::from_slice(b"[1, 2]").is_err());
    assert!(AdmissionInput::from_slice(b"not json").is_err());
}

// ============================================================================
// SECTION: Binary
// ============================================================================

#[test]
fn cli_evaluate_answers_a_review_with_a_review() {
    let review = AdmissionReview::from_request(binding_request("c1"));
    let dir = workspace(&serde_json::to_value(review).unwrap());

    let output = run_evaluate(dir.path(), &[]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let answer: AdmissionReview = serde_json::from_slice(&output.stdout).unwrap();
    let response = answer.response.unwrap();
    assert!(response.allowed);
    assert_eq!(response.uid, "uid-c1");
}

#[test]
fn cli_evaluate_exits_two_on_denial() {
    let dir = workspace(&serde_json::to_value(binding_request("c2")).unwrap());

    let output = run_evaluate(dir.path(), &["--mode", "validate"]);
    assert_eq!(output.status.code(), Some(2));
    let response: AdmissionResponse = serde_json::from_slice(&output.stdout).unwrap();
    assert!(!response.allowed);
    assert_eq!(response.code(), 401);
}

#[test]
fn cli_evaluate_rejects_malformed_snapshot() {
    let dir = workspace(&serde_json::to_value(binding_request("c1")).unwrap());
    fs::write(dir.path().join("snapshot.json"), r#"{"unknownList": []}"#).unwrap();

    let output = run_evaluate(dir.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("snapshot"), "{stderr}");
}
