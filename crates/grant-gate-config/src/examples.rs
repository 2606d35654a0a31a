// grant-gate-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for Grant Gate configuration. The example spells out
//! every default so it doubles as reference documentation.

/// Returns a canonical example `grant-gate.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[features]
external_rules_default = false

[global_roles]
owner_equivalent_roles = ["restricted-admin"]
cluster_owner_template = "cluster-owner"

[break_glass]
username = "system:serviceaccount:grant-gate-system:grant-gate-sudo"
group = "system:masters"

[escalation]
permission_check_timeout_ms = 2000

[audit]
sink = "stderr"
# sink = "file"
# path = "/var/log/grant-gate/audit.jsonl"
"#,
    )
}
