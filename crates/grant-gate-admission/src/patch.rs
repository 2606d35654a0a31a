// grant-gate-admission/src/patch.rs
// ============================================================================
// Module: JSON Patch
// Description: RFC 6902 diff between two JSON documents.
// Purpose: Express mutating admitter output as a patch for the API server.
// Dependencies: base64, serde, serde_json
// ============================================================================

//! ## Overview
//! Objects are diffed member by member. Arrays and scalars that differ are
//! replaced whole. Paths use RFC 6901 pointer escaping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::admitter::AdmissionError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Patch operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Add a member.
    Add,
    /// Remove a member.
    Remove,
    /// Replace a value.
    Replace,
}

/// Single RFC 6902 operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOperation {
    /// Operation kind.
    pub op: PatchOp,
    /// JSON pointer to the target.
    pub path: String,
    /// New value for add and replace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

// ============================================================================
// SECTION: Diff
// ============================================================================

/// Returns the operations turning `original` into `updated`.
#[must_use]
pub fn diff(original: &Value, updated: &Value) -> Vec<PatchOperation> {
    let mut ops = Vec::new();
    diff_at("", original, updated, &mut ops);
    ops
}

/// Appends the operations for one location.
fn diff_at(path: &str, original: &Value, updated: &Value, ops: &mut Vec<PatchOperation>) {
    if original == updated {
        return;
    }
    match (original, updated) {
        (Value::Object(before), Value::Object(after)) => diff_objects(path, before, after, ops),
        _ => ops.push(PatchOperation {
            op: PatchOp::Replace,
            path: path.to_string(),
            value: Some(updated.clone()),
        }),
    }
}

/// Appends member-level operations for two objects.
fn diff_objects(
    path: &str,
    before: &Map<String, Value>,
    after: &Map<String, Value>,
    ops: &mut Vec<PatchOperation>,
) {
    for (key, old) in before {
        let child = format!("{path}/{}", escape(key));
        match after.get(key) {
            Some(new) => diff_at(&child, old, new, ops),
            None => ops.push(PatchOperation {
                op: PatchOp::Remove,
                path: child,
                value: None,
            }),
        }
    }
    for (key, new) in after {
        if !before.contains_key(key) {
            ops.push(PatchOperation {
                op: PatchOp::Add,
                path: format!("{path}/{}", escape(key)),
                value: Some(new.clone()),
            });
        }
    }
}

/// Escapes a member name for use in a JSON pointer.
fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Serializes and base64-encodes a patch.
///
/// # Errors
///
/// Returns [`AdmissionError::Patch`] when serialization fails.
pub fn encode_patch(ops: &[PatchOperation]) -> Result<String, AdmissionError> {
    let bytes = serde_json::to_vec(ops).map_err(|err| AdmissionError::Patch(err.to_string()))?;
    Ok(STANDARD.encode(bytes))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::indexing_slicing,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use serde_json::json;

    use super::*;

    #[test]
    fn nested_members_are_added_under_escaped_paths() {
        let before = json!({"metadata": {"name": "rt"}});
        let after = json!({"metadata": {"name": "rt", "annotations": {"grant-gate.io/creator-id": "u"}}});
        let ops = diff(&before, &after);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op, PatchOp::Add);
        assert_eq!(ops[0].path, "/metadata/annotations");

        let before = json!({"metadata": {"annotations": {}}});
        let ops = diff(&before, &after);
        assert_eq!(ops[0].path, "/metadata/annotations/grant-gate.io~1creator-id");
        assert!(ops.iter().any(|op| op.path == "/metadata/name" && op.op == PatchOp::Add));
    }

    #[test]
    fn arrays_are_replaced_and_missing_members_removed() {
        let before = json!({"rules": [1, 2], "gone": true});
        let after = json!({"rules": [1]});
        let ops = diff(&before, &after);
        assert!(ops.contains(&PatchOperation {
            op: PatchOp::Replace,
            path: "/rules".to_string(),
            value: Some(json!([1])),
        }));
        assert!(ops.contains(&PatchOperation {
            op: PatchOp::Remove,
            path: "/gone".to_string(),
            value: None,
        }));
        assert!(diff(&after, &after).is_empty());
    }

    #[test]
    fn encoded_patch_decodes_to_operations() {
        let ops = diff(&json!({}), &json!({"a": 1}));
        let encoded = encode_patch(&ops).unwrap();
        let decoded: Vec<PatchOperation> =
            serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(decoded, ops);
    }
}
