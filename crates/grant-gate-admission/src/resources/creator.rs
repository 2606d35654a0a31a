// grant-gate-admission/src/resources/creator.rs
// ============================================================================
// Module: Creator Annotation Mutator
// Description: Stamps the creating user on new objects.
// Purpose: Record who created role templates and global roles.
// Dependencies: async-trait, serde_json
// ============================================================================

//! ## Overview
//! On create, the mutator sets the creator annotation to the requester's
//! username unless it is already present. Other operations pass through.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

use crate::admitter::AdmissionError;
use crate::admitter::MutatingAdmitter;
use crate::admitter::MutationOutcome;
use crate::request::AdmissionRequest;
use crate::request::Operation;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Annotation carrying the creating username.
pub const CREATOR_ID_ANNOTATION: &str = "grant-gate.io/creator-id";

// ============================================================================
// SECTION: Mutator
// ============================================================================

/// Sets [`CREATOR_ID_ANNOTATION`] on created objects.
pub struct CreatorIdMutator {
    /// Admitter name used in audit events.
    name: &'static str,
}

impl CreatorIdMutator {
    /// Creates a mutator reporting under `name`.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
        }
    }
}

#[async_trait]
impl MutatingAdmitter for CreatorIdMutator {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn admit(&self, request: &AdmissionRequest) -> Result<MutationOutcome, AdmissionError> {
        if request.operation != Operation::Create {
            return Ok(MutationOutcome::Unchanged);
        }
        let mut object = request
            .object
            .clone()
            .ok_or_else(|| AdmissionError::Decode("request has no object".to_string()))?;
        let changed = stamp_creator(&mut object, &request.user_info.username)?;
        Ok(if changed { MutationOutcome::Patched(object) } else { MutationOutcome::Unchanged })
    }
}

/// Sets the creator annotation, returning whether the object changed.
fn stamp_creator(object: &mut Value, username: &str) -> Result<bool, AdmissionError> {
    let Value::Object(root) = object else {
        return Err(AdmissionError::Decode("object must be a JSON object".to_string()));
    };
    let metadata = object_member(root, "metadata")?;
    let annotations = object_member(metadata, "annotations")?;
    if annotations.contains_key(CREATOR_ID_ANNOTATION) {
        return Ok(false);
    }
    annotations.insert(CREATOR_ID_ANNOTATION.to_string(), Value::String(username.to_string()));
    Ok(true)
}

/// Returns the object member `key`, creating it when absent or null.
fn object_member<'a>(
    parent: &'a mut Map<String, Value>,
    key: &str,
) -> Result<&'a mut Map<String, Value>, AdmissionError> {
    let member = parent.entry(key).or_insert_with(|| Value::Object(Map::new()));
    if member.is_null() {
        *member = Value::Object(Map::new());
    }
    member
        .as_object_mut()
        .ok_or_else(|| AdmissionError::Decode(format!("{key} must be a JSON object")))
}
