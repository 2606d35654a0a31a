// grant-gate-admission/src/request.rs
// ============================================================================
// Module: Admission Contract
// Description: Admission review request and response payloads.
// Purpose: Model the wire contract exchanged with the API server.
// Dependencies: grant-gate-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Requests carry the operation, the new and old objects as raw JSON, the
//! requester identity, and the target resource. Responses carry the verdict,
//! an optional status on denial, and an optional base64 JSON patch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use grant_gate_core::UserInfo;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::admitter::AdmissionError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// API version of the admission review envelope.
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
/// Kind of the admission review envelope.
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";
/// Patch type label for RFC 6902 patches.
pub const JSON_PATCH_TYPE: &str = "JSONPatch";

// ============================================================================
// SECTION: Request
// ============================================================================

/// Admission operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    /// Object creation.
    Create,
    /// Object update.
    Update,
    /// Object deletion.
    Delete,
    /// Connect to a subresource.
    Connect,
}

impl Operation {
    /// Returns the wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource type addressed by a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupVersionResource {
    /// API group.
    #[serde(default)]
    pub group: String,
    /// API version.
    #[serde(default)]
    pub version: String,
    /// Plural resource name.
    #[serde(default)]
    pub resource: String,
}

impl GroupVersionResource {
    /// Creates a resource identifier.
    #[must_use]
    pub fn new(group: &str, version: &str, resource: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            resource: resource.to_string(),
        }
    }
}

impl fmt::Display for GroupVersionResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.resource)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.resource)
        }
    }
}

/// Kind of the submitted object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVersionKind {
    /// API group.
    #[serde(default)]
    pub group: String,
    /// API version.
    #[serde(default)]
    pub version: String,
    /// Object kind.
    #[serde(default)]
    pub kind: String,
}

/// Decoded admission request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    /// Request identifier echoed in the response.
    pub uid: String,
    /// Kind of the submitted object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<GroupVersionKind>,
    /// Target resource.
    pub resource: GroupVersionResource,
    /// Target subresource, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_resource: Option<String>,
    /// Object name.
    #[serde(default)]
    pub name: String,
    /// Object namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Requested operation.
    pub operation: Operation,
    /// Requester identity.
    pub user_info: UserInfo,
    /// New object (create and update).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
    /// Previous object (update and delete).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_object: Option<Value>,
    /// Dry-run request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
}

impl AdmissionRequest {
    /// Creates a request with no objects attached.
    #[must_use]
    pub fn new(
        uid: impl Into<String>,
        resource: GroupVersionResource,
        operation: Operation,
        user_info: UserInfo,
    ) -> Self {
        Self {
            uid: uid.into(),
            kind: None,
            resource,
            sub_resource: None,
            name: String::new(),
            namespace: None,
            operation,
            user_info,
            object: None,
            old_object: None,
            dry_run: None,
        }
    }

    /// Returns a copy with the new object attached.
    #[must_use]
    pub fn with_object(mut self, object: Value) -> Self {
        self.object = Some(object);
        self
    }

    /// Returns a copy with the previous object attached.
    #[must_use]
    pub fn with_old_object(mut self, object: Value) -> Self {
        self.old_object = Some(object);
        self
    }

    /// Decodes the new object.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Decode`] when the object is absent or malformed.
    pub fn decode_object<T: DeserializeOwned>(&self) -> Result<T, AdmissionError> {
        decode(self.object.as_ref(), "object")
    }

    /// Decodes the previous object.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Decode`] when the object is absent or malformed.
    pub fn decode_old_object<T: DeserializeOwned>(&self) -> Result<T, AdmissionError> {
        decode(self.old_object.as_ref(), "oldObject")
    }
}

/// Decodes an attached object.
fn decode<T: DeserializeOwned>(value: Option<&Value>, field: &str) -> Result<T, AdmissionError> {
    let value = value.ok_or_else(|| AdmissionError::Decode(format!("request has no {field}")))?;
    T::deserialize(value).map_err(|err| AdmissionError::Decode(format!("invalid {field}: {err}")))
}

// ============================================================================
// SECTION: Response
// ============================================================================

/// Status attached to a non-allowed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// HTTP-style status code.
    pub code: u16,
    /// Machine-readable reason.
    pub reason: String,
    /// Human-readable message.
    pub message: String,
}

impl Status {
    /// `400 BadRequest`.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, "BadRequest", message)
    }

    /// `401 Unauthorized`.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(401, "Unauthorized", message)
    }

    /// `500 InternalError`.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, "InternalError", message)
    }

    /// Creates a status.
    #[must_use]
    pub fn new(code: u16, reason: &str, message: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.to_string(),
            message: message.into(),
        }
    }
}

/// Admission response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    /// Identifier of the answered request.
    pub uid: String,
    /// Verdict.
    pub allowed: bool,
    /// Denial or failure status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Base64-encoded JSON patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<String>,
    /// Patch type label, set with `patch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<String>,
}

impl AdmissionResponse {
    /// Allowed response without a patch.
    #[must_use]
    pub fn allowed(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: true,
            status: None,
            patch: None,
            patch_type: None,
        }
    }

    /// Non-allowed response with a status.
    #[must_use]
    pub fn denied(uid: &str, status: Status) -> Self {
        Self {
            uid: uid.to_string(),
            allowed: false,
            status: Some(status),
            patch: None,
            patch_type: None,
        }
    }

    /// Non-allowed response for a failed evaluation.
    #[must_use]
    pub fn errored(uid: &str, err: &AdmissionError) -> Self {
        Self::denied(uid, Status::internal(err.to_string()))
    }

    /// Returns a copy carrying an encoded JSON patch.
    #[must_use]
    pub fn with_patch(mut self, encoded: String) -> Self {
        self.patch = Some(encoded);
        self.patch_type = Some(JSON_PATCH_TYPE.to_string());
        self
    }

    /// Returns the status code: 200 when allowed.
    #[must_use]
    pub fn code(&self) -> u16 {
        self.status.as_ref().map_or(200, |status| status.code)
    }
}

// ============================================================================
// SECTION: Review Envelope
// ============================================================================

/// Admission review envelope carrying a request or a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReview {
    /// Envelope API version.
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Envelope kind.
    #[serde(default = "default_review_kind")]
    pub kind: String,
    /// Request, on the way in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<AdmissionRequest>,
    /// Response, on the way out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<AdmissionResponse>,
}

impl AdmissionReview {
    /// Wraps a response in an envelope.
    #[must_use]
    pub fn from_response(response: AdmissionResponse) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_review_kind(),
            request: None,
            response: Some(response),
        }
    }

    /// Wraps a request in an envelope.
    #[must_use]
    pub fn from_request(request: AdmissionRequest) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_review_kind(),
            request: Some(request),
            response: None,
        }
    }
}

/// Default envelope API version.
fn default_api_version() -> String {
    ADMISSION_API_VERSION.to_string()
}

/// Default envelope kind.
fn default_review_kind() -> String {
    ADMISSION_REVIEW_KIND.to_string()
}
