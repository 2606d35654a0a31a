// grant-gate-admission/src/audit.rs
// ============================================================================
// Module: Admission Audit Logging
// Description: Structured audit events for admission decisions.
// Purpose: Emit JSON-line audit records without hard logging dependencies.
// Dependencies: grant-gate-config, serde, serde_json
// ============================================================================

//! ## Overview
//! Every admission request produces one decision event. Escalate-verb
//! bypasses, failed permission checks, and break-glass admissions produce
//! additional security events so operators can trace unusual grants.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use grant_gate_config::AuditConfig;
use grant_gate_config::AuditSinkKind;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Admission decision event payload.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Admission request identifier.
    pub uid: String,
    /// Validate or mutate.
    pub mode: &'static str,
    /// Target resource.
    pub resource: String,
    /// Admission operation.
    pub operation: String,
    /// Object name.
    pub name: String,
    /// Requester username.
    pub username: String,
    /// Verdict.
    pub allowed: bool,
    /// Response status code.
    pub code: u16,
    /// Denial or failure message.
    pub message: Option<String>,
    /// Admitter that produced the verdict.
    pub admitter: Option<&'static str>,
}

/// Parameters for [`DecisionAuditEvent`].
#[derive(Debug, Clone)]
pub struct DecisionAuditEventParams {
    /// Admission request identifier.
    pub uid: String,
    /// Validate or mutate.
    pub mode: &'static str,
    /// Target resource.
    pub resource: String,
    /// Admission operation.
    pub operation: String,
    /// Object name.
    pub name: String,
    /// Requester username.
    pub username: String,
    /// Verdict.
    pub allowed: bool,
    /// Response status code.
    pub code: u16,
    /// Denial or failure message.
    pub message: Option<String>,
    /// Admitter that produced the verdict.
    pub admitter: Option<&'static str>,
}

/// Security-relevant admission event payload.
#[derive(Debug, Clone, Serialize)]
pub struct SecurityAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Event kind label.
    pub kind: &'static str,
    /// Requester username.
    pub username: String,
    /// Resource the event concerns.
    pub resource: String,
    /// Scope the event concerns; empty for cluster-wide.
    pub scope: String,
    /// Detail message.
    pub message: String,
}

/// Parameters for [`SecurityAuditEvent`].
#[derive(Debug, Clone)]
pub struct SecurityAuditEventParams {
    /// Event kind label.
    pub kind: &'static str,
    /// Requester username.
    pub username: String,
    /// Resource the event concerns.
    pub resource: String,
    /// Scope the event concerns.
    pub scope: String,
    /// Detail message.
    pub message: String,
}

/// Kind label for escalate-verb bypasses.
pub const ESCALATE_BYPASS_KIND: &str = "escalate_bypass";
/// Kind label for failed or timed-out permission checks.
pub const PERMISSION_CHECK_FAILED_KIND: &str = "permission_check_failed";
/// Kind label for break-glass admissions.
pub const BREAK_GLASS_KIND: &str = "break_glass";

impl DecisionAuditEvent {
    /// Creates a new decision event with a consistent timestamp.
    #[must_use]
    pub fn new(params: DecisionAuditEventParams) -> Self {
        Self {
            event: "admission_decision",
            timestamp_ms: now_ms(),
            uid: params.uid,
            mode: params.mode,
            resource: params.resource,
            operation: params.operation,
            name: params.name,
            username: params.username,
            allowed: params.allowed,
            code: params.code,
            message: params.message,
            admitter: params.admitter,
        }
    }
}

impl SecurityAuditEvent {
    /// Creates a new security event with a consistent timestamp.
    #[must_use]
    pub fn new(params: SecurityAuditEventParams) -> Self {
        Self {
            event: "admission_security",
            timestamp_ms: now_ms(),
            kind: params.kind,
            username: params.username,
            resource: params.resource,
            scope: params.scope,
            message: params.message,
        }
    }
}

/// Milliseconds since the epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for admission events.
pub trait AdmissionAuditSink: Send + Sync {
    /// Record a decision event.
    fn record_decision(&self, event: &DecisionAuditEvent);

    /// Record a security event.
    fn record_security(&self, _event: &SecurityAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AdmissionAuditSink for StderrAuditSink {
    fn record_decision(&self, event: &DecisionAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends one serialized event.
    fn append(&self, payload: &str) {
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AdmissionAuditSink for FileAuditSink {
    fn record_decision(&self, event: &DecisionAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            self.append(&payload);
        }
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            self.append(&payload);
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AdmissionAuditSink for NoopAuditSink {
    fn record_decision(&self, _event: &DecisionAuditEvent) {}

    fn record_security(&self, _event: &SecurityAuditEvent) {}
}

/// Audit sink that keeps serialized events in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<Value>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<Value> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns recorded events whose `event` or `kind` equals `label`.
    #[must_use]
    pub fn events_labeled(&self, label: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|event| {
                event.get("event").and_then(Value::as_str) == Some(label)
                    || event.get("kind").and_then(Value::as_str) == Some(label)
            })
            .collect()
    }

    /// Stores one event.
    fn push<T: Serialize>(&self, event: &T) {
        if let Ok(value) = serde_json::to_value(event)
            && let Ok(mut events) = self.events.lock()
        {
            events.push(value);
        }
    }
}

impl AdmissionAuditSink for MemoryAuditSink {
    fn record_decision(&self, event: &DecisionAuditEvent) {
        self.push(event);
    }

    fn record_security(&self, event: &SecurityAuditEvent) {
        self.push(event);
    }
}

// ============================================================================
// SECTION: Construction
// ============================================================================

/// Builds the sink selected by `config`.
///
/// # Errors
///
/// Returns an error if a file sink cannot open its path.
pub fn audit_sink_from_config(config: &AuditConfig) -> io::Result<Arc<dyn AdmissionAuditSink>> {
    match config.sink {
        AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
        AuditSinkKind::File => {
            let path = config.path.as_deref().ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "audit.path is required for file sink")
            })?;
            Ok(Arc::new(FileAuditSink::new(path)?))
        }
    }
}
