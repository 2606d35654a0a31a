// grant-gate-config/src/config.rs
// ============================================================================
// Module: Grant Gate Configuration
// Description: Configuration loading and validation for Grant Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. Every section has defaults,
//! so an empty file yields a usable configuration.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "grant-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "GRANT_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of owner-equivalent global roles.
pub(crate) const MAX_OWNER_EQUIVALENT_ROLES: usize = 64;
/// Maximum length of a configured object name.
pub(crate) const MAX_NAME_LENGTH: usize = 253;
/// Default permission check timeout in milliseconds.
pub(crate) const DEFAULT_PERMISSION_CHECK_TIMEOUT_MS: u64 = 2_000;
/// Minimum permission check timeout in milliseconds.
pub(crate) const MIN_PERMISSION_CHECK_TIMEOUT_MS: u64 = 100;
/// Maximum permission check timeout in milliseconds.
pub(crate) const MAX_PERMISSION_CHECK_TIMEOUT_MS: u64 = 30_000;
/// Default owner-equivalent global role.
const DEFAULT_OWNER_EQUIVALENT_ROLE: &str = "restricted-admin";
/// Default cluster owner role template.
const DEFAULT_CLUSTER_OWNER_TEMPLATE: &str = "cluster-owner";
/// Default break-glass username.
const DEFAULT_BREAK_GLASS_USERNAME: &str = "system:serviceaccount:grant-gate-system:grant-gate-sudo";
/// Default break-glass group.
const DEFAULT_BREAK_GLASS_GROUP: &str = "system:masters";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Grant Gate configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrantGateConfig {
    /// Feature flag defaults.
    #[serde(default)]
    pub features: FeaturesConfig,
    /// Global role resolution settings.
    #[serde(default)]
    pub global_roles: GlobalRolesConfig,
    /// Break-glass identity.
    #[serde(default)]
    pub break_glass: BreakGlassConfig,
    /// Escalation check settings.
    #[serde(default)]
    pub escalation: EscalationConfig,
    /// Audit sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl GrantGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.global_roles.validate()?;
        self.break_glass.validate()?;
        self.escalation.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

/// Feature flag defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeaturesConfig {
    /// Value of `external-rules` when the feature object is absent.
    #[serde(default)]
    pub external_rules_default: bool,
}

/// Global role resolution settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalRolesConfig {
    /// Global roles treated as cluster owners on every downstream cluster.
    #[serde(default = "default_owner_equivalent_roles")]
    pub owner_equivalent_roles: Vec<String>,
    /// Role template granted to owner-equivalent roles.
    #[serde(default = "default_cluster_owner_template")]
    pub cluster_owner_template: String,
}

impl Default for GlobalRolesConfig {
    fn default() -> Self {
        Self {
            owner_equivalent_roles: default_owner_equivalent_roles(),
            cluster_owner_template: default_cluster_owner_template(),
        }
    }
}

impl GlobalRolesConfig {
    /// Validates global role settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.owner_equivalent_roles.len() > MAX_OWNER_EQUIVALENT_ROLES {
            return Err(ConfigError::Invalid(
                "global_roles.owner_equivalent_roles has too many entries".to_string(),
            ));
        }
        for role in &self.owner_equivalent_roles {
            validate_name("global_roles.owner_equivalent_roles", role)?;
        }
        validate_name("global_roles.cluster_owner_template", &self.cluster_owner_template)
    }
}

/// Break-glass identity that bypasses every admitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BreakGlassConfig {
    /// Required username.
    #[serde(default = "default_break_glass_username")]
    pub username: String,
    /// Required group membership.
    #[serde(default = "default_break_glass_group")]
    pub group: String,
}

impl Default for BreakGlassConfig {
    fn default() -> Self {
        Self {
            username: default_break_glass_username(),
            group: default_break_glass_group(),
        }
    }
}

impl BreakGlassConfig {
    /// Validates the break-glass identity.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.username.trim().is_empty() {
            return Err(ConfigError::Invalid("break_glass.username must be non-empty".to_string()));
        }
        if self.group.trim().is_empty() {
            return Err(ConfigError::Invalid("break_glass.group must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Escalation check settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EscalationConfig {
    /// Time limit for the live escalate-verb check.
    #[serde(default = "default_permission_check_timeout_ms")]
    pub permission_check_timeout_ms: u64,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            permission_check_timeout_ms: default_permission_check_timeout_ms(),
        }
    }
}

impl EscalationConfig {
    /// Returns the permission check timeout.
    #[must_use]
    pub const fn permission_check_timeout(&self) -> Duration {
        Duration::from_millis(self.permission_check_timeout_ms)
    }

    /// Validates escalation settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let range = MIN_PERMISSION_CHECK_TIMEOUT_MS..=MAX_PERMISSION_CHECK_TIMEOUT_MS;
        if !range.contains(&self.permission_check_timeout_ms) {
            return Err(ConfigError::Invalid(format!(
                "escalation.permission_check_timeout_ms must be between \
                 {MIN_PERMISSION_CHECK_TIMEOUT_MS} and {MAX_PERMISSION_CHECK_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Audit disabled.
    None,
}

/// Audit sink settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// File path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, self.path.as_deref()) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required when audit.sink = \"file\"".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid when audit.sink = \"file\"".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default owner-equivalent global roles.
fn default_owner_equivalent_roles() -> Vec<String> {
    vec![DEFAULT_OWNER_EQUIVALENT_ROLE.to_string()]
}

/// Default cluster owner template.
fn default_cluster_owner_template() -> String {
    DEFAULT_CLUSTER_OWNER_TEMPLATE.to_string()
}

/// Default break-glass username.
fn default_break_glass_username() -> String {
    DEFAULT_BREAK_GLASS_USERNAME.to_string()
}

/// Default break-glass group.
fn default_break_glass_group() -> String {
    DEFAULT_BREAK_GLASS_GROUP.to_string()
}

/// Default permission check timeout.
const fn default_permission_check_timeout_ms() -> u64 {
    DEFAULT_PERMISSION_CHECK_TIMEOUT_MS
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path against length constraints.
fn validate_path_string(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a configured object name.
fn validate_name(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} entries must be non-empty")));
    }
    if value.len() > MAX_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} entry exceeds {MAX_NAME_LENGTH} bytes")));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
