//! Shared type definitions for the jenky workspace.
//!
//! Everything that crosses a crate boundary lives here: the resolved server
//! and scenario configuration, the descriptors produced by job discovery,
//! parameter definitions and supplied values, build/queue/stop/provision
//! outcomes, and the error taxonomy. Descriptors are produced fresh per
//! query and owned by the caller; nothing in this crate caches remote state.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

mod error;

pub use error::{Error, Result};

/// Resolved configuration for a single Jenkins server.
///
/// Immutable after load. One instance per configured server; looked up by
/// `name` for every operation.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Unique server key used by callers to address this server.
    pub name: String,
    /// Base URI of the Jenkins instance.
    pub uri: Url,
    /// Identity used for basic auth; may be an email address.
    pub user: String,
    /// API token paired with `user`.
    pub token: String,
}

impl ServerConfig {
    /// Base URL with any trailing slash removed, ready for path concatenation.
    pub fn base_url(&self) -> &str {
        self.uri.as_str().trim_end_matches('/')
    }
}

/// A named shortcut binding a human intent to a server and job path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Human-readable description shown in scenario listings.
    pub description: String,
    /// Name of the server the scenario targets (FK into the server table).
    pub server: String,
    /// Job path or folder prefix the scenario is scoped to.
    pub job_path: String,
    /// Guidance template; `{job_path}` and `{server}` placeholders are
    /// substituted when the template is rendered.
    #[serde(default)]
    pub prompt_template: String,
}

/// Scenario listing entry, enriched with its 1-based index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioInfo {
    pub index: String,
    pub name: String,
    pub description: String,
    pub server: String,
    pub job_path: String,
}

/// A discovered job with its full hierarchical path.
///
/// `full_path` is always server-relative, slash-delimited, and never starts
/// with a slash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Short name of the job (last path component).
    pub name: String,
    /// Full slash-delimited path, e.g. `release/deploy/app-a`.
    pub full_path: String,
    /// Absolute URL of the job on the server.
    pub url: String,
    pub description: Option<String>,
    pub buildable: bool,
    /// Jenkins ball color, e.g. `blue`, `red_anime`, `grey`.
    pub status_color: String,
    pub is_parameterized: bool,
    pub last_build_number: Option<u32>,
    pub last_build_url: Option<String>,
}

/// The declared kind of a job parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    String,
    Text,
    Boolean,
    Choice,
    Password,
    Other,
}

impl ParameterKind {
    /// Map a Jenkins `*ParameterDefinition` class name to a kind.
    pub fn from_definition_type(raw: &str) -> Self {
        match raw {
            "StringParameterDefinition" => Self::String,
            "TextParameterDefinition" => Self::Text,
            "BooleanParameterDefinition" => Self::Boolean,
            "ChoiceParameterDefinition" => Self::Choice,
            "PasswordParameterDefinition" => Self::Password,
            _ => Self::Other,
        }
    }
}

/// A value supplied for (or declared as the default of) a job parameter.
///
/// Parameter payloads are loosely typed on the wire; this tagged union keeps
/// the validator exhaustive instead of passing raw JSON around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl ParameterValue {
    /// Convert a JSON value into a parameter value.
    ///
    /// Booleans, integers, and strings map directly; other numbers keep
    /// their textual form. Arrays, objects, and null are rejected.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Bool(flag) => Some(Self::Bool(flag)),
            Value::Number(number) => Some(match number.as_i64() {
                Some(int) => Self::Int(int),
                None => Self::Str(number.to_string()),
            }),
            Value::String(text) => Some(Self::Str(text)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Render the value as it is submitted in a build form/query.
    pub fn as_form_value(&self) -> String {
        match self {
            Self::Bool(flag) => flag.to_string(),
            Self::Int(int) => int.to_string(),
            Self::Str(text) => text.clone(),
        }
    }

    /// Whether the value is acceptable for a boolean parameter.
    pub fn coerces_to_bool(&self) -> bool {
        match self {
            Self::Bool(_) => true,
            Self::Int(int) => *int == 0 || *int == 1,
            Self::Str(text) => matches!(
                text.to_ascii_lowercase().as_str(),
                "true" | "false" | "yes" | "no" | "on" | "off" | "1" | "0"
            ),
        }
    }
}

/// Caller-supplied parameter mapping, in submission order.
pub type ParameterMap = IndexMap<String, ParameterValue>;

/// A job parameter definition as declared by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParameter {
    pub name: String,
    pub kind: ParameterKind,
    /// The raw Jenkins definition class name, kept for display.
    pub raw_type: String,
    pub default: Option<ParameterValue>,
    /// Ordered choices; present and non-empty for `Choice` parameters.
    pub choices: Option<Vec<String>>,
}

/// A single supplied value that does not fit its declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTypeError {
    pub name: String,
    pub reason: String,
}

/// Outcome of validating supplied values against parameter definitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub ok: bool,
    /// Parameters with no default that were not supplied.
    pub missing: Vec<String>,
    pub type_errors: Vec<ParameterTypeError>,
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.ok {
            return f.write_str("parameters are valid");
        }
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing required parameters: {}", self.missing.join(", ")));
        }
        for error in &self.type_errors {
            parts.push(format!("{}: {}", error.name, error.reason));
        }
        f.write_str(&parts.join("; "))
    }
}

/// Terminal (or near-terminal) result of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildResult {
    Success,
    Failure,
    Unstable,
    Aborted,
    NotBuilt,
}

impl BuildResult {
    /// Parse the `result` field of a build API payload.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "SUCCESS" => Some(Self::Success),
            "FAILURE" => Some(Self::Failure),
            "UNSTABLE" => Some(Self::Unstable),
            "ABORTED" => Some(Self::Aborted),
            "NOT_BUILT" => Some(Self::NotBuilt),
            _ => None,
        }
    }
}

/// One snapshot of a build's state.
///
/// `result` is `None` while `building` is true and terminal once set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub number: u32,
    pub building: bool,
    pub result: Option<BuildResult>,
    pub duration_ms: u64,
    pub timestamp_ms: u64,
    pub url: String,
}

/// Whether a triggered build already left the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerStatus {
    BuildStarted,
    Queued,
}

/// Outcome of accepting a build trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerOutcome {
    pub status: TriggerStatus,
    pub build_number: Option<u32>,
    pub build_url: Option<String>,
    pub queue_id: Option<u64>,
    pub queue_url: Option<String>,
    pub message: Option<String>,
}

/// State of a queue item at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Queued,
    BuildStarted,
    NotFound,
}

/// One snapshot read of a queue item; no polling happens behind this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub queue_id: u64,
    pub blocked: bool,
    pub buildable: bool,
    pub stuck: bool,
    pub why: Option<String>,
    pub build_number: Option<u32>,
    pub build_url: Option<String>,
    pub status: QueueStatus,
}

/// How a stop request concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopStatus {
    StopRequested,
    /// The build was already terminal; stopping it is a successful no-op.
    AlreadyTerminated,
    NotFound,
}

/// Outcome of a stop request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopOutcome {
    pub status: StopStatus,
    pub url: Option<String>,
}

/// Whether provisioning created a new job or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisionAction {
    Created,
    Updated,
}

/// Outcome of a create-or-update job operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionOutcome {
    pub action: ProvisionAction,
    /// Resolved full path, immediately usable with `trigger_build`.
    pub full_path: String,
    pub url: String,
}

/// Result of validating the loaded configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub server_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parameter_value_from_json_accepts_scalars_only() {
        assert_eq!(ParameterValue::from_json(json!(true)), Some(ParameterValue::Bool(true)));
        assert_eq!(ParameterValue::from_json(json!(42)), Some(ParameterValue::Int(42)));
        assert_eq!(
            ParameterValue::from_json(json!("dev")),
            Some(ParameterValue::Str("dev".to_string()))
        );
        assert_eq!(
            ParameterValue::from_json(json!(1.5)),
            Some(ParameterValue::Str("1.5".to_string()))
        );
        assert_eq!(ParameterValue::from_json(json!(null)), None);
        assert_eq!(ParameterValue::from_json(json!(["a"])), None);
        assert_eq!(ParameterValue::from_json(json!({"a": 1})), None);
    }

    #[test]
    fn parameter_value_boolean_coercion() {
        for accepted in ["true", "False", "YES", "no", "on", "off", "1", "0"] {
            assert!(
                ParameterValue::Str(accepted.to_string()).coerces_to_bool(),
                "'{accepted}' should coerce"
            );
        }
        assert!(ParameterValue::Bool(false).coerces_to_bool());
        assert!(ParameterValue::Int(1).coerces_to_bool());
        assert!(!ParameterValue::Int(2).coerces_to_bool());
        assert!(!ParameterValue::Str("maybe".to_string()).coerces_to_bool());
    }

    #[test]
    fn parameter_kind_maps_definition_classes() {
        assert_eq!(
            ParameterKind::from_definition_type("ChoiceParameterDefinition"),
            ParameterKind::Choice
        );
        assert_eq!(
            ParameterKind::from_definition_type("BooleanParameterDefinition"),
            ParameterKind::Boolean
        );
        assert_eq!(
            ParameterKind::from_definition_type("FileParameterDefinition"),
            ParameterKind::Other
        );
    }

    #[test]
    fn build_result_wire_round_trip() {
        assert_eq!(BuildResult::from_wire("SUCCESS"), Some(BuildResult::Success));
        assert_eq!(BuildResult::from_wire("NOT_BUILT"), Some(BuildResult::NotBuilt));
        assert_eq!(BuildResult::from_wire("IN_PROGRESS"), None);

        let serialized = serde_json::to_string(&BuildResult::Aborted).expect("serialize result");
        assert_eq!(serialized, "\"ABORTED\"");
    }

    #[test]
    fn server_config_base_url_strips_trailing_slash() {
        let server = ServerConfig {
            name: "ci".to_string(),
            uri: Url::parse("https://ci.example.com/").expect("url"),
            user: "bot".to_string(),
            token: "secret".to_string(),
        };
        assert_eq!(server.base_url(), "https://ci.example.com");
    }

    #[test]
    fn validation_report_display_lists_all_problems() {
        let report = ValidationReport {
            ok: false,
            missing: vec!["ENV".to_string(), "REGION".to_string()],
            type_errors: vec![ParameterTypeError {
                name: "DRY_RUN".to_string(),
                reason: "value 'maybe' is not a boolean".to_string(),
            }],
        };
        let rendered = report.to_string();
        assert!(rendered.contains("ENV, REGION"));
        assert!(rendered.contains("DRY_RUN"));
    }
}
