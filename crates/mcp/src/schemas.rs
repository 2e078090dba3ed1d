//! Request parameter schemas for the MCP tools.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameters for scenario-scoped job searches.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone)]
pub struct SearchByScenarioRequest {
    /// Scenario name or 1-based index.
    #[schemars(description = "Scenario name or 1-based index as listed by list_scenarios.")]
    pub scenario: String,
}

/// Parameters for keyword job searches.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone)]
pub struct SearchJobsRequest {
    /// Jenkins server name.
    #[schemars(description = "Jenkins server name as listed by list_servers.")]
    pub server: String,
    /// Optional search keyword; omitting it lists every job.
    #[schemars(
        description = "Optional keyword, matched case-insensitively against job names and full paths. An exact full-path match returns only that job."
    )]
    pub keyword: Option<String>,
}

/// Parameters addressing one job.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone)]
pub struct JobRequest {
    /// Jenkins server name.
    #[schemars(description = "Jenkins server name as listed by list_servers.")]
    pub server: String,
    /// Full slash-delimited job path.
    #[schemars(description = "Full job path, e.g. 'release/deploy/app-a'.")]
    pub job: String,
}

/// Parameters for triggering a build.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone)]
pub struct TriggerBuildRequest {
    /// Jenkins server name.
    #[schemars(description = "Jenkins server name as listed by list_servers.")]
    pub server: String,
    /// Full slash-delimited job path.
    #[schemars(description = "Full job path, e.g. 'release/deploy/app-a'.")]
    pub job: String,
    /// Build parameters by name; scalar values only.
    #[schemars(
        description = "Optional build parameters as a name/value object. Values must be strings, numbers, or booleans. Ignored (with a warning) for non-parameterized jobs."
    )]
    pub params: Option<Map<String, Value>>,
}

/// Parameters addressing one queue item.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone)]
pub struct QueueItemRequest {
    /// Jenkins server name.
    #[schemars(description = "Jenkins server name as listed by list_servers.")]
    pub server: String,
    /// Queue item id returned by trigger_build.
    #[schemars(description = "Queue item id from a trigger_build outcome.")]
    pub queue_id: u64,
}

/// Parameters addressing one build of one job.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone)]
pub struct BuildRequest {
    /// Jenkins server name.
    #[schemars(description = "Jenkins server name as listed by list_servers.")]
    pub server: String,
    /// Full slash-delimited job path.
    #[schemars(description = "Full job path, e.g. 'release/deploy/app-a'.")]
    pub job: String,
    /// Build number scoped to the job.
    #[schemars(description = "Build number to operate on.")]
    pub build_number: u32,
}

/// Parameters for creating or updating a pipeline job.
#[derive(JsonSchema, Serialize, Deserialize, Debug, Clone)]
pub struct CreateOrUpdateJobRequest {
    /// Jenkins server name.
    #[schemars(description = "Jenkins server name as listed by list_servers.")]
    pub server: String,
    /// Job name; a single path component.
    #[schemars(description = "Job name (single path component). The job lands under the managed MCPS/<user> namespace.")]
    pub job_name: String,
    /// Pipeline (Jenkinsfile) script text.
    #[schemars(description = "Pipeline script content; executed in the Groovy sandbox.")]
    pub script: String,
    /// Optional job description.
    #[schemars(description = "Optional job description.")]
    pub description: Option<String>,
    /// Optional sub-folder below the managed namespace.
    #[schemars(description = "Optional slash-delimited folder path below MCPS/<user>.")]
    pub folder_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_request_accepts_mixed_scalar_params() {
        let request: TriggerBuildRequest = serde_json::from_value(serde_json::json!({
            "server": "ci",
            "job": "release/deploy",
            "params": {"ENV": "prod", "DRY_RUN": true, "COUNT": 3}
        }))
        .expect("deserialize request");

        let params = request.params.expect("params present");
        assert_eq!(params.len(), 3);
        assert!(params["DRY_RUN"].is_boolean());
    }

    #[test]
    fn keyword_is_optional_in_search_requests() {
        let request: SearchJobsRequest =
            serde_json::from_value(serde_json::json!({"server": "ci"})).expect("deserialize request");
        assert!(request.keyword.is_none());
    }
}
