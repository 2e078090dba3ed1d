use std::sync::Arc;

use jenky_engine::Engine;
use jenky_types::{Error, ParameterMap, ParameterValue};
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, ErrorData, GetPromptRequestParams, GetPromptResult, Implementation, ListPromptsResult,
    PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{ServerHandler, service::RequestContext, tool, tool_handler, tool_router};
use serde_json::{Map, Value};
use tracing::debug;

use crate::schemas::{
    BuildRequest, CreateOrUpdateJobRequest, JobRequest, QueueItemRequest, SearchByScenarioRequest, SearchJobsRequest,
    TriggerBuildRequest,
};
use crate::server::prompts;

/// MCP handler exposing the engine's operations as tools.
#[derive(Clone)]
pub struct JenkyMcpCore {
    tool_router: ToolRouter<Self>,
    engine: Arc<Engine>,
}

#[tool_router]
impl JenkyMcpCore {
    /// Create a handler over a shared engine.
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
        }
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "List the names of all configured Jenkins servers."
    )]
    async fn list_servers(&self) -> Result<CallToolResult, ErrorData> {
        Ok(structured(serde_json::json!(self.engine.list_servers())))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "Validate the loaded configuration. Returns valid, errors[], and server_count."
    )]
    async fn validate_config(&self) -> Result<CallToolResult, ErrorData> {
        Ok(structured(serde_json::json!(self.engine.validate_config())))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "List the pre-configured deployment scenarios - the preferred entry point for deployment tasks. Each entry carries index, name, description, server, and job_path. Flow: list_scenarios -> search_jobs_by_scenario -> trigger_build."
    )]
    async fn list_scenarios(&self) -> Result<CallToolResult, ErrorData> {
        Ok(structured(serde_json::json!(self.engine.list_scenarios())))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "Resolve a scenario (by name or index) and return the jobs under its configured job path."
    )]
    async fn search_jobs_by_scenario(
        &self,
        param: Parameters<SearchByScenarioRequest>,
    ) -> Result<CallToolResult, ErrorData> {
        let jobs = self
            .engine
            .search_by_scenario(&param.0.scenario)
            .await
            .map_err(to_error_data)?;
        Ok(structured(serde_json::json!(jobs)))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "Search Jenkins jobs on a server. Omit the keyword to list every job; an exact full-path keyword returns only that job. For deployment tasks prefer list_scenarios + search_jobs_by_scenario."
    )]
    async fn search_jobs(&self, param: Parameters<SearchJobsRequest>) -> Result<CallToolResult, ErrorData> {
        let jobs = self
            .engine
            .search_jobs(&param.0.server, param.0.keyword.as_deref())
            .await
            .map_err(to_error_data)?;
        Ok(structured(serde_json::json!(jobs)))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "Get a job's declared parameter definitions: name, kind, default, and choices for choice parameters."
    )]
    async fn get_job_parameters(&self, param: Parameters<JobRequest>) -> Result<CallToolResult, ErrorData> {
        let parameters = self
            .engine
            .get_parameters(&param.0.server, &param.0.job)
            .await
            .map_err(to_error_data)?;
        Ok(structured(serde_json::json!(parameters)))
    }

    #[tool(
        description = "Trigger a build. Supplied parameters are validated against the job's contract first; validation failures never reach the server. Returns the queue reference and, when the build already started, its number. Poll get_queue_item or get_build_status afterwards."
    )]
    async fn trigger_build(&self, param: Parameters<TriggerBuildRequest>) -> Result<CallToolResult, ErrorData> {
        let supplied = param.0.params.map(convert_parameters).transpose()?;
        debug!(server = %param.0.server, job = %param.0.job, "trigger_build tool invoked");
        let outcome = self
            .engine
            .trigger_build(&param.0.server, &param.0.job, supplied)
            .await
            .map_err(to_error_data)?;
        Ok(structured(serde_json::json!(outcome)))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "Read one snapshot of a queue item, resolving the build number once the build has started."
    )]
    async fn get_queue_item(&self, param: Parameters<QueueItemRequest>) -> Result<CallToolResult, ErrorData> {
        let snapshot = self
            .engine
            .get_queue_item(&param.0.server, param.0.queue_id)
            .await
            .map_err(to_error_data)?;
        Ok(structured(serde_json::json!(snapshot)))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "Read one snapshot of a build: building flag, result, duration, and URL. No polling happens server-side."
    )]
    async fn get_build_status(&self, param: Parameters<BuildRequest>) -> Result<CallToolResult, ErrorData> {
        let info = self
            .engine
            .get_build_status(&param.0.server, &param.0.job, param.0.build_number)
            .await
            .map_err(to_error_data)?;
        Ok(structured(serde_json::json!(info)))
    }

    #[tool(
        description = "Stop a running build. Stopping an already-finished build reports ALREADY_TERMINATED, not an error."
    )]
    async fn stop_build(&self, param: Parameters<BuildRequest>) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .engine
            .stop_build(&param.0.server, &param.0.job, param.0.build_number)
            .await
            .map_err(to_error_data)?;
        Ok(structured(serde_json::json!(outcome)))
    }

    #[tool(
        annotations(read_only_hint = true),
        description = "Fetch the full console log of a build as plain text."
    )]
    async fn get_build_log(&self, param: Parameters<BuildRequest>) -> Result<CallToolResult, ErrorData> {
        let log = self
            .engine
            .get_build_log(&param.0.server, &param.0.job, param.0.build_number)
            .await
            .map_err(to_error_data)?;
        Ok(structured(serde_json::json!({ "log": log })))
    }

    #[tool(
        description = "Create a pipeline job from a Jenkinsfile, or update its definition if it already exists. Jobs land under the managed MCPS/<user> namespace; the folder chain is created idempotently. Returns CREATED or UPDATED plus the resolved full path."
    )]
    async fn create_or_update_job(&self, param: Parameters<CreateOrUpdateJobRequest>) -> Result<CallToolResult, ErrorData> {
        let outcome = self
            .engine
            .create_or_update_job(
                &param.0.server,
                &param.0.job_name,
                &param.0.script,
                param.0.description.as_deref(),
                param.0.folder_path.as_deref(),
            )
            .await
            .map_err(to_error_data)?;
        Ok(structured(serde_json::json!(outcome)))
    }
}

#[tool_handler]
impl ServerHandler for JenkyMcpCore {
    fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListPromptsResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(prompts::list_prompts()))
    }

    fn get_prompt(
        &self,
        request: GetPromptRequestParams,
        _context: RequestContext<rmcp::RoleServer>,
    ) -> impl std::future::Future<Output = Result<GetPromptResult, ErrorData>> + Send + '_ {
        std::future::ready(prompts::get_prompt(&self.engine, &request.name, request.arguments.as_ref()))
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().enable_prompts().build(),
            protocol_version: ProtocolVersion::LATEST,
            server_info: Implementation {
                name: "jenky".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Jenky MCP".to_string()),
                ..Default::default()
            },
            instructions: Some(
                "Jenkins automation server.\nDEPLOYMENT FLOW:\n1) Call list_scenarios and let the user pick one.\n2) Call search_jobs_by_scenario to get the concrete job.\n3) Call get_job_parameters and collect required values.\n4) Call trigger_build, then poll get_queue_item/get_build_status.\nDIRECT FLOW:\n- search_jobs(server, keyword) finds jobs anywhere in the folder tree; an exact full path returns just that job.\nPROVISIONING:\n- create_or_update_job stores a pipeline script under MCPS/<user> and is safe to call repeatedly.\nNOTES:\n- trigger_build refuses locally when parameters do not satisfy the declared contract.\n- stop_build on a finished build is a successful no-op."
                    .to_string(),
            ),
        }
    }
}

fn structured(value: Value) -> CallToolResult {
    CallToolResult::structured(value)
}

/// Convert a JSON parameter object into the engine's parameter map.
fn convert_parameters(params: Map<String, Value>) -> Result<ParameterMap, ErrorData> {
    let mut converted = ParameterMap::new();
    for (name, value) in params {
        let value = ParameterValue::from_json(value).ok_or_else(|| {
            ErrorData::invalid_params(
                format!("parameter '{name}' must be a string, number, or boolean"),
                None,
            )
        })?;
        converted.insert(name, value);
    }
    Ok(converted)
}

/// Map the engine's typed errors onto MCP error data.
fn to_error_data(error: Error) -> ErrorData {
    match &error {
        Error::UnknownServer(_) | Error::UnknownScenario(_) | Error::Config(_) => {
            ErrorData::invalid_params(error.to_string(), None)
        }
        Error::Validation(report) => ErrorData::invalid_params(
            error.to_string(),
            Some(serde_json::json!({
                "missing": report.missing,
                "type_errors": report.type_errors,
            })),
        ),
        Error::JobNotFound { .. } | Error::BuildNotFound { .. } => ErrorData::invalid_params(
            error.to_string(),
            Some(serde_json::json!({ "category": "not_found" })),
        ),
        Error::Permission { .. } => ErrorData::invalid_request(
            error.to_string(),
            Some(serde_json::json!({ "category": "permission" })),
        ),
        Error::Auth { .. } | Error::Network { .. } | Error::Remote { .. } => {
            ErrorData::internal_error(error.to_string(), None)
        }
    }
}
