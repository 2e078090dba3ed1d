//! The engine facade binding configuration to operations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use jenky_api::JenkinsClient;
use jenky_types::{
    BuildInfo, ConfigReport, Error, JobDescriptor, JobParameter, ParameterMap, ProvisionOutcome, QueueSnapshot,
    Result, ScenarioInfo, StopOutcome, TriggerOutcome,
};
use tracing::debug;

use crate::config::EngineConfig;
use crate::{config, lifecycle, params, provision, scenario, walker};

/// The public operation surface that front-ends bind to a transport.
///
/// One [`JenkinsClient`] is created lazily per server and shared across
/// concurrent operations, so the per-server security token is refreshed at
/// most once per rejection regardless of caller count. Everything else is
/// produced fresh per call.
pub struct Engine {
    config: EngineConfig,
    clients: Mutex<HashMap<String, Arc<JenkinsClient>>>,
}

impl Engine {
    /// Build an engine over a loaded configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Names of all configured servers.
    pub fn list_servers(&self) -> Vec<String> {
        self.config.servers.iter().map(|server| server.name.clone()).collect()
    }

    /// Validate the loaded configuration.
    pub fn validate_config(&self) -> ConfigReport {
        config::validate(&self.config)
    }

    /// List all configured scenarios.
    pub fn list_scenarios(&self) -> Vec<ScenarioInfo> {
        scenario::list(&self.config)
    }

    /// Search the jobs scoped to a scenario's job path prefix.
    pub async fn search_by_scenario(&self, key: &str) -> Result<Vec<JobDescriptor>> {
        let (name, scenario) = scenario::resolve(&self.config, key)?;
        debug!(scenario = %name, server = %scenario.server, prefix = %scenario.job_path, "scenario search");
        let client = self.client(&scenario.server)?;
        walker::collect_under(&client, &scenario.job_path).await
    }

    /// Search a server's jobs by keyword; no keyword lists everything.
    pub async fn search_jobs(&self, server: &str, keyword: Option<&str>) -> Result<Vec<JobDescriptor>> {
        let client = self.client(server)?;
        walker::search(&client, keyword).await
    }

    /// Fetch a job's declared parameter definitions.
    pub async fn get_parameters(&self, server: &str, job_full_name: &str) -> Result<Vec<JobParameter>> {
        let client = self.client(server)?;
        params::get_parameters(&client, job_full_name).await
    }

    /// Trigger a build after validating any supplied parameters.
    pub async fn trigger_build(
        &self,
        server: &str,
        job_full_name: &str,
        supplied: Option<ParameterMap>,
    ) -> Result<TriggerOutcome> {
        let client = self.client(server)?;
        lifecycle::trigger_build(&client, job_full_name, supplied).await
    }

    /// Read one snapshot of a queue item.
    pub async fn get_queue_item(&self, server: &str, queue_id: u64) -> Result<QueueSnapshot> {
        let client = self.client(server)?;
        lifecycle::get_queue_item(&client, queue_id).await
    }

    /// Read one snapshot of a build's state.
    pub async fn get_build_status(&self, server: &str, job_full_name: &str, build_number: u32) -> Result<BuildInfo> {
        let client = self.client(server)?;
        lifecycle::get_build_status(&client, job_full_name, build_number).await
    }

    /// Request that a build be stopped; a no-op on terminal builds.
    pub async fn stop_build(&self, server: &str, job_full_name: &str, build_number: u32) -> Result<StopOutcome> {
        let client = self.client(server)?;
        lifecycle::stop_build(&client, job_full_name, build_number).await
    }

    /// Fetch the full console text of a build.
    pub async fn get_build_log(&self, server: &str, job_full_name: &str, build_number: u32) -> Result<String> {
        let client = self.client(server)?;
        lifecycle::get_build_log(&client, job_full_name, build_number).await
    }

    /// Create a pipeline job under the managed namespace, or update it.
    pub async fn create_or_update_job(
        &self,
        server: &str,
        job_name: &str,
        pipeline_script: &str,
        description: Option<&str>,
        folder_path: Option<&str>,
    ) -> Result<ProvisionOutcome> {
        let client = self.client(server)?;
        provision::create_or_update(&client, job_name, pipeline_script, description, folder_path).await
    }

    /// Session for a named server, created on first use and shared after.
    fn client(&self, server: &str) -> Result<Arc<JenkinsClient>> {
        let mut clients = self
            .clients
            .lock()
            .map_err(|_| Error::config("server session registry is poisoned"))?;
        if let Some(existing) = clients.get(server) {
            return Ok(Arc::clone(existing));
        }

        let entry = self
            .config
            .server(server)
            .ok_or_else(|| Error::UnknownServer(server.to_string()))?;
        let client = Arc::new(JenkinsClient::new(entry.resolve()?)?);
        clients.insert(server.to_string(), Arc::clone(&client));
        Ok(client)
    }
}
