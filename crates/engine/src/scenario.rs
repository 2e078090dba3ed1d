//! Named-scenario resolution.
//!
//! A scenario binds a human intent ("Deploy Application") to a server and a
//! job path prefix. Scenarios can be addressed by exact name, by 1-based
//! index, or by case-insensitive substring, tried in that order, so a
//! scenario literally named "2" always beats index 2.

use jenky_types::{Error, Result, Scenario, ScenarioInfo};
use tracing::debug;

use crate::config::EngineConfig;

/// List all configured scenarios with their 1-based indexes.
pub fn list(config: &EngineConfig) -> Vec<ScenarioInfo> {
    config
        .scenarios
        .iter()
        .enumerate()
        .map(|(position, (name, scenario))| ScenarioInfo {
            index: (position + 1).to_string(),
            name: name.clone(),
            description: scenario.description.clone(),
            server: scenario.server.clone(),
            job_path: scenario.job_path.clone(),
        })
        .collect()
}

/// Resolve a scenario key to its name and configuration.
pub fn resolve<'config>(config: &'config EngineConfig, key: &str) -> Result<(&'config str, &'config Scenario)> {
    let key = key.trim();

    if let Some((name, scenario)) = config.scenarios.get_key_value(key) {
        return Ok((name.as_str(), scenario));
    }

    if let Ok(index) = key.parse::<usize>() {
        if index >= 1
            && let Some((name, scenario)) = config.scenarios.get_index(index - 1)
        {
            debug!(%key, resolved = %name, "scenario resolved by index");
            return Ok((name.as_str(), scenario));
        }
        return Err(Error::UnknownScenario(key.to_string()));
    }

    let needle = key.to_lowercase();
    for (name, scenario) in &config.scenarios {
        if name.to_lowercase().contains(&needle) {
            debug!(%key, resolved = %name, "scenario resolved by substring");
            return Ok((name.as_str(), scenario));
        }
    }

    Err(Error::UnknownScenario(key.to_string()))
}

/// Render a scenario's guidance template.
///
/// `{job_path}` and `{server}` placeholders are substituted; everything
/// else passes through untouched.
pub fn render_prompt(scenario: &Scenario) -> String {
    scenario
        .prompt_template
        .replace("{job_path}", &scenario.job_path)
        .replace("{server}", &scenario.server)
}
