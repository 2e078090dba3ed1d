//! Configuration validation.

use jenky_types::ConfigReport;
use tracing::debug;

use crate::config::EngineConfig;

/// Validate the loaded configuration and report every problem found.
///
/// Validation never fails hard; callers decide whether an invalid
/// configuration is fatal (the CLI warns and continues so the report is
/// still reachable through the tool surface).
pub fn validate(config: &EngineConfig) -> ConfigReport {
    let mut errors = Vec::new();

    if config.servers.is_empty() {
        errors.push("no Jenkins servers configured".to_string());
    }

    for server in &config.servers {
        if server.name.trim().is_empty() {
            errors.push("server with empty name".to_string());
            continue;
        }
        let duplicates = config.servers.iter().filter(|other| other.name == server.name).count();
        if duplicates > 1 && !errors.iter().any(|e| e.contains(&format!("duplicate server name '{}'", server.name))) {
            errors.push(format!("duplicate server name '{}'", server.name));
        }
        if server.user.trim().is_empty() {
            errors.push(format!("server '{}' is missing field: user", server.name));
        }
        if server.token.is_none() && server.token_env.is_none() {
            errors.push(format!("server '{}' has neither `token` nor `tokenEnv`", server.name));
        }
        let scheme = server.uri.scheme();
        if scheme != "http" && scheme != "https" {
            errors.push(format!(
                "server '{}' has unsupported URI scheme '{}' (expected http/https)",
                server.name, scheme
            ));
        }
    }

    for (name, scenario) in &config.scenarios {
        if scenario.job_path.trim_matches('/').is_empty() {
            errors.push(format!("scenario '{name}' has an empty job path"));
        }
        if config.server(&scenario.server).is_none() {
            errors.push(format!(
                "scenario '{name}' references unknown server '{}'",
                scenario.server
            ));
        }
    }

    debug!(server_count = config.servers.len(), error_count = errors.len(), "configuration validated");
    ConfigReport {
        valid: errors.is_empty(),
        server_count: config.servers.len(),
        errors,
    }
}
