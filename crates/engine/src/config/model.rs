//! Data models for jenky configuration.

use indexmap::IndexMap;
use jenky_types::{Error, Result, Scenario, ServerConfig};
use serde::{Deserialize, Serialize};
use url::Url;

/// Top-level configuration: the server table plus the ordered scenario map.
///
/// Scenario order is observable (scenarios can be addressed by 1-based
/// index), so the map preserves insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
    #[serde(default)]
    pub scenarios: IndexMap<String, Scenario>,
}

impl EngineConfig {
    /// Look up a server entry by name.
    pub fn server(&self, name: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|server| server.name == name)
    }
}

/// One configured Jenkins server, as written in the config file.
///
/// The token can be given inline (`token`) or indirected through an
/// environment variable (`tokenEnv`); the environment wins when both are
/// present and the variable is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerEntry {
    pub name: String,
    pub uri: Url,
    pub user: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "tokenEnv")]
    pub token_env: Option<String>,
}

impl ServerEntry {
    /// Resolve the entry into an immutable [`ServerConfig`].
    pub fn resolve(&self) -> Result<ServerConfig> {
        let token = self
            .token_env
            .as_deref()
            .and_then(|key| std::env::var(key).ok())
            .filter(|value| !value.is_empty())
            .or_else(|| self.token.clone())
            .ok_or_else(|| {
                Error::config(format!(
                    "server '{}' has no token; set `token` or export the variable named by `tokenEnv`",
                    self.name
                ))
            })?;

        Ok(ServerConfig {
            name: self.name.clone(),
            uri: self.uri.clone(),
            user: self.user.clone(),
            token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(token: Option<&str>, token_env: Option<&str>) -> ServerEntry {
        ServerEntry {
            name: "ci".to_string(),
            uri: Url::parse("https://ci.example.com").expect("url"),
            user: "bot@example.com".to_string(),
            token: token.map(str::to_string),
            token_env: token_env.map(str::to_string),
        }
    }

    #[test]
    fn resolve_prefers_environment_token() {
        temp_env::with_var("JENKY_TEST_CI_TOKEN", Some("from-env"), || {
            let resolved = entry(Some("inline"), Some("JENKY_TEST_CI_TOKEN"))
                .resolve()
                .expect("resolve");
            assert_eq!(resolved.token, "from-env");
        });
    }

    #[test]
    fn resolve_falls_back_to_inline_token() {
        temp_env::with_var_unset("JENKY_TEST_CI_TOKEN_UNSET", || {
            let resolved = entry(Some("inline"), Some("JENKY_TEST_CI_TOKEN_UNSET"))
                .resolve()
                .expect("resolve");
            assert_eq!(resolved.token, "inline");
        });
    }

    #[test]
    fn resolve_without_any_token_is_a_config_error() {
        temp_env::with_var_unset("JENKY_TEST_CI_TOKEN_UNSET", || {
            let error = entry(None, Some("JENKY_TEST_CI_TOKEN_UNSET"))
                .resolve()
                .expect_err("no token available");
            assert!(error.to_string().contains("tokenEnv"));
        });
    }

    #[test]
    fn config_parses_yaml_with_ordered_scenarios() {
        let yaml = r#"
servers:
  - name: maglev-sre
    uri: https://ci.example.com
    user: bot@example.com
    tokenEnv: CI_TOKEN
scenarios:
  "Deploy Application":
    description: Deploy the main application
    server: maglev-sre
    job_path: release/deploy/
  "Run Smoke Tests":
    description: Post-deploy smoke suite
    server: maglev-sre
    job_path: release/smoke
    prompt_template: "Use job {job_path} on {server}."
"#;
        let config: EngineConfig = serde_yaml::from_str(yaml).expect("parse config");
        assert_eq!(config.servers.len(), 1);
        assert_eq!(config.servers[0].token_env.as_deref(), Some("CI_TOKEN"));

        let names: Vec<&String> = config.scenarios.keys().collect();
        assert_eq!(names, ["Deploy Application", "Run Smoke Tests"]);
        assert_eq!(config.scenarios["Deploy Application"].prompt_template, "");
    }
}
