//! Configuration IO: locating, parsing, and merging config files.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use jenky_types::Scenario;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::EngineConfig;

const CONFIG_PATH_ENV: &str = "JENKY_CONFIG_FILE";
const SCENARIOS_PATH_ENV: &str = "JENKY_SCENARIOS_FILE";

/// Shape of a standalone scenarios file: a single `scenarios:` table.
#[derive(Debug, Deserialize, Default)]
struct ScenariosFile {
    #[serde(default)]
    scenarios: IndexMap<String, Scenario>,
}

/// Locate the configuration file.
///
/// Resolution order: the `JENKY_CONFIG_FILE` environment variable, then
/// `jenky.yaml`/`jenky.yml` in the working directory, then
/// `<config dir>/jenky/config.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    for candidate in ["jenky.yaml", "jenky.yml"] {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }

    let global = dirs_next::config_dir()?.join("jenky").join("config.yaml");
    global.exists().then_some(global)
}

/// Locate a standalone scenarios file, if any.
///
/// Resolution order: `JENKY_SCENARIOS_FILE`, then `scenarios.yaml`/
/// `scenarios.yml` in the working directory.
pub fn default_scenarios_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(SCENARIOS_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    for candidate in ["scenarios.yaml", "scenarios.yml"] {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from the default locations.
pub fn load_config() -> Result<EngineConfig> {
    load_config_from_paths(None, None)
}

/// Load configuration, honoring explicit path overrides.
///
/// Scenarios from the standalone file are merged over the config file's own
/// scenario table; entries with the same name win over the base table.
pub fn load_config_from_paths(config_path: Option<&Path>, scenarios_path: Option<&Path>) -> Result<EngineConfig> {
    let config_path = config_path.map(Path::to_path_buf).or_else(default_config_path);
    let mut config = match &config_path {
        Some(path) => parse_config_file(path)?,
        None => {
            warn!("no configuration file found; starting with an empty server table");
            EngineConfig::default()
        }
    };

    let scenarios_path = scenarios_path.map(Path::to_path_buf).or_else(default_scenarios_path);
    if let Some(path) = scenarios_path {
        let overlay = parse_scenarios_file(&path)?;
        debug!(path = %path.display(), count = overlay.len(), "merging scenario overlay");
        for (name, scenario) in overlay {
            config.scenarios.insert(name, scenario);
        }
    }

    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<EngineConfig> {
    let content = fs::read_to_string(path).with_context(|| format!("read config file {}", path.display()))?;
    let config = serde_yaml::from_str(&content).with_context(|| format!("parse config file {}", path.display()))?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

fn parse_scenarios_file(path: &Path) -> Result<IndexMap<String, Scenario>> {
    let content = fs::read_to_string(path).with_context(|| format!("read scenarios file {}", path.display()))?;
    let file: ScenariosFile =
        serde_yaml::from_str(&content).with_context(|| format!("parse scenarios file {}", path.display()))?;
    Ok(file.scenarios)
}
