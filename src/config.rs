//! Configuration schema and loader (ambient component A1).

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

const CONFIG_PATH_ENV: &str = "CFA635_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path} as JSON")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub displays: Vec<DisplayConfig>,
    /// Base URL for the Prometheus-compatible query endpoint the example
    /// pages use.
    pub metrics_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    pub id: u8,
    pub name: String,
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub render_period: Option<f64>,
    pub transition: Option<TransitionConfig>,
    pub auto_cycle_time: Option<f64>,
    #[serde(default)]
    pub pages: Vec<PageConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransitionConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default = "default_transition_period")]
    pub period: f64,
}

fn default_transition_period() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: Option<String>,
    pub update_period: Option<f64>,
}

/// Loads the configuration from the path named by `CFA635_CONFIG`
/// (default `config.json`), or from `override_path` if given.
pub fn load_config(override_path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned())),
    };

    let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_config() {
        let json = r#"{
            "displays": [
                {
                    "id": 5,
                    "name": "left",
                    "driver": {
                        "type": "paged",
                        "auto_cycle_time": 5,
                        "pages": [{"type": "ping"}]
                    }
                }
            ],
            "metrics_url": "http://prometheus:9090"
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.displays.len(), 1);
        assert_eq!(config.displays[0].id, 5);
        assert_eq!(config.displays[0].driver.kind, "paged");
        assert_eq!(config.displays[0].driver.pages.len(), 1);
        assert_eq!(config.metrics_url.as_deref(), Some("http://prometheus:9090"));
    }

    #[test]
    fn transition_period_defaults_to_one_second() {
        let json = r#"{"type": "curtain"}"#;
        let transition: TransitionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(transition.period, 1.0);
    }

    #[test]
    fn missing_file_surfaces_io_error() {
        let err = load_config(Some(Path::new("/nonexistent/cfa635-config.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
