use std::path::Path;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::api::ApiConfig;
use super::logging::LoggingConfig;
use super::storage::StorageConfig;

pub const CURRENT_CONFIG_VERSION: &str = "1.0.0";
pub const ENV_PREFIX: &str = "GRAPE_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Extract(#[from] Box<figment::Error>),
    #[error("invalid logging.level '{0}'. Valid values: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
    #[error("failed to render configuration schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// A top-level enum for versioned configurations.
#[derive(Deserialize, Serialize, JsonSchema)]
#[serde(tag = "version")]
pub enum Config {
    #[serde(rename = "1.0.0")]
    ConfigV1(ConfigV1),
}

/// Main config for v1.0.0. Every section has defaults, so an empty file is valid.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
pub struct ConfigV1 {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Layers: built-in version tag, then the YAML file, then `GRAPE_*` env vars
/// (nested keys split on `__`, e.g. `GRAPE_API__BASE_URL`).
pub fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::default("version", CURRENT_CONFIG_VERSION))
        .merge(Yaml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

pub fn extract(figment: &Figment) -> Result<ConfigV1, ConfigError> {
    let config = figment.extract::<Config>().map_err(Box::new)?;
    match config {
        Config::ConfigV1(c) => Ok(c),
    }
    // handle configuration migration between versions here when necessary
}

/// Load config from the YAML file at `path`, overlaid with the environment.
pub fn load_config(path: &Path) -> Result<ConfigV1, ConfigError> {
    extract(&figment_for(path))
}

pub fn schema_json() -> Result<String, ConfigError> {
    let schema = schema_for!(Config);
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// Print the JSON schema for the configuration to stdout.
pub fn print_schema() -> Result<(), ConfigError> {
    println!("{}", schema_json()?);
    Ok(())
}
