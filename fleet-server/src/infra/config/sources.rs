use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::PathBuf};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub general: FileGeneralConfig,
    /// Message type (as a string key) to ceiling.
    #[serde(default)]
    pub usage_limits: BTreeMap<String, u64>,
    pub koji: Option<FileKojiConfig>,
    #[serde(default)]
    pub processors: FileProcessorsConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

/// Durations are humantime strings such as `"5m"` or `"1h 30m"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileGeneralConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_log: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_unseen: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route_recalc_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quest_rebuild_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quest_rebuild_hour: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_account_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_account_level: Option<i32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileKojiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileProcessorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub golbat_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub golbat_raw_bearer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub golbat_api_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_endpoints: Vec<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub debug_log: Option<bool>,
    pub api_secret: Option<String>,
    pub bearer_token: Option<String>,
    pub worker_unseen: Option<String>,
    pub route_recalc_interval: Option<String>,
    pub quest_rebuild_interval: Option<String>,
    pub quest_rebuild_hour: Option<u32>,
    pub min_account_level: Option<i32>,
    pub max_account_level: Option<i32>,
    pub koji_url: Option<String>,
    pub koji_bearer_token: Option<String>,
    pub golbat_endpoint: Option<String>,
    pub golbat_raw_bearer: Option<String>,
    pub golbat_api_secret: Option<String>,
    pub raw_endpoints: Option<Vec<String>>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the environment layer from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        fn parse_raw<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
            raw.and_then(|raw| raw.trim().parse().ok())
        }

        Self {
            config_path: var("FLEET_CONFIG_PATH").map(PathBuf::from),
            server_host: var("FLEET_HOST"),
            server_port: parse_raw(var("FLEET_PORT")),
            database_url: var("DATABASE_URL"),
            database_max_connections: parse_raw(var("DATABASE_MAX_CONNECTIONS")),
            debug_log: var("FLEET_DEBUG_LOG").and_then(|raw| parse_bool(&raw)),
            api_secret: var("FLEET_API_SECRET"),
            bearer_token: var("FLEET_BEARER_TOKEN"),
            worker_unseen: var("FLEET_WORKER_UNSEEN"),
            route_recalc_interval: var("FLEET_ROUTE_RECALC_INTERVAL"),
            quest_rebuild_interval: var("FLEET_QUEST_REBUILD_INTERVAL"),
            quest_rebuild_hour: parse_raw(var("FLEET_QUEST_REBUILD_HOUR")),
            min_account_level: parse_raw(var("FLEET_MIN_ACCOUNT_LEVEL")),
            max_account_level: parse_raw(var("FLEET_MAX_ACCOUNT_LEVEL")),
            koji_url: var("FLEET_KOJI_URL"),
            koji_bearer_token: var("FLEET_KOJI_BEARER_TOKEN"),
            golbat_endpoint: var("FLEET_GOLBAT_ENDPOINT"),
            golbat_raw_bearer: var("FLEET_GOLBAT_RAW_BEARER"),
            golbat_api_secret: var("FLEET_GOLBAT_API_SECRET"),
            raw_endpoints: var("FLEET_RAW_ENDPOINTS").map(|raw| split_csv(&raw)),
        }
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
