use std::{fmt, path::PathBuf, str::FromStr, time::Duration};

use fleet_core::{fleet::FleetSettings, sessions::UsageLimits};
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub general: GeneralConfig,
    pub usage_limits: UsageLimits,
    pub koji: Option<KojiConfig>,
    pub processors: ProcessorsConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// Engine tunables derived from the `general` and `usage_limits` sections.
    pub fn fleet_settings(&self) -> FleetSettings {
        let general = &self.general;
        FleetSettings {
            unseen_threshold: chrono::Duration::from_std(general.worker_unseen)
                .unwrap_or_else(|_| chrono::Duration::seconds(300)),
            usage_limits: self.usage_limits.clone(),
            recalc_interval: general.route_recalc_interval,
            quest_rebuild_interval: general.quest_rebuild_interval,
            quest_rebuild_hour: general.quest_rebuild_hour,
            min_level: general.min_account_level,
            max_level: general.max_account_level,
        }
    }

    /// Every endpoint raw payloads are forwarded to. The data processor's
    /// own `/raw` endpoint comes first when one is configured.
    pub fn raw_targets(&self) -> Vec<RawEndpoint> {
        let mut targets = Vec::new();
        if let Some(golbat) = &self.processors.golbat_endpoint {
            let base = golbat.as_str().trim_end_matches('/');
            let url = if base.ends_with("/raw") {
                base.to_string()
            } else {
                format!("{base}/raw")
            };
            targets.push(RawEndpoint {
                url,
                bearer_token: self.processors.golbat_raw_bearer.clone(),
            });
        }
        targets.extend(self.processors.raw_endpoints.iter().cloned());
        targets
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct GeneralConfig {
    pub debug_log: bool,
    /// Shared secret for the operator API (`X-Fleet-Secret`).
    pub api_secret: Option<String>,
    /// Bearer token devices present on the controller and raw endpoints.
    pub bearer_token: Option<String>,
    pub worker_unseen: Duration,
    pub route_recalc_interval: Duration,
    pub quest_rebuild_interval: Duration,
    pub quest_rebuild_hour: u32,
    pub min_account_level: i32,
    pub max_account_level: i32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            debug_log: false,
            api_secret: None,
            bearer_token: None,
            worker_unseen: Duration::from_secs(300),
            route_recalc_interval: Duration::from_secs(300),
            quest_rebuild_interval: Duration::from_secs(3600),
            quest_rebuild_hour: 23,
            min_account_level: 30,
            max_account_level: 40,
        }
    }
}

#[derive(Clone)]
pub struct KojiConfig {
    pub url: Url,
    pub bearer_token: Option<String>,
}

impl fmt::Debug for KojiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KojiConfig")
            .field("url", &self.url.as_str())
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessorsConfig {
    pub golbat_endpoint: Option<Url>,
    pub golbat_raw_bearer: Option<String>,
    pub golbat_api_secret: Option<String>,
    pub raw_endpoints: Vec<RawEndpoint>,
}

/// Forwarding target for raw payloads, written as `token@url` or `url`.
#[derive(Clone, PartialEq, Eq)]
pub struct RawEndpoint {
    pub url: String,
    pub bearer_token: Option<String>,
}

impl fmt::Debug for RawEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawEndpoint")
            .field("url", &self.url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl FromStr for RawEndpoint {
    type Err = url::ParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        // a scheme before the first '@' means the '@' belongs to the URL
        let (token, target) = match raw.split_once('@') {
            Some((token, target)) if !token.contains("://") => {
                (Some(token.to_string()).filter(|t| !t.is_empty()), target)
            }
            _ => (None, raw),
        };
        let url = Url::parse(target)?;
        Ok(Self {
            url: url.to_string(),
            bearer_token: token,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
