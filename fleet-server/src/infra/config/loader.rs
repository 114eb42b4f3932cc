use once_cell::sync::Lazy;
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::PathBuf,
    time::Duration,
};
use thiserror::Error;
use url::Url;

use fleet_core::sessions::{MessageType, UsageLimits};

use super::{
    models::{
        Config, ConfigMetadata, DatabaseConfig, GeneralConfig, KojiConfig, ProcessorsConfig,
        RawEndpoint, ServerConfig,
    },
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("fleet.toml"),
        PathBuf::from("config/fleet.toml"),
        PathBuf::from("config.toml"),
    ]
});

const DEFAULT_PORT: u16 = 9002;
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Same as [`ConfigLoader::load`] with an explicit environment layer and
    /// without touching `.env` files.
    pub fn load_with_env(&self, env: EnvConfig) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) = compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env.config_path) {
            (Some(path), _) | (None, Some(path)) => (path.clone(), true),
            (None, None) => match DEFAULT_CONFIG_LOCATIONS.iter().find(|c| c.exists()) {
                Some(path) => (path.clone(), false),
                None => return Ok((None, None)),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
            path: path.clone(),
            source,
        })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
                path: path.clone(),
                source,
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

/// Layers the environment over the file over the built-in defaults.
pub fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    config_path: Option<PathBuf>,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();
    if file_config.is_none() {
        warnings.push_with_hint(
            "No fleet.toml detected; falling back to environment variables",
            "Pass --config or set FLEET_CONFIG_PATH to load a configuration file",
        );
    }

    let FileConfig {
        server: file_server,
        database: file_database,
        general: file_general,
        usage_limits: file_usage_limits,
        koji: file_koji,
        processors: file_processors,
    } = file_config.unwrap_or_default();

    let server = ServerConfig {
        host: env
            .server_host
            .or(file_server.host)
            .unwrap_or_else(|| "0.0.0.0".to_string()),
        port: env.server_port.or(file_server.port).unwrap_or(DEFAULT_PORT),
    };

    let database = DatabaseConfig {
        url: env.database_url.or(file_database.url),
        max_connections: env
            .database_max_connections
            .or(file_database.max_connections)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS),
    };

    let defaults = GeneralConfig::default();
    let general = GeneralConfig {
        debug_log: env.debug_log.or(file_general.debug_log).unwrap_or(false),
        api_secret: env.api_secret.or(file_general.api_secret),
        bearer_token: env.bearer_token.or(file_general.bearer_token),
        worker_unseen: duration_field(
            "worker_unseen",
            env.worker_unseen.or(file_general.worker_unseen),
            defaults.worker_unseen,
        )?,
        route_recalc_interval: duration_field(
            "route_recalc_interval",
            env.route_recalc_interval.or(file_general.route_recalc_interval),
            defaults.route_recalc_interval,
        )?,
        quest_rebuild_interval: duration_field(
            "quest_rebuild_interval",
            env.quest_rebuild_interval.or(file_general.quest_rebuild_interval),
            defaults.quest_rebuild_interval,
        )?,
        quest_rebuild_hour: env
            .quest_rebuild_hour
            .or(file_general.quest_rebuild_hour)
            .unwrap_or(defaults.quest_rebuild_hour),
        min_account_level: env
            .min_account_level
            .or(file_general.min_account_level)
            .unwrap_or(defaults.min_account_level),
        max_account_level: env
            .max_account_level
            .or(file_general.max_account_level)
            .unwrap_or(defaults.max_account_level),
    };

    let usage_limits = usage_limits(file_usage_limits, &mut warnings);

    let file_koji = file_koji.unwrap_or_default();
    let koji = match env.koji_url.or(file_koji.url) {
        Some(raw) => Some(KojiConfig {
            url: parse_url("koji.url", &raw)?,
            bearer_token: env.koji_bearer_token.or(file_koji.bearer_token),
        }),
        None => None,
    };

    let golbat_endpoint = env
        .golbat_endpoint
        .or(file_processors.golbat_endpoint)
        .map(|raw| parse_url("processors.golbat_endpoint", &raw))
        .transpose()?;
    let raw_endpoints = env
        .raw_endpoints
        .unwrap_or(file_processors.raw_endpoints)
        .iter()
        .map(|raw| {
            raw.parse::<RawEndpoint>()
                .map_err(|source| ConfigLoadError::InvalidUrl {
                    field: "processors.raw_endpoints",
                    value: raw.clone(),
                    source,
                })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let processors = ProcessorsConfig {
        golbat_endpoint,
        golbat_raw_bearer: env.golbat_raw_bearer.or(file_processors.golbat_raw_bearer),
        golbat_api_secret: env.golbat_api_secret.or(file_processors.golbat_api_secret),
        raw_endpoints,
    };

    let config = Config {
        server,
        database,
        general,
        usage_limits,
        koji,
        processors,
        metadata: ConfigMetadata {
            config_path,
            env_file_loaded: false,
        },
    };

    warnings.extend(validation::apply_guard_rails(&config)?);
    Ok((config, warnings))
}

fn duration_field(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        Some(raw) => humantime::parse_duration(raw.trim())
            .map_err(|source| ConfigLoadError::InvalidDuration { field, value: raw, source }),
        None => Ok(default),
    }
}

fn parse_url(field: &'static str, raw: &str) -> Result<Url, ConfigLoadError> {
    Url::parse(raw.trim()).map_err(|source| ConfigLoadError::InvalidUrl {
        field,
        value: raw.to_string(),
        source,
    })
}

fn usage_limits(raw: BTreeMap<String, u64>, warnings: &mut ConfigWarnings) -> UsageLimits {
    let mut ceilings = HashMap::new();
    for (key, ceiling) in raw {
        match key.trim().parse::<MessageType>() {
            Ok(message_type) => {
                ceilings.insert(message_type, ceiling);
            }
            Err(_) => warnings.push(format!(
                "Ignoring usage limit for '{key}': message types are numeric"
            )),
        }
    }
    UsageLimits::new(ceilings)
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("invalid URL for {field}: '{value}'")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
