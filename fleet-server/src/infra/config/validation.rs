use thiserror::Error;

use super::models::Config;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("min_account_level ({min}) is greater than max_account_level ({max})")]
    InvalidLevelRange { min: i32, max: i32 },
    #[error("quest_rebuild_hour must be between 0 and 23, got {0}")]
    InvalidRebuildHour(u32),
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(&mut self, message: S, hint: H) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

pub fn apply_guard_rails(config: &Config) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let general = &config.general;
    let mut warnings = ConfigWarnings::default();

    if general.min_account_level > general.max_account_level {
        return Err(ConfigGuardRailError::InvalidLevelRange {
            min: general.min_account_level,
            max: general.max_account_level,
        });
    }
    if general.quest_rebuild_hour > 23 {
        return Err(ConfigGuardRailError::InvalidRebuildHour(general.quest_rebuild_hour));
    }
    for (field, value) in [
        ("worker_unseen", general.worker_unseen),
        ("route_recalc_interval", general.route_recalc_interval),
        ("quest_rebuild_interval", general.quest_rebuild_interval),
    ] {
        if value.is_zero() {
            return Err(ConfigGuardRailError::ZeroDuration { field });
        }
    }

    if general.bearer_token.is_none() {
        warnings.push_with_hint(
            "No device bearer token configured; controller and raw endpoints accept any caller",
            "Set general.bearer_token or FLEET_BEARER_TOKEN",
        );
    }
    if general.api_secret.is_none() {
        warnings.push_with_hint(
            "No API secret configured; operator endpoints are unauthenticated",
            "Set general.api_secret or FLEET_API_SECRET",
        );
    }
    if config.koji.is_none() {
        warnings.push_with_hint(
            "No route calculator configured; quest routes cannot be computed",
            "Add a [koji] section with url and bearer_token",
        );
    }
    if config.processors.golbat_endpoint.is_none() {
        warnings.push("No data processor endpoint configured; quest state will not be cleared");
    } else if config.processors.golbat_api_secret.is_none() {
        warnings.push("Data processor endpoint configured without golbat_api_secret");
    }
    if config.usage_limits.is_empty() {
        warnings.push("No usage limits configured; accounts are never disabled for overuse");
    }

    Ok(warnings)
}
