//! Builds the external collaborators the fleet talks to from config.

use std::sync::Arc;

use anyhow::{Context, Result};
use fleet_core::fleet::FleetServices;
use tracing::{info, warn};

use crate::clients::{GolbatClient, KojiClient, RawForwarder};
use crate::infra::config::Config;
use crate::infra::timezone::TzfTimezoneResolver;

pub const RAW_SENDER: &str = "fleet-controller";

pub fn fleet_services(config: &Config) -> Result<FleetServices> {
    let mut services = FleetServices {
        timezone: Arc::new(TzfTimezoneResolver::new()),
        ..FleetServices::default()
    };

    match &config.koji {
        Some(koji) => {
            let client = KojiClient::new(koji.url.clone(), koji.bearer_token.clone())
                .context("failed to build route calculator client")?;
            info!(url = %koji.url, "route calculator configured");
            services.route_calculator = Some(Arc::new(client));
        }
        None => warn!("no route calculator configured, quest routes will not be rebuilt"),
    }

    if let Some(endpoint) = &config.processors.golbat_endpoint {
        let client = GolbatClient::new(endpoint.clone(), config.processors.golbat_api_secret.clone())
            .context("failed to build quest notifier client")?;
        services.quest_notifier = Some(Arc::new(client));
    }

    Ok(services)
}

pub fn raw_forwarder(config: &Config) -> Result<RawForwarder> {
    let targets = config.raw_targets();
    info!(targets = targets.len(), "raw forwarding configured");
    RawForwarder::new(targets, RAW_SENDER).context("failed to build raw forwarding client")
}
