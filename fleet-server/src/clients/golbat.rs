//! Quest state notifier for a Golbat data processor.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use fleet_core::{
    FleetError, Result,
    geo::{Geofence, Location},
    providers::QuestNotifier,
};
use reqwest::Client;
use serde::Serialize;
use tracing::info;
use url::Url;

const CLEAR_QUESTS_ENDPOINT: &str = "api/clearQuests";
const SECRET_HEADER: &str = "X-Golbat-Secret";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct ClearQuestsRequest {
    fence: Vec<Location>,
}

#[derive(Clone)]
pub struct GolbatClient {
    client: Client,
    base_url: Url,
    api_secret: Option<String>,
}

impl fmt::Debug for GolbatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GolbatClient")
            .field("base_url", &self.base_url.as_str())
            .field("has_secret", &self.api_secret.is_some())
            .finish()
    }
}

impl GolbatClient {
    pub fn new(base_url: Url, api_secret: Option<String>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url,
            api_secret,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        let base = base.strip_suffix("/raw").unwrap_or(base);
        format!("{base}/{CLEAR_QUESTS_ENDPOINT}")
    }
}

#[async_trait]
impl QuestNotifier for GolbatClient {
    async fn clear_quests(&self, fence: &Geofence) -> Result<()> {
        let url = self.endpoint();
        let body = ClearQuestsRequest {
            fence: fence.closed(),
        };

        let mut request = self.client.post(&url).json(&body);
        if let Some(secret) = &self.api_secret {
            request = request.header(SECRET_HEADER, secret);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FleetError::QuestNotifier(format!("request to {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FleetError::QuestNotifier(format!(
                "clear quests answered {status}"
            )));
        }
        info!(points = body.fence.len(), "quests cleared upstream");
        Ok(())
    }
}
