//! Fire-and-forget relay of raw telemetry bodies to the data processors.

use std::{fmt, sync::Arc, time::Duration};

use axum::body::Bytes;
use reqwest::{Client, header};
use tracing::{debug, warn};

use crate::infra::config::RawEndpoint;

const FORWARD_TIMEOUT: Duration = Duration::from_secs(15);
const SENDER_HEADER: &str = "X-Sender";

#[derive(Clone)]
pub struct RawForwarder {
    client: Client,
    targets: Arc<[RawEndpoint]>,
    sender: String,
}

impl fmt::Debug for RawForwarder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawForwarder")
            .field("targets", &self.targets)
            .field("sender", &self.sender)
            .finish()
    }
}

impl RawForwarder {
    pub fn new(targets: Vec<RawEndpoint>, sender: impl Into<String>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(FORWARD_TIMEOUT).build()?;
        Ok(Self {
            client,
            targets: targets.into(),
            sender: sender.into(),
        })
    }

    pub fn targets(&self) -> &[RawEndpoint] {
        &self.targets
    }

    /// Spawns one POST per target and returns immediately. Failures are
    /// logged and never reach the worker.
    pub fn forward(&self, body: Bytes) {
        for target in self.targets.iter() {
            let mut request = self
                .client
                .post(&target.url)
                .header(header::CONTENT_TYPE, "application/json")
                .header(SENDER_HEADER, &self.sender)
                .body(body.clone());
            if let Some(token) = &target.bearer_token {
                request = request.bearer_auth(token);
            }
            let url = target.url.clone();
            tokio::spawn(async move {
                match request.send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!(url = %url, "raw forwarded");
                    }
                    Ok(response) => {
                        warn!(url = %url, status = %response.status(), "raw endpoint rejected payload");
                    }
                    Err(err) => {
                        warn!(url = %url, error = %err, "failed to forward raw");
                    }
                }
            });
        }
    }
}
