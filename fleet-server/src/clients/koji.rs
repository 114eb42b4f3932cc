//! Route calculator client for a Koji instance.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use fleet_core::{
    FleetError, Result,
    geo::Location,
    providers::RouteCalculator,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

const ROUTE_ENDPOINT: &str = "api/v1/calc/route/pokestop";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct RouteOptions<'a> {
    instance: &'a str,
    radius: u32,
    routing_time: u32,
    min_points: u32,
    fast: bool,
    area: Vec<[f64; 2]>,
    return_type: &'static str,
}

impl<'a> RouteOptions<'a> {
    fn pokestop_route(instance: &'a str, fence: &[Location]) -> Self {
        Self {
            instance,
            radius: 78,
            routing_time: 5,
            min_points: 1,
            fast: false,
            area: fence.iter().map(|p| [p.latitude, p.longitude]).collect(),
            return_type: "multi_array",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RouteStats {
    #[serde(default)]
    total_points: u64,
    #[serde(default)]
    points_covered: u64,
    #[serde(default)]
    total_distance: f64,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    data: Vec<Vec<Vec<f64>>>,
    #[serde(default)]
    message: String,
    #[serde(default)]
    stats: RouteStats,
}

impl RouteResponse {
    /// The first route of the multi array, as `[lat, lon]` points.
    fn into_route(self) -> Result<Vec<Location>> {
        let Some(first) = self.data.into_iter().next() else {
            return Err(FleetError::RouteCalculation(format!(
                "route calculator returned no route: {}",
                self.message
            )));
        };
        first
            .into_iter()
            .map(|point| match point.as_slice() {
                [lat, lon, ..] => Ok(Location::new(*lat, *lon)),
                _ => Err(FleetError::RouteCalculation(format!(
                    "malformed route point {point:?}"
                ))),
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct KojiClient {
    client: Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl fmt::Debug for KojiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KojiClient")
            .field("base_url", &self.base_url.as_str())
            .field("has_token", &self.bearer_token.is_some())
            .finish()
    }
}

impl KojiClient {
    pub fn new(base_url: Url, bearer_token: Option<String>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url,
            bearer_token,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url.as_str().trim_end_matches('/'), ROUTE_ENDPOINT)
    }
}

#[async_trait]
impl RouteCalculator for KojiClient {
    async fn calculate_route(&self, instance: &str, fence: &[Location]) -> Result<Vec<Location>> {
        let started = std::time::Instant::now();
        let url = self.endpoint();
        debug!(url = %url, instance, points = fence.len(), "requesting route");

        let mut request = self
            .client
            .post(&url)
            .json(&RouteOptions::pokestop_route(instance, fence));
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FleetError::RouteCalculation(format!("request to {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FleetError::RouteCalculation(format!(
                "route calculator answered {status}"
            )));
        }
        let body: RouteResponse = response
            .json()
            .await
            .map_err(|e| FleetError::RouteCalculation(format!("invalid response: {e}")))?;

        let (total, covered, distance) = (
            body.stats.total_points,
            body.stats.points_covered,
            body.stats.total_distance,
        );
        let route = body.into_route()?;
        info!(
            instance,
            hops = route.len(),
            total_points = total,
            points_covered = covered,
            total_distance = distance,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "route calculated"
        );
        Ok(route)
    }
}
