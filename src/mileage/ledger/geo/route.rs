use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::mileage::ledger::config::Config;
use crate::mileage::ledger::geo::Router;
use crate::mileage::ledger::model::Coordinates;

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: Properties,
}

#[derive(Debug, Deserialize)]
struct Properties {
    summary: Summary,
}

#[derive(Debug, Deserialize)]
struct Summary {
    #[serde(default)]
    distance: Option<f64>,
}

/// Router backed by the openrouteservice directions API.
pub struct OpenRouteServiceRouter {
    client: Client,
    base_url: String,
    api_key: String,
    profile: String,
}

impl OpenRouteServiceRouter {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.router_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            profile: config.routing_profile.clone(),
        }
    }

    fn directions(&self, from: Coordinates, to: Coordinates) -> Result<String, reqwest::Error> {
        let url = format!("{}/v2/directions/{}", self.base_url, self.profile);
        let start = format!("{},{}", from.longitude, from.latitude);
        let end = format!("{},{}", to.longitude, to.latitude);
        self.client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
            ])
            .send()?
            .error_for_status()?
            .text()
    }
}

impl Router for OpenRouteServiceRouter {
    fn one_way_meters(&self, from: Coordinates, to: Coordinates) -> Option<f64> {
        if self.api_key.trim().is_empty() {
            warn!("routing API key is not configured");
            return None;
        }
        let body = match self.directions(from, to) {
            Ok(body) => body,
            Err(error) => {
                warn!(%error, "routing request failed");
                return None;
            }
        };
        let meters = parse_directions_response(&body);
        debug!(?meters, "router answered");
        meters
    }
}

/// Reads the one-way distance in meters from a GeoJSON directions response.
pub fn parse_directions_response(body: &str) -> Option<f64> {
    let response: DirectionsResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(error) => {
            warn!(%error, "unreadable routing response");
            return None;
        }
    };
    response
        .features
        .into_iter()
        .next()
        .and_then(|feature| feature.properties.summary.distance)
        .filter(|meters| meters.is_finite() && *meters >= 0.0)
}

/// Converts a one-way distance in meters into round-trip kilometres,
/// rounded to two decimals.
pub fn round_trip_km(one_way_meters: f64) -> f64 {
    let km = one_way_meters / 1000.0 * 2.0;
    (km * 100.0).round() / 100.0
}

/// Asks the router for a route and returns the round-trip distance in km.
pub fn round_trip(router: &dyn Router, from: Coordinates, to: Coordinates) -> Option<f64> {
    router.one_way_meters(from, to).map(round_trip_km)
}
