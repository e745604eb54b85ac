use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::mileage::ledger::config::Config;
use crate::mileage::ledger::geo::Geocoder;
use crate::mileage::ledger::model::Coordinates;

/// One candidate of a Nominatim `/search` response. Coordinates arrive as
/// decimal strings.
#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Geocoder backed by a Nominatim-compatible search endpoint.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    country_code: String,
}

impl NominatimGeocoder {
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.geocoder_url.trim_end_matches('/').to_string(),
            country_code: config.country_code.clone(),
        }
    }

    fn search(&self, query: &str) -> Result<String, reqwest::Error> {
        let url = format!("{}/search", self.base_url);
        self.client
            .get(&url)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("limit", "1"),
                ("countrycodes", self.country_code.as_str()),
            ])
            .send()?
            .error_for_status()?
            .text()
    }
}

impl Geocoder for NominatimGeocoder {
    fn locate(&self, query: &str) -> Option<Coordinates> {
        let body = match self.search(query) {
            Ok(body) => body,
            Err(error) => {
                warn!(query, %error, "geocoder request failed");
                return None;
            }
        };
        let found = parse_search_response(&body);
        debug!(query, ?found, "geocoder answered");
        found
    }
}

/// Extracts the first candidate of a search response as `(lon, lat)`.
///
/// An empty result list or a malformed body yields `None`.
pub fn parse_search_response(body: &str) -> Option<Coordinates> {
    let places: Vec<Place> = match serde_json::from_str(body) {
        Ok(places) => places,
        Err(error) => {
            warn!(%error, "unreadable geocoder response");
            return None;
        }
    };
    let place = places.into_iter().next()?;
    let longitude = place.lon.trim().parse::<f64>().ok()?;
    let latitude = place.lat.trim().parse::<f64>().ok()?;
    Some(Coordinates::new(longitude, latitude))
}
