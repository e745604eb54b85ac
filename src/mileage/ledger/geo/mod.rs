//! Adapters for the remote geocoding and routing services.
//!
//! Both collaborators sit behind small traits so the append workflow can be
//! driven by in-process fakes; the HTTP implementations live in
//! [`geocode`] and [`route`].

pub mod geocode;
pub mod route;

use reqwest::blocking::Client;

use crate::mileage::ledger::config::Config;
use crate::mileage::ledger::error::Result;
use crate::mileage::ledger::model::Coordinates;

pub use geocode::NominatimGeocoder;
pub use route::{OpenRouteServiceRouter, round_trip, round_trip_km};

/// Turns free text into coordinates.
///
/// Implementations never fail loudly: a lookup that finds nothing or cannot
/// reach the service returns `None`.
pub trait Geocoder: Send + Sync {
    fn locate(&self, query: &str) -> Option<Coordinates>;
}

/// Measures the one-way driving distance between two points, in meters.
pub trait Router: Send + Sync {
    fn one_way_meters(&self, from: Coordinates, to: Coordinates) -> Option<f64>;
}

/// Builds the blocking HTTP client shared by the adapters, with bounded
/// timeouts taken from the settings.
pub fn http_client(config: &Config) -> Result<Client> {
    let timeout = config.request_timeout();
    let client = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()?;
    Ok(client)
}
