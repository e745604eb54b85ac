#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::mpsc::Receiver;

use mileage_ledger::config::Config;
use mileage_ledger::geo::{Geocoder, Router};
use mileage_ledger::model::Coordinates;

pub const ORIGIN: &str = "Hogebankweg 1, 5331 RD";
pub const ORIGIN_POINT: Coordinates = Coordinates {
    longitude: 5.0,
    latitude: 51.0,
};

/// Settings pointing at a ledger inside `dir`, with no courtesy delay.
pub fn test_config(dir: &Path) -> Config {
    Config {
        api_key: "test-key".to_string(),
        origin_address: ORIGIN.to_string(),
        excel_path: dir.join("ritten.xlsx"),
        rate_per_km: 0.23,
        warning_threshold_km: 50.0,
        geocode_pause_ms: 0,
        ..Config::default()
    }
}

/// Geocoder answering from a fixed table and recording every query.
#[derive(Default)]
pub struct FakeGeocoder {
    places: HashMap<String, Coordinates>,
    calls: Mutex<Vec<String>>,
}

impl FakeGeocoder {
    pub fn new() -> Self {
        Self::default().with(ORIGIN, ORIGIN_POINT)
    }

    pub fn with(mut self, query: &str, point: Coordinates) -> Self {
        self.places.insert(query.to_string(), point);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, query: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == query).count()
    }
}

impl Geocoder for FakeGeocoder {
    fn locate(&self, query: &str) -> Option<Coordinates> {
        self.calls.lock().unwrap().push(query.to_string());
        self.places.get(query).copied()
    }
}

/// Geocoder that blocks delivery lookups until the test releases them.
pub struct GatedGeocoder {
    pub inner: FakeGeocoder,
    pub gate: Mutex<Receiver<()>>,
}

impl Geocoder for GatedGeocoder {
    fn locate(&self, query: &str) -> Option<Coordinates> {
        if query != ORIGIN {
            let _ = self.gate.lock().unwrap().recv();
        }
        self.inner.locate(query)
    }
}

/// Router returning a fixed one-way distance per destination.
#[derive(Default)]
pub struct FakeRouter {
    routes: Vec<(Coordinates, f64)>,
}

impl FakeRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, to: Coordinates, one_way_meters: f64) -> Self {
        self.routes.push((to, one_way_meters));
        self
    }
}

impl Router for FakeRouter {
    fn one_way_meters(&self, from: Coordinates, to: Coordinates) -> Option<f64> {
        assert_eq!(from, ORIGIN_POINT, "routes always start at the origin");
        self.routes
            .iter()
            .find(|(point, _)| *point == to)
            .map(|(_, meters)| *meters)
    }
}

pub fn point(longitude: f64, latitude: f64) -> Coordinates {
    Coordinates::new(longitude, latitude)
}
