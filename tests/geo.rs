use mileage_ledger::config::Config;
use mileage_ledger::geo::geocode::parse_search_response;
use mileage_ledger::geo::route::parse_directions_response;
use mileage_ledger::geo::{
    Geocoder, NominatimGeocoder, OpenRouteServiceRouter, Router, http_client, round_trip,
    round_trip_km,
};
use mileage_ledger::model::Coordinates;

#[test]
fn search_response_yields_longitude_then_latitude() {
    let body = r#"[{"place_id":1,"lat":"51.4416","lon":"5.4697","display_name":"Eindhoven"}]"#;
    assert_eq!(
        parse_search_response(body),
        Some(Coordinates::new(5.4697, 51.4416))
    );
}

#[test]
fn empty_or_malformed_search_response_is_not_found() {
    assert_eq!(parse_search_response("[]"), None);
    assert_eq!(parse_search_response("<html>busy</html>"), None);
    assert_eq!(parse_search_response(r#"[{"lat":"north","lon":"5.0"}]"#), None);
}

#[test]
fn directions_response_yields_one_way_meters() {
    let body = r#"{
        "type": "FeatureCollection",
        "features": [
            {"properties": {"summary": {"distance": 12345.6, "duration": 901.2}}}
        ]
    }"#;
    assert_eq!(parse_directions_response(body), Some(12345.6));
}

#[test]
fn directions_error_or_missing_distance_is_unavailable() {
    let error = r#"{"error": {"code": 2010, "message": "Could not find routable point"}}"#;
    assert_eq!(parse_directions_response(error), None);

    let no_distance = r#"{"features": [{"properties": {"summary": {}}}]}"#;
    assert_eq!(parse_directions_response(no_distance), None);

    assert_eq!(parse_directions_response("Access to this API has been disallowed"), None);
}

#[test]
fn round_trip_doubles_and_rounds_to_two_decimals() {
    assert_eq!(round_trip_km(12345.6), 24.69);
    assert_eq!(round_trip_km(1234.5), 2.47);
    assert_eq!(round_trip_km(25000.0), 50.0);
    assert_eq!(round_trip_km(0.0), 0.0);
}

struct FixedRouter(Option<f64>);

impl Router for FixedRouter {
    fn one_way_meters(&self, _from: Coordinates, _to: Coordinates) -> Option<f64> {
        self.0
    }
}

#[test]
fn round_trip_passes_through_unavailable_routes() {
    let a = Coordinates::new(5.0, 51.0);
    let b = Coordinates::new(5.1, 51.1);
    assert_eq!(round_trip(&FixedRouter(Some(7500.0)), a, b), Some(15.0));
    assert_eq!(round_trip(&FixedRouter(None), a, b), None);
}

#[test]
fn router_without_api_key_reports_unavailable() {
    let config = Config {
        api_key: String::new(),
        router_url: "http://127.0.0.1:9".to_string(),
        ..Config::default()
    };
    let client = http_client(&config).expect("client built");
    let router = OpenRouteServiceRouter::new(client, &config);
    let a = Coordinates::new(5.0, 51.0);
    assert_eq!(router.one_way_meters(a, a), None);
}

#[test]
fn unreachable_geocoder_reports_not_found() {
    let config = Config {
        geocoder_url: "http://127.0.0.1:9".to_string(),
        request_timeout_secs: 1,
        ..Config::default()
    };
    let client = http_client(&config).expect("client built");
    let geocoder = NominatimGeocoder::new(client, &config);
    assert_eq!(geocoder.locate("5324 JW, Netherlands"), None);
}
