mod common;

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use common::{FakeGeocoder, FakeRouter, GatedGeocoder, ORIGIN, ORIGIN_POINT, point, test_config};
use mileage_ledger::ToolError;
use mileage_ledger::config::Config;
use mileage_ledger::model::DeliveryEntry;
use mileage_ledger::session::{OriginCache, Session};
use mileage_ledger::workflow::{BatchRequest, CancelFlag, Progress};
use tempfile::tempdir;

const MOVED_ORIGIN: &str = "Markt 1, 5611 EB";

fn request() -> BatchRequest {
    BatchRequest::new(
        "18-04-2025",
        vec![DeliveryEntry::new(Some("5324 JW"), None)],
    )
}

fn geocoder() -> FakeGeocoder {
    FakeGeocoder::new()
        .with("5324 JW, Netherlands", point(5.3, 51.7))
        .with(MOVED_ORIGIN, ORIGIN_POINT)
}

#[test]
fn origin_is_geocoded_once_across_batches() {
    let temp_dir = tempdir().expect("temporary directory");
    let geocoder = Arc::new(geocoder());
    let router = Arc::new(FakeRouter::new().with(point(5.3, 51.7), 12000.0));
    let session = Session::new(
        test_config(temp_dir.path()),
        None,
        geocoder.clone(),
        router,
    );

    for _ in 0..2 {
        session
            .run(&request(), &CancelFlag::new(), &mut |_| {})
            .expect("batch succeeded");
    }

    assert_eq!(geocoder.calls_for(ORIGIN), 1);
    assert_eq!(geocoder.calls_for("5324 JW, Netherlands"), 2);
}

#[test]
fn changing_the_origin_invalidates_the_cache() {
    let temp_dir = tempdir().expect("temporary directory");
    let geocoder = Arc::new(geocoder());
    let router = Arc::new(FakeRouter::new().with(point(5.3, 51.7), 12000.0));
    let session = Session::new(
        test_config(temp_dir.path()),
        None,
        geocoder.clone(),
        router,
    );

    session
        .run(&request(), &CancelFlag::new(), &mut |_| {})
        .expect("first batch succeeded");

    let mut unchanged = session.config().expect("config available");
    unchanged.rate_per_km = 0.25;
    session.save_config(unchanged).expect("config saved");
    session
        .run(&request(), &CancelFlag::new(), &mut |_| {})
        .expect("second batch succeeded");
    assert_eq!(geocoder.calls_for(ORIGIN), 1);

    let mut moved = session.config().expect("config available");
    moved.origin_address = MOVED_ORIGIN.to_string();
    session.save_config(moved).expect("config saved");
    session
        .run(&request(), &CancelFlag::new(), &mut |_| {})
        .expect("third batch succeeded");

    assert_eq!(geocoder.calls_for(ORIGIN), 1);
    assert_eq!(geocoder.calls_for(MOVED_ORIGIN), 1);
}

#[test]
fn origin_cache_misses_for_a_different_address() {
    let geocoder = geocoder();
    let mut cache = OriginCache::new();

    assert_eq!(cache.resolve(ORIGIN, &geocoder), Some(ORIGIN_POINT));
    assert_eq!(cache.resolve(ORIGIN, &geocoder), Some(ORIGIN_POINT));
    assert_eq!(cache.resolve(MOVED_ORIGIN, &geocoder), Some(ORIGIN_POINT));
    assert_eq!(cache.resolve("Nergens 0", &geocoder), None);
    assert_eq!(cache.cached(), Some(ORIGIN_POINT));

    cache.invalidate();
    assert_eq!(cache.cached(), None);
    assert_eq!(
        geocoder.calls(),
        vec![ORIGIN, MOVED_ORIGIN, "Nergens 0"]
    );
}

#[test]
fn saved_settings_are_persisted_immediately() {
    let temp_dir = tempdir().expect("temporary directory");
    let config_path = temp_dir.path().join("config.json");
    let session = Session::new(
        test_config(temp_dir.path()),
        Some(config_path.clone()),
        Arc::new(geocoder()),
        Arc::new(FakeRouter::new()),
    );

    let mut config = session.config().expect("config available");
    config.warning_threshold_km = 75.0;
    session.save_config(config.clone()).expect("config saved");

    assert_eq!(Config::load(&config_path).expect("config on disk"), config);
}

#[test]
fn worker_batch_reports_progress_and_outcome() {
    let temp_dir = tempdir().expect("temporary directory");
    let session = Session::new(
        test_config(temp_dir.path()),
        None,
        Arc::new(geocoder()),
        Arc::new(FakeRouter::new().with(point(5.3, 51.7), 12000.0)),
    );

    let handle = session
        .submit(BatchRequest::new(
            "18-04-2025",
            vec![
                DeliveryEntry::new(Some("5324 JW"), None),
                DeliveryEntry::new(Some("bad"), None),
            ],
        ))
        .expect("batch submitted");
    let events: Vec<Progress> = handle.events().iter().collect();
    let outcome = handle.wait().expect("batch succeeded");

    assert_eq!(outcome.appended(), 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert!(matches!(events.first(), Some(Progress::Started { entries: 2, .. })));
    assert!(events.contains(&Progress::LookingUpOrigin));
    assert!(events.contains(&Progress::Entry { index: 2, total: 2 }));
    assert!(events.iter().any(|event| matches!(event, Progress::Warning(w) if w.index == 2)));
    assert_eq!(events.last(), Some(&Progress::Finished { appended: 1 }));
    assert!(!session.is_busy());
}

#[test]
fn second_batch_is_rejected_while_one_is_in_flight() {
    let temp_dir = tempdir().expect("temporary directory");
    let (release, gate) = mpsc::channel();
    let session = Session::new(
        test_config(temp_dir.path()),
        None,
        Arc::new(GatedGeocoder {
            inner: geocoder(),
            gate: Mutex::new(gate),
        }),
        Arc::new(FakeRouter::new().with(point(5.3, 51.7), 12000.0)),
    );

    let handle = session.submit(request()).expect("first batch submitted");
    assert!(session.is_busy());
    assert!(matches!(
        session.submit(request()),
        Err(ToolError::BatchInFlight)
    ));
    assert!(matches!(
        session.run(&request(), &CancelFlag::new(), &mut |_| {}),
        Err(ToolError::BatchInFlight)
    ));

    release.send(()).expect("worker released");
    let outcome = handle.wait().expect("first batch succeeded");
    assert_eq!(outcome.appended(), 1);
    assert!(!session.is_busy());

    release.send(()).expect("gate still open");
    session
        .run(&request(), &CancelFlag::new(), &mut |_| {})
        .expect("session accepts batches again");
}

#[test]
fn cancelling_a_worker_batch_before_it_starts_processing() {
    let temp_dir = tempdir().expect("temporary directory");
    let (release, gate) = mpsc::channel();
    let session = Session::new(
        test_config(temp_dir.path()),
        None,
        Arc::new(GatedGeocoder {
            inner: geocoder(),
            gate: Mutex::new(gate),
        }),
        Arc::new(FakeRouter::new().with(point(5.3, 51.7), 12000.0)),
    );

    let handle = session
        .submit(BatchRequest::new(
            "18-04-2025",
            vec![DeliveryEntry::new(Some("5324 JW"), None); 3],
        ))
        .expect("batch submitted");
    handle.cancel();
    release.send(()).expect("worker released");
    let outcome = handle.wait().expect("batch succeeded");

    assert!(outcome.cancelled);
    assert!(outcome.appended() <= 1);
}

#[test]
fn settings_stay_available_while_a_worker_batch_runs() {
    let temp_dir = tempdir().expect("temporary directory");
    let (release, gate) = mpsc::channel();
    let geocoder = Arc::new(GatedGeocoder {
        inner: geocoder(),
        gate: Mutex::new(gate),
    });
    let session = Session::new(
        test_config(temp_dir.path()),
        None,
        geocoder.clone(),
        Arc::new(FakeRouter::new().with(point(5.3, 51.7), 12000.0)),
    );

    let handle = session.submit(request()).expect("batch submitted");
    while geocoder.inner.calls_for(ORIGIN) == 0 {
        thread::sleep(Duration::from_millis(5));
    }

    let (done, finished) = mpsc::channel();
    let settings_session = session.clone();
    thread::spawn(move || {
        let result = settings_session.config().and_then(|mut config| {
            config.origin_address = MOVED_ORIGIN.to_string();
            settings_session.save_config(config)
        });
        let _ = done.send(result);
    });
    finished
        .recv_timeout(Duration::from_secs(5))
        .expect("settings call returned while the batch was blocked")
        .expect("settings saved");
    assert!(session.is_busy());

    release.send(()).expect("worker released");
    let outcome = handle.wait().expect("batch succeeded");
    assert_eq!(outcome.appended(), 1);
    assert_eq!(
        session.config().expect("config available").origin_address,
        MOVED_ORIGIN
    );

    release.send(()).expect("gate still open");
    session
        .run(&request(), &CancelFlag::new(), &mut |_| {})
        .expect("batch with the new origin succeeded");
    assert_eq!(geocoder.inner.calls_for(ORIGIN), 1);
    assert_eq!(geocoder.inner.calls_for(MOVED_ORIGIN), 1);
}
