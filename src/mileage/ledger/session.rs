//! Long-lived state shared by successive batches.
//!
//! A [`Session`] owns the settings, the cached origin coordinates and the
//! remote collaborators. Batches run either on the calling thread
//! ([`Session::run`]) or on a worker thread ([`Session::submit`]); in both
//! cases at most one batch is in flight at a time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tracing::{debug, info};
use uuid::Uuid;

use crate::mileage::ledger::config::Config;
use crate::mileage::ledger::error::{Result, ToolError};
use crate::mileage::ledger::geo::{self, Geocoder, NominatimGeocoder, OpenRouteServiceRouter, Router};
use crate::mileage::ledger::model::Coordinates;
use crate::mileage::ledger::workflow::{BatchOutcome, BatchRequest, CancelFlag, Progress, Workflow};

/// Coordinates of the origin, remembered together with the address they were
/// looked up for.
#[derive(Debug, Clone, Default)]
pub struct OriginCache {
    entry: Option<(String, Coordinates)>,
}

impl OriginCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached coordinates for `address`, geocoding it on a miss.
    ///
    /// A failed lookup leaves the cache untouched.
    pub fn resolve(&mut self, address: &str, geocoder: &dyn Geocoder) -> Option<Coordinates> {
        if let Some((cached_address, coordinates)) = &self.entry {
            if cached_address == address {
                debug!(address, "origin coordinates reused");
                return Some(*coordinates);
            }
        }
        let coordinates = geocoder.locate(address)?;
        self.entry = Some((address.to_string(), coordinates));
        Some(coordinates)
    }

    pub fn cached(&self) -> Option<Coordinates> {
        self.entry.as_ref().map(|(_, coordinates)| *coordinates)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

struct SessionState {
    config: Config,
    origin: OriginCache,
}

struct Inner {
    state: Mutex<SessionState>,
    config_path: Option<PathBuf>,
    geocoder: Arc<dyn Geocoder>,
    router: Arc<dyn Router>,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when a batch ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Inner {
    fn claim(&self) -> Result<()> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(|_| ToolError::BatchInFlight)
    }

    fn lock(&self) -> Result<MutexGuard<'_, SessionState>> {
        self.state.lock().map_err(|_| ToolError::SessionPoisoned)
    }

    /// Runs a batch against a snapshot of the settings. The state lock is
    /// held only while taking the snapshot and while handing the origin
    /// cache back.
    fn execute(
        &self,
        request: &BatchRequest,
        cancel: &CancelFlag,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<BatchOutcome> {
        let (config, mut origin) = {
            let mut state = self.lock()?;
            (state.config.clone(), std::mem::take(&mut state.origin))
        };

        let workflow = Workflow::new(&config, self.geocoder.as_ref(), self.router.as_ref());
        let outcome = workflow.run(Uuid::new_v4(), request, &mut origin, cancel, progress);

        let mut state = self.lock()?;
        if state.config.origin_address == config.origin_address {
            state.origin = origin;
        } else {
            debug!("origin changed during the batch, cached coordinates dropped");
        }
        outcome
    }
}

/// Handle to a batch running on a worker thread.
pub struct BatchHandle {
    events: Receiver<Progress>,
    cancel: CancelFlag,
    worker: JoinHandle<Result<BatchOutcome>>,
}

impl BatchHandle {
    /// Progress events in the order they were produced. The channel closes
    /// when the batch ends.
    pub fn events(&self) -> &Receiver<Progress> {
        &self.events
    }

    /// Asks the batch to stop before its next entry.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the batch to end and returns its outcome.
    pub fn wait(self) -> Result<BatchOutcome> {
        self.worker.join().map_err(|_| ToolError::SessionPoisoned)?
    }
}

/// Settings, origin cache and collaborators shared by successive batches.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    pub fn new(
        config: Config,
        config_path: Option<PathBuf>,
        geocoder: Arc<dyn Geocoder>,
        router: Arc<dyn Router>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState {
                    config,
                    origin: OriginCache::new(),
                }),
                config_path,
                geocoder,
                router,
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Loads the settings file and wires the HTTP collaborators.
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = Config::load_or_default(path);
        let client = geo::http_client(&config)?;
        let geocoder = Arc::new(NominatimGeocoder::new(client.clone(), &config));
        let router = Arc::new(OpenRouteServiceRouter::new(client, &config));
        Ok(Self::new(config, Some(path.to_path_buf()), geocoder, router))
    }

    pub fn config(&self) -> Result<Config> {
        Ok(self.inner.lock()?.config.clone())
    }

    /// Replaces the settings, persisting them when the session was loaded
    /// from a file. Changing the origin address drops the cached coordinates.
    pub fn save_config(&self, config: Config) -> Result<()> {
        let mut state = self.inner.lock()?;
        if let Some(path) = &self.inner.config_path {
            config.save(path)?;
        }
        if state.config.origin_address != config.origin_address {
            info!(origin = %config.origin_address, "origin changed, cached coordinates dropped");
            state.origin.invalidate();
        }
        state.config = config;
        Ok(())
    }

    /// Geocodes the configured origin through the session cache.
    pub fn origin(&self) -> Result<Coordinates> {
        let mut state = self.inner.lock()?;
        let address = state.config.origin_address.trim().to_string();
        state
            .origin
            .resolve(&address, self.inner.geocoder.as_ref())
            .ok_or(ToolError::OriginNotFound(address))
    }

    pub fn geocoder(&self) -> &dyn Geocoder {
        self.inner.geocoder.as_ref()
    }

    pub fn router(&self) -> &dyn Router {
        self.inner.router.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Runs a batch on the calling thread.
    pub fn run(
        &self,
        request: &BatchRequest,
        cancel: &CancelFlag,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<BatchOutcome> {
        self.inner.claim()?;
        let _guard = InFlightGuard(&self.inner.in_flight);
        self.inner.execute(request, cancel, progress)
    }

    /// Starts a batch on a worker thread.
    ///
    /// Fails with [`ToolError::BatchInFlight`] while another batch of this
    /// session is still running.
    pub fn submit(&self, request: BatchRequest) -> Result<BatchHandle> {
        self.inner.claim()?;

        let (sender, events) = mpsc::channel();
        let cancel = CancelFlag::new();
        let inner = Arc::clone(&self.inner);
        let worker_cancel = cancel.clone();

        let worker = thread::Builder::new()
            .name("mileage-batch".to_string())
            .spawn(move || {
                let _guard = InFlightGuard(&inner.in_flight);
                let mut forward = |event: Progress| {
                    let _ = sender.send(event);
                };
                inner.execute(&request, &worker_cancel, &mut forward)
            });

        match worker {
            Ok(worker) => Ok(BatchHandle {
                events,
                cancel,
                worker,
            }),
            Err(error) => {
                self.inner.in_flight.store(false, Ordering::SeqCst);
                Err(ToolError::Io(error))
            }
        }
    }
}
