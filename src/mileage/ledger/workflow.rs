//! The delivery-row append workflow.
//!
//! A batch is an ordered list of [`DeliveryEntry`]s submitted together with
//! one date. Every entry is validated, geocoded and routed in turn; entries
//! that cannot be resolved are skipped with an [`EntryWarning`] and the rest
//! of the batch carries on. All rows produced by a batch are persisted with a
//! single save of the ledger workbook.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::mileage::ledger::config::Config;
use crate::mileage::ledger::error::{Result, ToolError};
use crate::mileage::ledger::geo::{Geocoder, Router, round_trip};
use crate::mileage::ledger::io::{excel_read, excel_write};
use crate::mileage::ledger::model::{
    Coordinates, DATE_FORMAT, DeliveryEntry, DeliveryRecord, REVIEW_ANNOTATION,
};
use crate::mileage::ledger::postcode;
use crate::mileage::ledger::session::OriginCache;

/// Deliveries submitted together for one date.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRequest {
    /// Date as typed by the user, `dd-mm-yyyy`.
    pub date: String,
    pub entries: Vec<DeliveryEntry>,
}

impl BatchRequest {
    pub fn new(date: impl Into<String>, entries: Vec<DeliveryEntry>) -> Self {
        Self {
            date: date.into(),
            entries,
        }
    }
}

/// Why an entry was skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum WarningKind {
    /// The postcode is malformed and there is no address to fall back on.
    InvalidPostcode { postcode: String },
    /// The geocoder found nothing for the query.
    NotFound { query: String },
    /// No driving distance could be obtained.
    RouteUnavailable { query: String },
}

/// A user-facing warning about one entry of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryWarning {
    /// 1-based position of the entry in the batch.
    pub index: usize,
    pub kind: WarningKind,
}

impl fmt::Display for EntryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            WarningKind::InvalidPostcode { postcode } => write!(
                f,
                "delivery {}: postcode '{postcode}' is not valid and no address was given",
                self.index
            ),
            WarningKind::NotFound { query } => {
                write!(f, "delivery {}: no location found for '{query}'", self.index)
            }
            WarningKind::RouteUnavailable { query } => write!(
                f,
                "delivery {}: no driving distance available to '{query}'",
                self.index
            ),
        }
    }
}

/// Phases reported while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    Started { batch_id: Uuid, entries: usize },
    LookingUpOrigin,
    Entry { index: usize, total: usize },
    Warning(EntryWarning),
    Appended {
        index: usize,
        row: u32,
        distance_km: f64,
        flagged: bool,
    },
    Saving { rows: usize },
    Finished { appended: usize },
    Cancelled { processed: usize },
}

/// Result of a completed batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub batch_id: Uuid,
    pub date: NaiveDate,
    pub records: Vec<DeliveryRecord>,
    pub warnings: Vec<EntryWarning>,
    /// True when the batch stopped early; completed rows are still saved.
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn appended(&self) -> usize {
        self.records.len()
    }
}

/// Cooperative cancellation checked between entries.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Parses the batch date; `dd-mm-yyyy` with `-` or `/` separators.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .map_err(|_| ToolError::InvalidDate(trimmed.to_string()))
}

enum EntryOutcome {
    Blank,
    Skipped(WarningKind),
    Resolved(DeliveryRecord),
}

/// Runs batches against a configuration and a pair of collaborators.
pub struct Workflow<'a> {
    config: &'a Config,
    geocoder: &'a dyn Geocoder,
    router: &'a dyn Router,
}

impl<'a> Workflow<'a> {
    pub fn new(config: &'a Config, geocoder: &'a dyn Geocoder, router: &'a dyn Router) -> Self {
        Self {
            config,
            geocoder,
            router,
        }
    }

    /// Processes every entry of `request` in order and appends one ledger row
    /// per resolved entry.
    ///
    /// The date, the ledger workbook and the origin are checked before any
    /// entry is looked at; a failure there aborts the whole batch.
    #[instrument(
        level = "info",
        skip_all,
        fields(batch_id = %batch_id, entries = request.entries.len())
    )]
    pub fn run(
        &self,
        batch_id: Uuid,
        request: &BatchRequest,
        origin: &mut OriginCache,
        cancel: &CancelFlag,
        progress: &mut dyn FnMut(Progress),
    ) -> Result<BatchOutcome> {
        let total = request.entries.len();
        progress(Progress::Started {
            batch_id,
            entries: total,
        });

        let date = parse_date(&request.date)?;
        let mut ledger = excel_read::read_or_create(&self.config.excel_path)?;
        if ledger.ensure_header() {
            debug!("ledger header written");
        }

        progress(Progress::LookingUpOrigin);
        let origin_address = self.config.origin_address.trim();
        let origin_point = origin
            .resolve(origin_address, self.geocoder)
            .ok_or_else(|| ToolError::OriginNotFound(origin_address.to_string()))?;

        let mut records = Vec::new();
        let mut warnings = Vec::new();
        let mut cancelled = false;

        for (offset, entry) in request.entries.iter().enumerate() {
            let index = offset + 1;
            if cancel.is_cancelled() {
                info!(processed = offset, "batch cancelled");
                progress(Progress::Cancelled { processed: offset });
                cancelled = true;
                break;
            }
            progress(Progress::Entry { index, total });

            match self.process_entry(index, entry, origin_point, date) {
                EntryOutcome::Blank => {}
                EntryOutcome::Skipped(kind) => {
                    let warning = EntryWarning { index, kind };
                    warn!(%warning, "delivery skipped");
                    progress(Progress::Warning(warning.clone()));
                    warnings.push(warning);
                }
                EntryOutcome::Resolved(record) => {
                    let row = ledger.append(&record);
                    progress(Progress::Appended {
                        index,
                        row,
                        distance_km: record.distance_km,
                        flagged: record.annotation.is_some(),
                    });
                    records.push(record);
                }
            }
        }

        progress(Progress::Saving {
            rows: records.len(),
        });
        if let Err(error) = excel_write::write_ledger(&self.config.excel_path, &ledger) {
            return Err(ToolError::Unsaved {
                pending: records,
                source: Box::new(error),
            });
        }

        info!(appended = records.len(), skipped = warnings.len(), "batch saved");
        progress(Progress::Finished {
            appended: records.len(),
        });

        Ok(BatchOutcome {
            batch_id,
            date,
            records,
            warnings,
            cancelled,
        })
    }

    fn process_entry(
        &self,
        index: usize,
        entry: &DeliveryEntry,
        origin: Coordinates,
        date: NaiveDate,
    ) -> EntryOutcome {
        if entry.is_blank() {
            return EntryOutcome::Blank;
        }

        let typed_postcode = entry.postcode();
        let address = entry.address();
        let normalized = typed_postcode.and_then(postcode::normalize);
        if let (Some(raw), None) = (typed_postcode, &normalized) {
            if address.is_none() {
                return EntryOutcome::Skipped(WarningKind::InvalidPostcode {
                    postcode: raw.to_string(),
                });
            }
            debug!(index, postcode = %raw, "invalid postcode, using the address instead");
        }

        let key = match (&normalized, address) {
            (Some(code), _) => code.as_str(),
            (None, Some(address)) => address,
            (None, None) => return EntryOutcome::Blank,
        };
        let query = format!("{key}, {}", self.config.country_name);

        let destination = self.geocoder.locate(&query);
        thread::sleep(self.config.geocode_pause());
        let Some(destination) = destination else {
            return EntryOutcome::Skipped(WarningKind::NotFound { query });
        };

        let Some(distance_km) = round_trip(self.router, origin, destination) else {
            return EntryOutcome::Skipped(WarningKind::RouteUnavailable { query });
        };

        let annotation = (distance_km > self.config.warning_threshold_km)
            .then(|| REVIEW_ANNOTATION.to_string());
        debug!(index, distance_km, flagged = annotation.is_some(), "delivery resolved");

        EntryOutcome::Resolved(DeliveryRecord {
            date,
            origin_postcode: self.config.origin_postcode.clone(),
            postcode: normalized,
            address: address.map(str::to_string),
            distance_km,
            rate_per_km: self.config.rate_per_km,
            annotation,
        })
    }
}
