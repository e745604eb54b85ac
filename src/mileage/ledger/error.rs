use thiserror::Error;

use crate::mileage::ledger::model::DeliveryRecord;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the batch-level failures of the tool.
///
/// Per-entry problems (unknown address, no route, malformed postcode) are not
/// errors: they surface as [`EntryWarning`](crate::workflow::EntryWarning)s
/// and the batch carries on.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when the ledger workbook does not have a usable sheet.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// Raised when the batch date is not a `dd-mm-yyyy` date.
    #[error("invalid date '{0}', expected dd-mm-yyyy")]
    InvalidDate(String),

    /// Raised when a setting that must be a postal code is not one.
    #[error("invalid postcode '{0}', expected DDDD XX")]
    InvalidPostcode(String),

    /// Raised when the configured origin address cannot be geocoded.
    #[error("origin address '{0}' could not be located")]
    OriginNotFound(String),

    /// Raised when a batch is submitted while another one is still running.
    #[error("a batch is already being processed")]
    BatchInFlight,

    /// Raised when a worker panicked while holding the session state.
    #[error("session state is unavailable after a worker failure")]
    SessionPoisoned,

    /// Raised when rows were built but the workbook could not be saved.
    #[error("{} delivery row(s) were not saved: {source}", .pending.len())]
    Unsaved {
        pending: Vec<DeliveryRecord>,
        #[source]
        source: Box<ToolError>,
    },

    /// Raised when the HTTP client cannot be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Raised when a single-destination lookup finds no location.
    #[error("no location found for '{0}'")]
    LocationNotFound(String),

    /// Raised when a single-destination lookup gets no driving distance.
    #[error("no driving distance available to '{0}'")]
    RouteUnavailable(String),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
