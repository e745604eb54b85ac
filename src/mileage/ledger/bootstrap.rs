use std::path::Path;

use tracing::{info, instrument};

use crate::mileage::ledger::error::Result;
use crate::mileage::ledger::io::{excel_read, excel_write};

/// What [`ensure_ledger`] found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerStatus {
    /// The workbook did not exist and was created.
    pub created: bool,
    /// Row 1 did not hold the expected header and was rewritten.
    pub header_written: bool,
    /// Rows below the header.
    pub data_rows: usize,
}

/// Creates the ledger workbook with its header if absent, and repairs the
/// header of an existing one. Existing rows are left as they are.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn ensure_ledger(path: &Path) -> Result<LedgerStatus> {
    let created = !path.exists();
    let mut ledger = excel_read::read_or_create(path)?;
    let header_written = ledger.ensure_header();

    if created || header_written {
        excel_write::write_ledger(path, &ledger)?;
    }

    let status = LedgerStatus {
        created,
        header_written: created || header_written,
        data_rows: ledger.data_row_count(),
    };
    info!(?status, "ledger checked");
    Ok(status)
}
