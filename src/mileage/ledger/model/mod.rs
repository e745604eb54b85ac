use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Column titles of the ledger sheet, in order.
pub const HEADER: [&str; 8] = [
    "Datum",
    "postcode cafetaria",
    "Postcode klant",
    "adres klant (indien postcode vergeten te vragen)",
    "aantal km heen en terug",
    "vergoeding per km",
    "totaalbedrag (formule)",
    "opmerking",
];

/// Name given to the sheet of a freshly created ledger.
pub const DEFAULT_SHEET_NAME: &str = "Ritten";

/// Annotation attached to rows whose distance exceeds the warning threshold.
pub const REVIEW_ANNOTATION: &str = "manual review suggested";

/// Date layout used in the ledger and on the command line.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// A geographic point as returned by the geocoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

impl Coordinates {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }
}

/// One delivery as typed in by the user. Both fields may be blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryEntry {
    pub postcode: Option<String>,
    pub address: Option<String>,
}

impl DeliveryEntry {
    /// Builds an entry, treating whitespace-only input as absent.
    pub fn new(postcode: Option<&str>, address: Option<&str>) -> Self {
        Self {
            postcode: non_blank(postcode),
            address: non_blank(address),
        }
    }

    /// The postcode as typed, trimmed; `None` when absent or whitespace.
    pub fn postcode(&self) -> Option<&str> {
        present(&self.postcode)
    }

    /// The address as typed, trimmed; `None` when absent or whitespace.
    pub fn address(&self) -> Option<&str> {
        present(&self.address)
    }

    /// Returns true when the slot was left unused.
    pub fn is_blank(&self) -> bool {
        self.postcode().is_none() && self.address().is_none()
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

/// A row of the ledger produced by the append workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRecord {
    pub date: NaiveDate,
    pub origin_postcode: String,
    pub postcode: Option<String>,
    pub address: Option<String>,
    pub distance_km: f64,
    pub rate_per_km: f64,
    pub annotation: Option<String>,
}

impl DeliveryRecord {
    /// Materialises the record as sheet cells for the given 1-based row.
    ///
    /// The total is always a formula over the row's own distance and rate
    /// cells so later edits recompute.
    pub fn to_cells(&self, row_number: u32) -> Vec<CellValue> {
        vec![
            CellValue::Text(self.date.format(DATE_FORMAT).to_string()),
            CellValue::Text(self.origin_postcode.clone()),
            optional_text(self.postcode.as_deref()),
            optional_text(self.address.as_deref()),
            CellValue::Number(self.distance_km),
            CellValue::Number(self.rate_per_km),
            CellValue::Formula(total_formula(row_number)),
            optional_text(self.annotation.as_deref()),
        ]
    }
}

/// Formula text (without the leading `=`) for the total of a sheet row.
pub fn total_formula(row_number: u32) -> String {
    format!("E{row_number}*F{row_number}")
}

/// A single cell of the ledger sheet.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Excel serial date, kept so manually entered dates survive a rewrite.
    Date(f64),
    /// Formula text without the leading `=`.
    Formula(String),
}

impl CellValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(value) => value.is_empty(),
            _ => false,
        }
    }
}

/// Another sheet of the ledger workbook, carried through a rewrite unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

/// In-memory image of the ledger workbook. `rows` is the ledger sheet, whose
/// row 0 is the header; `others` are the remaining sheets in workbook order.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    pub sheet_name: String,
    pub rows: Vec<Vec<CellValue>>,
    pub others: Vec<Sheet>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Creates an empty ledger holding only the header row.
    pub fn new() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            rows: vec![header_cells()],
            others: Vec::new(),
        }
    }

    /// Returns true when the first columns of row 1 hold the expected header.
    /// Cells to the right of the header are not inspected.
    pub fn has_header(&self) -> bool {
        match self.rows.first() {
            Some(first) => HEADER.iter().enumerate().all(|(idx, title)| {
                first.get(idx).and_then(CellValue::as_text) == Some(*title)
            }),
            None => false,
        }
    }

    /// Writes the header into the first columns of row 1. Cells to the right
    /// of the header are kept.
    ///
    /// Returns true when the sheet was changed.
    pub fn ensure_header(&mut self) -> bool {
        if self.has_header() {
            return false;
        }
        match self.rows.first_mut() {
            Some(first) => {
                let extra = first.split_off(first.len().min(HEADER.len()));
                *first = header_cells();
                first.extend(extra);
            }
            None => self.rows.push(header_cells()),
        }
        true
    }

    /// Number of rows below the header.
    pub fn data_row_count(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }

    /// 1-based sheet row number the next appended record will occupy.
    pub fn next_row_number(&self) -> u32 {
        self.rows.len().max(1) as u32 + 1
    }

    /// Appends a record below the last used row and returns its sheet row number.
    pub fn append(&mut self, record: &DeliveryRecord) -> u32 {
        if self.rows.is_empty() {
            self.rows.push(header_cells());
        }
        let row_number = self.next_row_number();
        self.rows.push(record.to_cells(row_number));
        row_number
    }
}

fn header_cells() -> Vec<CellValue> {
    HEADER
        .iter()
        .map(|title| CellValue::Text((*title).to_string()))
        .collect()
}

fn optional_text(value: Option<&str>) -> CellValue {
    match value {
        Some(text) => CellValue::Text(text.to_string()),
        None => CellValue::Empty,
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|trimmed| !trimmed.is_empty())
        .map(str::to_string)
}
