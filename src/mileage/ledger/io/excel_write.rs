use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, Worksheet};
use tracing::{debug, instrument};

use crate::mileage::ledger::error::Result;
use crate::mileage::ledger::model::{CellValue, Ledger};

const COLUMN_WIDTHS: [f64; 8] = [12.0, 18.0, 16.0, 40.0, 22.0, 18.0, 22.0, 26.0];

/// Writes the whole ledger workbook to the given path, replacing any
/// previous file. The ledger sheet comes first, followed by the other sheets
/// in their original order. Cell values and formulas are written back; cell
/// formatting other than the header and date styles is not.
#[instrument(level = "debug", skip_all, fields(path = %path.display(), rows = ledger.rows.len()))]
pub fn write_ledger(path: &Path, ledger: &Ledger) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut workbook_writer = Workbook::new();
    let header_format = Format::new().set_bold();
    let date_format = Format::new().set_num_format("dd-mm-yyyy");

    let worksheet = workbook_writer.add_worksheet();
    worksheet.set_name(&ledger.sheet_name)?;
    for (col_idx, width) in COLUMN_WIDTHS.iter().enumerate() {
        worksheet.set_column_width(col_idx as u16, *width)?;
    }
    write_rows(worksheet, &ledger.rows, Some(&header_format), &date_format)?;

    for sheet in &ledger.others {
        let worksheet = workbook_writer.add_worksheet();
        worksheet.set_name(&sheet.name)?;
        write_rows(worksheet, &sheet.rows, None, &date_format)?;
    }

    workbook_writer.save(path)?;
    debug!(sheets = ledger.others.len() + 1, "ledger workbook saved");
    Ok(())
}

fn write_rows(
    worksheet: &mut Worksheet,
    rows: &[Vec<CellValue>],
    header_format: Option<&Format>,
    date_format: &Format,
) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        let row_idx = row_idx as u32;
        for (col_idx, cell) in row.iter().enumerate() {
            let col_idx = col_idx as u16;
            match (cell, header_format) {
                (CellValue::Empty, _) => {}
                (CellValue::Text(value), Some(format)) if row_idx == 0 => {
                    worksheet.write_string_with_format(row_idx, col_idx, value, format)?;
                }
                (CellValue::Text(value), _) => {
                    worksheet.write_string(row_idx, col_idx, value)?;
                }
                (CellValue::Number(value), _) => {
                    worksheet.write_number(row_idx, col_idx, *value)?;
                }
                (CellValue::Bool(value), _) => {
                    worksheet.write_boolean(row_idx, col_idx, *value)?;
                }
                (CellValue::Date(serial), _) => {
                    worksheet.write_number_with_format(row_idx, col_idx, *serial, date_format)?;
                }
                (CellValue::Formula(text), _) => {
                    worksheet.write_formula(row_idx, col_idx, format!("={text}").as_str())?;
                }
            }
        }
    }
    Ok(())
}
