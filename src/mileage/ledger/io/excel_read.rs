use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use tracing::{debug, instrument};

use crate::mileage::ledger::error::{Result, ToolError};
use crate::mileage::ledger::model::{CellValue, Ledger, Sheet};

/// Reads the ledger workbook, or returns a fresh header-only ledger when the
/// workbook does not exist yet.
pub fn read_or_create(path: &Path) -> Result<Ledger> {
    if path.exists() {
        read_ledger(path)
    } else {
        debug!(path = %path.display(), "ledger workbook absent, starting empty");
        Ok(Ledger::new())
    }
}

/// Reads an existing workbook, values and formulas alike. The first sheet is
/// the ledger; every other sheet is kept alongside it.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn read_ledger(path: &Path) -> Result<Ledger> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;

    let names = workbook.sheet_names().to_vec();
    let (first, rest) = names
        .split_first()
        .ok_or_else(|| ToolError::InvalidWorkbook("workbook has no sheets".into()))?;

    let mut rows = read_sheet(&mut workbook, first)?;
    if rows.is_empty() {
        rows.push(Vec::new());
    }

    let others = rest
        .iter()
        .map(|name| {
            Ok(Sheet {
                name: name.clone(),
                rows: read_sheet(&mut workbook, name)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(rows = rows.len(), sheet = %first, others = others.len(), "ledger sheet loaded");
    Ok(Ledger {
        sheet_name: first.clone(),
        rows,
        others,
    })
}

fn read_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Vec<Vec<CellValue>>> {
    let values = read_required_sheet(workbook, name)?;
    let formulas = workbook
        .worksheet_formula(name)
        .transpose()
        .map_err(ToolError::from)?;

    let mut rows: Vec<Vec<CellValue>> = Vec::new();

    if let Some((start_row, start_col)) = values.start() {
        for (row, col, cell) in values.used_cells() {
            let value = cell_to_value(cell);
            if value.is_empty() {
                continue;
            }
            place(&mut rows, start_row as usize + row, start_col as usize + col, value);
        }
    }

    if let Some(formulas) = formulas {
        if let Some((start_row, start_col)) = formulas.start() {
            for (row, col, formula) in formulas.used_cells() {
                let text = formula.trim().trim_start_matches('=');
                if text.is_empty() {
                    continue;
                }
                place(
                    &mut rows,
                    start_row as usize + row,
                    start_col as usize + col,
                    CellValue::Formula(text.to_string()),
                );
            }
        }
    }

    Ok(rows)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

fn place(rows: &mut Vec<Vec<CellValue>>, row: usize, col: usize, value: CellValue) {
    if rows.len() <= row {
        rows.resize_with(row + 1, Vec::new);
    }
    let cells = &mut rows[row];
    if cells.len() <= col {
        cells.resize(col + 1, CellValue::Empty);
    }
    cells[col] = value;
}

fn cell_to_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Bool(*value),
        DataType::DateTime(value) => CellValue::Date(*value),
        DataType::Empty => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}
