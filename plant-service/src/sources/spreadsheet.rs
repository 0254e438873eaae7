use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{Map, Number, Value};

/// One sheet row keyed by the sheet's column labels.
///
/// Empty and error cells are left out, so a missing key and a blank cell look
/// the same to consumers.
pub type RawRow = Map<String, Value>;

#[derive(thiserror::Error, Debug)]
pub enum SpreadsheetError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("{sheet} sheet not found in the Excel file {}", .path.display())]
    SheetNotFound { sheet: String, path: PathBuf },
    #[error("failed to read workbook: {0}")]
    Workbook(String),
}

/// Read `sheet` from the workbook at `path`.
///
/// The first sheet row provides the labels. The row right after it is the
/// eGRID column-code row and is dropped, as are fully empty rows.
///
/// This is blocking file IO; async callers should run it on
/// `tokio::task::spawn_blocking`.
pub fn read_rows(path: &Path, sheet: &str) -> Result<Vec<RawRow>, SpreadsheetError> {
    if !path.exists() {
        return Err(SpreadsheetError::NotFound(path.to_path_buf()));
    }

    tracing::info!(path = %path.display(), sheet, "reading workbook");

    let mut workbook =
        open_workbook_auto(path).map_err(|e| SpreadsheetError::Workbook(e.to_string()))?;

    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(SpreadsheetError::SheetNotFound {
            sheet: sheet.to_string(),
            path: path.to_path_buf(),
        });
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| SpreadsheetError::Workbook(format!("failed to read sheet '{sheet}': {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<Option<String>> = match rows.next() {
        Some(header_row) => header_row.iter().map(header_label).collect(),
        None => return Ok(Vec::new()),
    };

    let data: Vec<RawRow> = rows
        .map(|row| row_to_map(&headers, row))
        .filter(|row| !row.is_empty())
        .skip(1)
        .collect();

    tracing::info!(rows = data.len(), sheet, "found plant rows in workbook");
    Ok(data)
}

fn header_label(cell: &Data) -> Option<String> {
    let label = cell.to_string();
    let label = label.trim();
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}

fn row_to_map(headers: &[Option<String>], row: &[Data]) -> RawRow {
    let mut map = Map::new();
    for (label, cell) in headers.iter().zip(row) {
        let Some(label) = label else { continue };
        if map.contains_key(label) {
            continue;
        }
        if let Some(value) = cell_to_value(cell) {
            map.insert(label.clone(), value);
        }
    }
    map
}

fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Float(f) => Number::from_f64(*f).map(Value::Number),
        Data::Int(i) => Some(Value::Number((*i).into())),
        Data::Bool(b) => Some(Value::Bool(*b)),
        other => Some(Value::String(other.to_string())),
    }
}
