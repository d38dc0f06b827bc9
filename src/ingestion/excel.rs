#![cfg(feature = "excel")]

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{LoadError, LoadResult};
use crate::types::{RawRecord, Value};

use super::loader::ExcelSheetSelection;

/// Read a spreadsheet (`.xlsx`, `.xls`, `.ods`, etc.) into raw records tagged with `source_file`.
///
/// Behavior:
/// - Reads the sheets named by `selection` (the first sheet by default), concatenated in order
/// - Detects the first non-empty row of each sheet as its header row
/// - Columns with a blank header are ignored; fully empty rows are dropped
pub fn read_excel_from_path(
    path: impl AsRef<Path>,
    selection: &ExcelSheetSelection,
    source_file: &str,
) -> LoadResult<Vec<RawRecord>> {
    let mut workbook = open_workbook_auto(path)?;

    let all_sheets = workbook.sheet_names().to_vec();
    let sheets: Vec<String> = match selection {
        ExcelSheetSelection::First => all_sheets.into_iter().take(1).collect(),
        ExcelSheetSelection::Sheet(name) => vec![name.clone()],
        ExcelSheetSelection::AllSheets => all_sheets,
        ExcelSheetSelection::Sheets(names) => names.clone(),
    };
    if sheets.is_empty() {
        return Err(LoadError::Malformed {
            message: "workbook has no sheets".to_string(),
        });
    }

    let mut records = Vec::new();
    for sheet in sheets {
        let range = workbook.worksheet_range(&sheet)?;
        let mut sheet_records = read_sheet_range(&range, source_file);
        records.append(&mut sheet_records);
    }

    Ok(records)
}

fn read_sheet_range(range: &calamine::Range<Data>, source_file: &str) -> Vec<RawRecord> {
    let mut rows = range.rows().skip_while(|row| row.iter().all(|c| matches!(c, Data::Empty)));
    let Some(header_row) = rows.next() else {
        return Vec::new();
    };
    let headers: Vec<String> = header_row.iter().map(cell_to_header_string).collect();

    let mut records = Vec::new();
    for row in rows {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let mut record = RawRecord::new(source_file);
        for (idx, name) in headers.iter().enumerate() {
            if name.trim().is_empty() {
                continue;
            }
            let cell = row.get(idx).unwrap_or(&Data::Empty);
            record.insert(name.as_str(), convert_cell(cell));
        }
        records.push(record);
    }
    records
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn convert_cell(c: &Data) -> Value {
    match c {
        Data::Empty => Value::Null,
        Data::String(s) => Value::from_text(s),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => Value::Float64(*f),
        Data::Bool(b) => Value::Bool(*b),
        Data::Error(_) => Value::Null,
        other => Value::from_text(&other.to_string()),
    }
}
