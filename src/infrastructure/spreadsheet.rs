//! Spreadsheet input and incremental XLSX output
//!
//! Input sheets are read fully into memory (`.csv` through `csv`, workbook
//! formats through `calamine`). Output is rewritten in full after every
//! appended row so an interrupted batch still leaves a usable file.

#![allow(clippy::uninlined_format_args)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::schema::{DESCRIPTION_COLUMN, OutputSchema};

/// Longest text an XLSX cell accepts
pub const MAX_CELL_CHARS: usize = 32_767;

/// Width used for columns without a configured width
const DEFAULT_COLUMN_WIDTH: f64 = 18.0;

/// Fixed widths for well-known columns
const COLUMN_WIDTHS: [(&str, f64); 5] = [
    ("mfr model", 15.0),
    ("title", 40.0),
    ("description", 60.0),
    ("manufacturer", 20.0),
    ("weight", 15.0),
];

#[derive(Error, Debug)]
pub enum SpreadsheetError {
    #[error("Unsupported input format '{extension}' for {path}")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("File contains no data rows: {path}")]
    Empty { path: PathBuf },

    #[error("Required column '{column}' not found (available: {available})")]
    MissingColumn { column: String, available: String },

    #[error("Failed to write {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SpreadsheetError {
    fn read(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    fn write(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Rows of an input sheet keyed by header position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl InputSheet {
    /// Header index matching `name` case-insensitively, ignoring padding
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.headers
            .iter()
            .position(|h| h.trim().to_lowercase() == wanted)
    }

    /// Like [`column_index`](Self::column_index) but fails with the headers
    /// that were available
    pub fn identifier_column(&self, name: &str) -> Result<usize, SpreadsheetError> {
        self.column_index(name)
            .ok_or_else(|| SpreadsheetError::MissingColumn {
                column: name.to_string(),
                available: self.headers.join(", "),
            })
    }

    /// Cell text, empty for short rows
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map_or("", String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read the first sheet of `path`. Fully blank rows are dropped; a sheet
/// without data rows is an error.
pub fn load_input(path: &Path) -> Result<InputSheet, SpreadsheetError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let (headers, rows) = match extension.as_str() {
        "csv" => read_csv(path)?,
        "xlsx" | "xlsm" | "xls" | "ods" => read_workbook(path)?,
        _ => {
            return Err(SpreadsheetError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            });
        }
    };

    let rows: Vec<Vec<String>> = rows
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.trim().is_empty()))
        .collect();

    if rows.is_empty() {
        return Err(SpreadsheetError::Empty {
            path: path.to_path_buf(),
        });
    }

    info!("Loaded {} rows from {}", rows.len(), path.display());
    Ok(InputSheet { headers, rows })
}

fn read_csv(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), SpreadsheetError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| SpreadsheetError::read(path, e))?;

    let headers = reader
        .headers()
        .map_err(|e| SpreadsheetError::read(path, e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| SpreadsheetError::read(path, e))?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok((headers, rows))
}

fn read_workbook(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), SpreadsheetError> {
    let mut workbook = open_workbook_auto(path).map_err(|e| SpreadsheetError::read(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SpreadsheetError::read(path, "workbook has no sheets"))?
        .map_err(|e| SpreadsheetError::read(path, e))?;

    let mut rows = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let headers = rows
        .next()
        .map(|h| h.into_iter().map(|c| c.trim().to_string()).collect())
        .unwrap_or_default();
    Ok((headers, rows.collect()))
}

/// Identifiers typed into a sheet often come back as numbers; whole
/// floats are rendered without a fraction.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        #[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}

/// One output row keyed by schema column
pub type OutputRow = HashMap<String, String>;

/// Accumulated output of one batch run
#[derive(Debug, Clone)]
pub struct OutputTable {
    schema: OutputSchema,
    rows: Vec<OutputRow>,
}

impl OutputTable {
    pub fn new(schema: OutputSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &OutputSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[OutputRow] {
        &self.rows
    }

    pub fn push(&mut self, row: OutputRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Destination for the accumulated output table
pub trait TableWriter: Send + Sync {
    /// Write the whole table to `path`, replacing any previous content
    fn persist(&self, table: &OutputTable, path: &Path) -> Result<(), SpreadsheetError>;
}

/// Writes output tables as formatted XLSX workbooks
#[derive(Debug, Clone)]
pub struct XlsxTableWriter {
    row_height: f64,
}

impl XlsxTableWriter {
    pub fn new(row_height: f64) -> Self {
        Self { row_height }
    }

    fn build_workbook(&self, table: &OutputTable) -> Result<Workbook, XlsxError> {
        let mut workbook = Workbook::new();
        let header_format = Format::new().set_bold();
        let wrap_format = Format::new().set_text_wrap().set_align(FormatAlign::Top);

        let columns = table.schema().columns();
        let description_col = table.schema().position(DESCRIPTION_COLUMN);

        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Products")?;

        for (col, name) in columns.iter().enumerate() {
            let col = column_index(col)?;
            worksheet.write_string_with_format(0, col, name, &header_format)?;
            worksheet.set_column_width(col, column_width(name))?;
        }
        worksheet.set_row_height(0, self.row_height)?;

        for (idx, row) in table.rows().iter().enumerate() {
            let excel_row = u32::try_from(idx + 1).map_err(|_| XlsxError::RowColumnLimitError)?;
            for (col, name) in columns.iter().enumerate() {
                let value = row.get(name).map_or("", String::as_str);
                let value = truncate_cell(value);
                let xl_col = column_index(col)?;
                if Some(col) == description_col {
                    worksheet.write_string_with_format(excel_row, xl_col, value, &wrap_format)?;
                } else {
                    worksheet.write_string(excel_row, xl_col, value)?;
                }
            }
            worksheet.set_row_height(excel_row, self.row_height)?;
        }

        Ok(workbook)
    }
}

impl Default for XlsxTableWriter {
    fn default() -> Self {
        Self::new(15.0)
    }
}

impl TableWriter for XlsxTableWriter {
    fn persist(&self, table: &OutputTable, path: &Path) -> Result<(), SpreadsheetError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| SpreadsheetError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut workbook = self
            .build_workbook(table)
            .map_err(|e| SpreadsheetError::write(path, e))?;

        let temp_path = temp_path_for(path);
        workbook
            .save(&temp_path)
            .map_err(|e| SpreadsheetError::write(&temp_path, e))?;
        std::fs::rename(&temp_path, path).map_err(|source| SpreadsheetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Persisted {} rows to {}", table.len(), path.display());
        Ok(())
    }
}

fn column_index(col: usize) -> Result<u16, XlsxError> {
    u16::try_from(col).map_err(|_| XlsxError::RowColumnLimitError)
}

fn column_width(name: &str) -> f64 {
    let lower = name.to_lowercase();
    COLUMN_WIDTHS
        .iter()
        .find(|(known, _)| *known == lower)
        .map_or(DEFAULT_COLUMN_WIDTH, |(_, width)| *width)
}

fn truncate_cell(value: &str) -> &str {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((byte_idx, _)) => &value[..byte_idx],
        None => value,
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// `{output_dir}/{file_prefix}{prefix}_{input stem}.xlsx`
pub fn output_path_for(output_dir: &Path, file_prefix: &str, prefix: &str, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map_or_else(|| "output".to_string(), |s| s.to_string_lossy().into_owned());
    output_dir.join(format!("{}{}_{}.xlsx", file_prefix, prefix, stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::build_schema;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn csv_input_skips_blank_rows_and_finds_identifier() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "vendor-150.csv",
            " MFR MODEL ,Qty\n64900K,1\n,\n91-1002,2\n",
        );

        let sheet = load_input(&path).unwrap();
        assert_eq!(sheet.len(), 2);
        let col = sheet.identifier_column("Mfr Model").unwrap();
        assert_eq!(sheet.cell(0, col), "64900K");
        assert_eq!(sheet.cell(1, col), "91-1002");
        assert_eq!(sheet.cell(5, col), "");
    }

    #[test]
    fn missing_identifier_column_lists_headers() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "input.csv", "Model,Qty\nA1,1\n");
        let sheet = load_input(&path).unwrap();

        let err = sheet.identifier_column("Mfr Model").unwrap_err();
        assert!(err.to_string().contains("Model, Qty"));
    }

    #[test]
    fn empty_and_unsupported_inputs_are_errors() {
        let dir = TempDir::new().unwrap();
        let empty = write_file(&dir, "empty.csv", "Mfr Model\n");
        assert!(matches!(load_input(&empty), Err(SpreadsheetError::Empty { .. })));

        let text = write_file(&dir, "notes.txt", "Mfr Model\nA1\n");
        assert!(matches!(
            load_input(&text),
            Err(SpreadsheetError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn persisted_table_reads_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("final_150_vendor.xlsx");
        let schema = build_schema(["weight"], []);
        let mut table = OutputTable::new(schema);

        let mut row = OutputRow::new();
        row.insert("Mfr Model".to_string(), "64900K".to_string());
        row.insert("Weight".to_string(), "28 lbs".to_string());
        row.insert("Description".to_string(), "x".repeat(MAX_CELL_CHARS + 10));
        table.push(row);

        let writer = XlsxTableWriter::default();
        writer.persist(&table, &path).unwrap();
        assert!(!temp_path_for(&path).exists());

        let sheet = load_input(&path).unwrap();
        assert_eq!(sheet.headers[0], "Mfr Model");
        assert_eq!(sheet.headers.len(), table.schema().len());
        let weight = sheet.column_index("Weight").unwrap();
        let description = sheet.column_index("Description").unwrap();
        assert_eq!(sheet.cell(0, 0), "64900K");
        assert_eq!(sheet.cell(0, weight), "28 lbs");
        assert_eq!(sheet.cell(0, description).chars().count(), MAX_CELL_CHARS);
    }

    #[test]
    fn header_only_table_is_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("headers.xlsx");
        let table = OutputTable::new(build_schema([], []));
        XlsxTableWriter::default().persist(&table, &path).unwrap();

        // No data rows, so reading it back as input is rejected
        assert!(matches!(load_input(&path), Err(SpreadsheetError::Empty { .. })));
    }

    #[test]
    fn output_path_combines_prefixes_and_stem() {
        let path = output_path_for(
            Path::new("/data/completed"),
            "final_",
            "150",
            Path::new("/in/vendor-150.xlsx"),
        );
        assert_eq!(path, PathBuf::from("/data/completed/final_150_vendor-150.xlsx"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let long = "é".repeat(MAX_CELL_CHARS + 1);
        assert_eq!(truncate_cell(&long).chars().count(), MAX_CELL_CHARS);
        assert_eq!(truncate_cell("short"), "short");
        assert_eq!(column_width("TITLE"), 40.0);
        assert_eq!(column_width("Video Link 1"), DEFAULT_COLUMN_WIDTH);
    }
}
