//! Multi-sheet spreadsheet export
//!
//! The workbook is a projection of the store: one worksheet per region, a
//! bold header row, then one row per record.

use rust_xlsxwriter::{Format, Workbook};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::utils::error::ExportError;
use crate::utils::{sanitize_sheet_name, MAX_SHEET_NAME_LEN};

/// One spreadsheet cell
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Cell {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

/// A named worksheet with its header and data rows
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, header: &[&str]) -> Self {
        Self {
            name: name.into(),
            header: header.iter().map(|h| (*h).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }
}

/// Writes sheets to an `.xlsx` file
pub struct WorkbookWriter {
    path: PathBuf,
}

impl WorkbookWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write all non-empty sheets, replacing any existing file
    ///
    /// Returns the number of worksheets written. Nothing is written when every
    /// sheet is empty.
    pub fn write(&self, sheets: &[Sheet]) -> Result<usize, ExportError> {
        let sheets: Vec<&Sheet> = sheets.iter().filter(|s| !s.rows.is_empty()).collect();
        if sheets.is_empty() {
            tracing::warn!(path = %self.path.display(), "No rows to export");
            return Ok(0);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let header_format = Format::new().set_bold();
        let mut workbook = Workbook::new();
        let mut used_names = HashSet::new();

        for sheet in &sheets {
            let name = unique_sheet_name(&sheet.name, &mut used_names);
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&name)?;

            for (col, title) in sheet.header.iter().enumerate() {
                worksheet.write_string_with_format(0, column(col), title, &header_format)?;
            }

            for (i, row) in sheet.rows.iter().enumerate() {
                let row_idx = u32::try_from(i + 1).unwrap_or(u32::MAX);
                for (col, cell) in row.iter().enumerate() {
                    match cell {
                        Cell::Text(text) => {
                            worksheet.write_string(row_idx, column(col), text)?;
                        }
                        Cell::Int(n) => {
                            worksheet.write_number(row_idx, column(col), *n as f64)?;
                        }
                    }
                }
            }

            worksheet.autofit();
            tracing::debug!(sheet = %name, rows = sheet.rows.len(), "Worksheet written");
        }

        workbook.save(&self.path)?;

        tracing::info!(
            path = %self.path.display(),
            sheets = sheets.len(),
            "Workbook exported"
        );
        Ok(sheets.len())
    }
}

fn column(index: usize) -> u16 {
    u16::try_from(index).unwrap_or(u16::MAX)
}

/// Sanitized sheet name not yet in `used`, compared case-insensitively
fn unique_sheet_name(raw: &str, used: &mut HashSet<String>) -> String {
    let base = sanitize_sheet_name(raw);
    let mut candidate = base.clone();
    let mut n = 2;

    while used.contains(&candidate.to_lowercase()) {
        let suffix = format!(" ({n})");
        let room = MAX_SHEET_NAME_LEN.saturating_sub(suffix.chars().count());
        let stem: String = base.chars().take(room).collect();
        candidate = format!("{stem}{suffix}");
        n += 1;
    }

    used.insert(candidate.to_lowercase());
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_sheet_names() {
        let mut used = HashSet::new();
        assert_eq!(unique_sheet_name("英格兰", &mut used), "英格兰");
        assert_eq!(unique_sheet_name("英格兰", &mut used), "英格兰 (2)");
        assert_eq!(unique_sheet_name("英格兰", &mut used), "英格兰 (3)");
        assert_eq!(unique_sheet_name("a/b", &mut used), "a_b");
    }

    #[test]
    fn test_long_duplicate_names_stay_within_limit() {
        let mut used = HashSet::new();
        let long = "x".repeat(40);
        let first = unique_sheet_name(&long, &mut used);
        let second = unique_sheet_name(&long, &mut used);
        assert_eq!(first.chars().count(), MAX_SHEET_NAME_LEN);
        assert_eq!(second.chars().count(), MAX_SHEET_NAME_LEN);
        assert!(second.ends_with(" (2)"));
    }

    #[test]
    fn test_cell_conversions() {
        assert_eq!(Cell::from("a"), Cell::Text("a".into()));
        assert_eq!(Cell::from(3_u32), Cell::Int(3));
        assert_eq!(Cell::from(-1_i32), Cell::Int(-1));
    }
}
