use super::{Row, SheetStore};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Sheets held in process memory. Used by tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    sheets: HashMap<String, Vec<Row>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every sheet that has been written to.
    pub fn sheet_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sheets.keys().cloned().collect();
        names.sort();
        names
    }
}

impl SheetStore for MemoryStore {
    fn row_count(&self, sheet: &str) -> Result<usize> {
        Ok(self.sheets.get(sheet).map_or(0, Vec::len))
    }

    fn read_row(&self, sheet: &str, row_no: usize) -> Result<Option<Row>> {
        if row_no == 0 {
            return Ok(None);
        }
        Ok(self
            .sheets
            .get(sheet)
            .and_then(|rows| rows.get(row_no - 1))
            .cloned())
    }

    fn write_row(&mut self, sheet: &str, row_no: usize, row: &[String]) -> Result<()> {
        let rows = self.sheets.entry(sheet.to_string()).or_default();
        match row_no {
            0 => Err(Error::InvalidArgument("row numbers start at 1".into())),
            n if n <= rows.len() => {
                rows[n - 1] = row.to_vec();
                Ok(())
            }
            n if n == rows.len() + 1 => {
                rows.push(row.to_vec());
                Ok(())
            }
            n => Err(Error::InvalidArgument(format!(
                "row {} is past the end of sheet '{}' ({} rows)",
                n,
                sheet,
                rows.len()
            ))),
        }
    }

    fn append_row(&mut self, sheet: &str, row: &[String]) -> Result<usize> {
        let rows = self.sheets.entry(sheet.to_string()).or_default();
        rows.push(row.to_vec());
        Ok(rows.len())
    }

    fn rows(&self, sheet: &str) -> Result<Vec<Row>> {
        Ok(self.sheets.get(sheet).cloned().unwrap_or_default())
    }
}
