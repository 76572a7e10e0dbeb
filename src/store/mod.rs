//! Named, append-only tabular sheets.
//!
//! The ingestion endpoint only needs to count, read, overwrite, and append
//! rows by 1-based index, so any spreadsheet-like backend fits behind
//! [`SheetStore`]. Rows are ragged: a sheet does not fix its width.

mod duckdb_store;
mod memory;

pub use self::duckdb_store::DuckDbStore;
pub use self::memory::MemoryStore;

use crate::error::Result;

pub type Row = Vec<String>;

pub trait SheetStore: Send {
    /// Number of rows in `sheet`. A sheet that was never written has zero.
    fn row_count(&self, sheet: &str) -> Result<usize>;

    /// Row `row_no` (1-based), or `None` past the end.
    fn read_row(&self, sheet: &str, row_no: usize) -> Result<Option<Row>>;

    /// Replace row `row_no` (1-based). Writing one past the end appends.
    fn write_row(&mut self, sheet: &str, row_no: usize, row: &[String]) -> Result<()>;

    /// Append a row and return its 1-based index.
    fn append_row(&mut self, sheet: &str, row: &[String]) -> Result<usize>;

    /// All rows, in order.
    fn rows(&self, sheet: &str) -> Result<Vec<Row>> {
        let count = self.row_count(sheet)?;
        let mut out = Vec::with_capacity(count);
        for row_no in 1..=count {
            if let Some(row) = self.read_row(sheet, row_no)? {
                out.push(row);
            }
        }
        Ok(out)
    }
}
