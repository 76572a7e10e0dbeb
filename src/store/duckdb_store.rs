//! DuckDB-backed sheet store.
//!
//! Every sheet lives in one table keyed by `(sheet, row_no)`; each row's
//! cells are stored as a JSON array so rows of different widths coexist.

use super::{Row, SheetStore};
use crate::error::{Error, Result};
use duckdb::{params, Connection as DuckDbConnection, OptionalExt};
use std::fs;
use std::path::Path;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS sheet_rows (\
     sheet VARCHAR NOT NULL, \
     row_no BIGINT NOT NULL, \
     cells VARCHAR NOT NULL, \
     PRIMARY KEY (sheet, row_no))";

pub struct DuckDbStore {
    conn: DuckDbConnection,
}

impl DuckDbStore {
    /// Open (or create) a store file, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = DuckDbConnection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = DuckDbConnection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: DuckDbConnection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLE)?;
        Ok(Self { conn })
    }

    /// Access the underlying DuckDB connection for ad-hoc queries.
    pub fn raw(&self) -> &DuckDbConnection {
        &self.conn
    }

    fn upsert(&self, sheet: &str, row_no: usize, row: &[String]) -> Result<()> {
        let cells = serde_json::to_string(row)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO sheet_rows (sheet, row_no, cells) VALUES (?, ?, ?)",
            params![sheet, row_no as i64, cells],
        )?;
        Ok(())
    }
}

fn decode_cells(cells: &str) -> Result<Row> {
    Ok(serde_json::from_str(cells)?)
}

impl SheetStore for DuckDbStore {
    fn row_count(&self, sheet: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sheet_rows WHERE sheet = ?",
            params![sheet],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn read_row(&self, sheet: &str, row_no: usize) -> Result<Option<Row>> {
        let cells: Option<String> = self
            .conn
            .query_row(
                "SELECT cells FROM sheet_rows WHERE sheet = ? AND row_no = ?",
                params![sheet, row_no as i64],
                |row| row.get(0),
            )
            .optional()?;
        cells.as_deref().map(decode_cells).transpose()
    }

    fn write_row(&mut self, sheet: &str, row_no: usize, row: &[String]) -> Result<()> {
        let count = self.row_count(sheet)?;
        if row_no == 0 || row_no > count + 1 {
            return Err(Error::InvalidArgument(format!(
                "row {} is out of range for sheet '{}' ({} rows)",
                row_no, sheet, count
            )));
        }
        self.upsert(sheet, row_no, row)
    }

    fn append_row(&mut self, sheet: &str, row: &[String]) -> Result<usize> {
        let row_no = self.row_count(sheet)? + 1;
        self.upsert(sheet, row_no, row)?;
        Ok(row_no)
    }

    fn rows(&self, sheet: &str) -> Result<Vec<Row>> {
        let mut stmt = self
            .conn
            .prepare("SELECT cells FROM sheet_rows WHERE sheet = ? ORDER BY row_no")?;
        let mut rows = stmt.query(params![sheet])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let cells: String = row.get(0)?;
            out.push(decode_cells(&cells)?);
        }
        Ok(out)
    }
}
