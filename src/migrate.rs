//! Move rows from a legacy records sheet into a running ingestion endpoint.
//!
//! Legacy rows are read header-keyed, rebuilt into record JSON by running the
//! primary [`Schema`] in reverse, and resubmitted one at a time with a pause
//! between requests.

use crate::client::{SubmissionClient, Transport};
use crate::error::{Error, Result};
use crate::flatten::stringify;
use crate::schema::Schema;
use crate::store::SheetStore;
use chrono::{SecondsFormat, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

pub type LegacyRow = Map<String, Value>;

/// Read every data row of `sheet`, keyed by the sheet's header row.
///
/// Rows that are entirely blank are skipped.
pub fn read_legacy_rows<S: SheetStore + ?Sized>(store: &S, sheet: &str) -> Result<Vec<LegacyRow>> {
    let rows = store.rows(sheet)?;
    let Some((header, data)) = rows.split_first() else {
        return Ok(Vec::new());
    };
    Ok(data
        .iter()
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .map(|row| {
            header
                .iter()
                .enumerate()
                .filter(|(_, h)| !h.trim().is_empty())
                .map(|(i, h)| {
                    let cell = row.get(i).cloned().unwrap_or_default();
                    (h.trim().to_string(), Value::String(cell))
                })
                .collect()
        })
        .collect())
}

/// Rebuild submission JSON from one legacy row.
///
/// A row without an ID is rejected. A row without a timestamp is stamped
/// with `now`.
pub fn transform_row(schema: &Schema, row: &LegacyRow, now: &str) -> Result<Value> {
    let mut record = schema.record_from_row(row);
    let id = record.pointer("/id").map(stringify).unwrap_or_default();
    if id.trim().is_empty() {
        return Err(Error::InvalidArgument("row has no ID".to_string()));
    }
    if let Value::Object(map) = &mut record {
        let stamped = map
            .get("timestamp")
            .map(|v| !stringify(v).trim().is_empty())
            .unwrap_or(false);
        if !stamped {
            map.insert("timestamp".to_string(), Value::String(now.to_string()));
        }
    }
    Ok(record)
}

/// Write `rows` as pretty JSON. A `.gz` path is gzip-compressed.
pub fn write_backup(path: &Path, rows: &[LegacyRow]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = BufWriter::new(File::create(path)?);
    let gzipped = path.extension().map(|e| e == "gz").unwrap_or(false);
    if gzipped {
        let mut encoder = GzEncoder::new(file, Compression::default());
        serde_json::to_writer_pretty(&mut encoder, rows)?;
        encoder.finish()?.flush()?;
    } else {
        let mut file = file;
        serde_json::to_writer_pretty(&mut file, rows)?;
        file.flush()?;
    }
    tracing::info!(path = %path.display(), rows = rows.len(), "backup written");
    Ok(())
}

// ---------------------------------------------------------------------------
// Migrator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationSummary {
    pub success: usize,
    pub errors: usize,
    pub total: usize,
    /// One line per failed row.
    pub details: Vec<String>,
}

pub struct Migrator<'a, T: Transport> {
    client: &'a SubmissionClient<T>,
    schema: Schema,
    delay: Duration,
}

impl<'a, T: Transport> Migrator<'a, T> {
    pub fn new(client: &'a SubmissionClient<T>) -> Self {
        Self {
            client,
            schema: Schema::primary(),
            delay: Duration::from_secs(1),
        }
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Pause after each submitted row.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Transform the first row only, without submitting anything.
    pub fn dry_run(&self, rows: &[LegacyRow]) -> Option<Result<Value>> {
        rows.first()
            .map(|row| transform_row(&self.schema, row, &now_rfc3339()))
    }

    /// Submit every row and tally the outcome. Individual failures are
    /// recorded in the summary and do not stop the run.
    pub fn run(&self, rows: &[LegacyRow]) -> MigrationSummary {
        let mut summary = MigrationSummary {
            total: rows.len(),
            ..Default::default()
        };
        tracing::info!(total = rows.len(), "starting migration");

        for (index, row) in rows.iter().enumerate() {
            let label = row
                .get("ID")
                .map(stringify)
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("row {}", index + 2));

            let record = match transform_row(&self.schema, row, &now_rfc3339()) {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(row = %label, error = %e, "transform failed");
                    summary.errors += 1;
                    summary.details.push(format!("{}: {}", label, e));
                    continue;
                }
            };

            match self.client.submit_value(&record) {
                Ok(_) => {
                    tracing::info!(row = %label, "migrated");
                    summary.success += 1;
                }
                Err(e) => {
                    tracing::error!(row = %label, error = %e, "submission failed");
                    summary.errors += 1;
                    summary.details.push(format!("{}: {}", label, e));
                }
            }

            if !self.delay.is_zero() && index + 1 < rows.len() {
                thread::sleep(self.delay);
            }
        }

        tracing::info!(
            success = summary.success,
            errors = summary.errors,
            total = summary.total,
            "migration finished"
        );
        summary
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
