//! Ingestion endpoint: raw request body in, [`Confirmation`] out.
//!
//! [`Ingestor::ingest`] never returns an error. Parse and validation failures
//! come back in-band as `success: false`; the primary row append is the only
//! step whose failure changes the answer. The analytics and activity appends
//! are best-effort and report their failures to an [`ErrorSink`].
//!
//! ```
//! use distribution_records::ingest::Ingestor;
//! use distribution_records::store::MemoryStore;
//!
//! let ingestor = Ingestor::builder(MemoryStore::new()).build();
//! let reply = ingestor.ingest(r#"{"id":"001","name":{"ja":"ピカチュウ"},"dexNo":"25"}"#);
//! assert!(reply.success);
//! ```

use crate::config::{ServerConfig, SheetNames};
use crate::error::{Error, Result, SideEffectError};
use crate::flatten::{flatten, stringify};
use crate::models::Confirmation;
use crate::schema::Schema;
use crate::store::{Row, SheetStore};
use chrono::{DateTime, FixedOffset, Offset, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};

/// Actor recorded in the activity sheet when the caller is anonymous.
pub const SYSTEM_ACTOR: &str = "system";
/// Action recorded in the activity sheet for every accepted submission.
pub const ACTION_RECORD_ADDED: &str = "record added";
/// Timestamp layout of the log sheets.
pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Written to the error sheet's detail column when nothing better is known.
pub const DETAIL_UNAVAILABLE: &str = "unavailable";

const ANALYTICS_HEADER: &[&str] = &["Timestamp", "ID", "Name", "Prefix", "Key", "Value"];
const ACTIVITY_HEADER: &[&str] = &["Timestamp", "User", "Action", "ID", "Name"];
const ERROR_HEADER: &[&str] = &["Timestamp", "Error Message", "Detail"];

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of "now" for row timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock rendered at a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Offsets outside ±24h fall back to UTC.
    pub fn with_offset_minutes(minutes: i32) -> Self {
        let offset = FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::with_offset_minutes(ServerConfig::default().utc_offset_minutes)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

fn log_time(at: &DateTime<FixedOffset>) -> String {
    at.format(LOG_TIME_FORMAT).to_string()
}

fn cells(values: &[&str]) -> Row {
    values.iter().map(|v| v.to_string()).collect()
}

// ---------------------------------------------------------------------------
// ErrorSink
// ---------------------------------------------------------------------------

/// Receiver for failures that must not reach the submitter.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &SideEffectError);
}

/// Logs side-effect failures through `tracing` only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, error: &SideEffectError) {
        tracing::error!(
            stage = error.stage,
            detail = error.detail.as_deref().unwrap_or(DETAIL_UNAVAILABLE),
            "{}",
            error.message
        );
    }
}

/// Appends side-effect failures to the error sheet.
///
/// If the error sheet itself cannot be written, the failure is logged with
/// `tracing` and dropped.
pub struct SheetErrorSink<S: SheetStore> {
    store: Arc<Mutex<S>>,
    sheet: String,
    clock: Arc<dyn Clock>,
}

impl<S: SheetStore> SheetErrorSink<S> {
    pub fn new(store: Arc<Mutex<S>>, sheet: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            sheet: sheet.into(),
            clock,
        }
    }

    fn append(&self, error: &SideEffectError) -> Result<()> {
        let mut store = lock(&self.store)?;
        if store.row_count(&self.sheet)? == 0 {
            store.append_row(&self.sheet, &cells(ERROR_HEADER))?;
        }
        let row = vec![
            log_time(&self.clock.now()),
            error.to_string(),
            error
                .detail
                .clone()
                .unwrap_or_else(|| DETAIL_UNAVAILABLE.to_string()),
        ];
        store.append_row(&self.sheet, &row)?;
        Ok(())
    }
}

impl<S: SheetStore> ErrorSink for SheetErrorSink<S> {
    fn report(&self, error: &SideEffectError) {
        tracing::warn!(stage = error.stage, "{}", error.message);
        if let Err(e) = self.append(error) {
            tracing::error!(
                sheet = %self.sheet,
                error = %e,
                original = %error,
                "failed to write error sheet"
            );
        }
    }
}

fn lock<S>(store: &Mutex<S>) -> Result<MutexGuard<'_, S>> {
    store
        .lock()
        .map_err(|_| Error::InvalidArgument("sheet store lock poisoned".into()))
}

// ---------------------------------------------------------------------------
// IngestorBuilder
// ---------------------------------------------------------------------------

pub struct IngestorBuilder<S: SheetStore> {
    store: Arc<Mutex<S>>,
    schema: Schema,
    sheets: SheetNames,
    clock: Option<Arc<dyn Clock>>,
    sink: Option<Arc<dyn ErrorSink>>,
    idempotent_retries: bool,
}

impl<S: SheetStore + 'static> IngestorBuilder<S> {
    /// Replace the primary column layout.
    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn sheets(mut self, sheets: SheetNames) -> Self {
        self.sheets = sheets;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Where side-effect failures go. Defaults to the error sheet.
    pub fn error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn idempotent_retries(mut self, enabled: bool) -> Self {
        self.idempotent_retries = enabled;
        self
    }

    /// Apply sheet names, idempotency, and log offset from a server config.
    pub fn config(self, config: &ServerConfig) -> Self {
        let clock = Arc::new(SystemClock::with_offset_minutes(config.utc_offset_minutes));
        self.sheets(config.sheets.clone())
            .idempotent_retries(config.idempotent_retries)
            .clock(clock)
    }

    pub fn build(self) -> Ingestor<S> {
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock::default()),
        };
        let sink: Arc<dyn ErrorSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(SheetErrorSink::new(
                self.store.clone(),
                self.sheets.errors.clone(),
                clock.clone(),
            )),
        };
        Ingestor {
            store: self.store,
            schema: self.schema,
            sheets: self.sheets,
            clock,
            sink,
            idempotent_retries: self.idempotent_retries,
        }
    }
}

// ---------------------------------------------------------------------------
// Ingestor
// ---------------------------------------------------------------------------

enum Saved {
    Appended(usize),
    AlreadyPresent(usize),
}

pub struct Ingestor<S: SheetStore> {
    store: Arc<Mutex<S>>,
    schema: Schema,
    sheets: SheetNames,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn ErrorSink>,
    idempotent_retries: bool,
}

impl<S: SheetStore + 'static> Ingestor<S> {
    pub fn builder(store: S) -> IngestorBuilder<S> {
        Self::builder_shared(Arc::new(Mutex::new(store)))
    }

    /// Builder over a store that other components also hold.
    pub fn builder_shared(store: Arc<Mutex<S>>) -> IngestorBuilder<S> {
        IngestorBuilder {
            store,
            schema: Schema::primary(),
            sheets: SheetNames::default(),
            clock: None,
            sink: None,
            idempotent_retries: false,
        }
    }
}

impl<S: SheetStore> Ingestor<S> {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn sheets(&self) -> &SheetNames {
        &self.sheets
    }

    /// The shared store handle.
    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    /// Ingest an anonymous submission.
    pub fn ingest(&self, raw_body: &str) -> Confirmation {
        self.ingest_as(raw_body, SYSTEM_ACTOR)
    }

    /// Ingest a submission on behalf of `actor`. A blank actor is recorded as
    /// [`SYSTEM_ACTOR`].
    pub fn ingest_as(&self, raw_body: &str, actor: &str) -> Confirmation {
        let body = raw_body.trim();
        if body.is_empty() {
            return Confirmation::failed("request body is empty");
        }
        let payload: Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => return Confirmation::failed(format!("invalid JSON: {}", e)),
        };
        if !payload.is_object() {
            return Confirmation::failed("invalid JSON: expected an object");
        }
        let missing = missing_keys(&payload);
        if !missing.is_empty() {
            return Confirmation::failed(format!(
                "missing required fields: {}",
                missing.join(", ")
            ));
        }

        let actor = if actor.trim().is_empty() {
            SYSTEM_ACTOR
        } else {
            actor.trim()
        };
        let id = payload.pointer("/id").map(stringify).unwrap_or_default();
        let mut side_errors = Vec::new();
        let saved = self.save(&payload, actor, &mut side_errors);
        for error in &side_errors {
            self.sink.report(error);
        }

        match saved {
            Ok(Saved::Appended(row_no)) => {
                tracing::info!(id = %id, row = row_no, actor, "record saved");
                Confirmation::ok("Record saved")
            }
            Ok(Saved::AlreadyPresent(row_no)) => {
                tracing::info!(id = %id, row = row_no, "duplicate submission acknowledged");
                Confirmation::ok("Record already saved")
            }
            Err(e) => {
                self.sink.report(&SideEffectError::new("primary", &e));
                Confirmation::failed(format!("failed to save record: {}", e))
            }
        }
    }

    /// Primary append plus side logs, all under one store lock.
    fn save(
        &self,
        payload: &Value,
        actor: &str,
        side_errors: &mut Vec<SideEffectError>,
    ) -> Result<Saved> {
        let mut store = lock(&self.store)?;
        let now = self.clock.now();
        let now_rfc = now
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let row = self.schema.row_for(payload, &now_rfc);

        self.ensure_header(&mut *store)?;
        if self.idempotent_retries {
            if let Some(existing) = self.find_duplicate(&*store, &row)? {
                return Ok(Saved::AlreadyPresent(existing));
            }
        }
        let row_no = store.append_row(&self.sheets.records, &row)?;

        let log_ts = log_time(&now);
        let id = payload.pointer("/id").map(stringify).unwrap_or_default();
        let name = display_name(payload);
        if let Err(e) = self.append_analytics(&mut *store, payload, &log_ts, &id, &name) {
            side_errors.push(SideEffectError::new("analytics", &e));
        }
        let activity = vec![
            log_ts,
            actor.to_string(),
            ACTION_RECORD_ADDED.to_string(),
            id,
            name,
        ];
        if let Err(e) = append_log(&mut *store, &self.sheets.activity, ACTIVITY_HEADER, &activity)
        {
            side_errors.push(SideEffectError::new("activity", &e));
        }
        Ok(Saved::Appended(row_no))
    }

    /// Append the header when the sheet is empty, rewrite it when it drifted.
    fn ensure_header(&self, store: &mut S) -> Result<()> {
        let expected = self.schema.headers();
        let sheet = &self.sheets.records;
        match store.read_row(sheet, 1)? {
            None => {
                store.write_row(sheet, 1, &expected)?;
                tracing::info!(sheet = %sheet, "wrote header row");
            }
            Some(current) if !header_matches(&current, &expected) => {
                store.write_row(sheet, 1, &expected)?;
                tracing::warn!(sheet = %sheet, "header row drifted; rewrote it");
            }
            Some(_) => {}
        }
        Ok(())
    }

    fn find_duplicate(&self, store: &S, row: &[String]) -> Result<Option<usize>> {
        let (Some(id_col), Some(ts_col)) = (
            self.schema.column_index("ID"),
            self.schema.column_index("Timestamp"),
        ) else {
            return Ok(None);
        };
        let rows = store.rows(&self.sheets.records)?;
        Ok(rows
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, r)| r.get(id_col) == row.get(id_col) && r.get(ts_col) == row.get(ts_col))
            .map(|(i, _)| i + 1))
    }

    fn append_analytics(
        &self,
        store: &mut S,
        payload: &Value,
        log_ts: &str,
        id: &str,
        name: &str,
    ) -> Result<()> {
        for entry in flatten(payload) {
            let row = vec![
                log_ts.to_string(),
                id.to_string(),
                name.to_string(),
                entry.prefix,
                entry.key,
                entry.value,
            ];
            append_log(store, &self.sheets.analytics, ANALYTICS_HEADER, &row)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    /// Data rows keyed by header, with the total data-row count.
    pub fn list_records(&self, limit: usize, offset: usize) -> Result<(Vec<Value>, usize)> {
        let store = lock(&self.store)?;
        let rows = store.rows(&self.sheets.records)?;
        let Some((header, data)) = rows.split_first() else {
            return Ok((Vec::new(), 0));
        };
        let page = data
            .iter()
            .skip(offset)
            .take(limit)
            .map(|row| keyed_row(header, row))
            .collect();
        Ok((page, data.len()))
    }

    /// First data row whose ID column equals `id`.
    pub fn find_record(&self, id: &str) -> Result<Option<Value>> {
        let store = lock(&self.store)?;
        let rows = store.rows(&self.sheets.records)?;
        let Some((header, data)) = rows.split_first() else {
            return Ok(None);
        };
        let Some(id_col) = header.iter().position(|h| h == "ID") else {
            return Ok(None);
        };
        Ok(data
            .iter()
            .find(|row| row.get(id_col).map(String::as_str) == Some(id))
            .map(|row| keyed_row(header, row)))
    }
}

fn append_log<S: SheetStore + ?Sized>(
    store: &mut S,
    sheet: &str,
    header: &[&str],
    row: &[String],
) -> Result<()> {
    if store.row_count(sheet)? == 0 {
        store.append_row(sheet, &cells(header))?;
    }
    store.append_row(sheet, row)?;
    Ok(())
}

/// Top-level keys the endpoint refuses to store without.
fn missing_keys(payload: &Value) -> Vec<&'static str> {
    let present = |pointers: &[&str]| {
        pointers.iter().any(|p| {
            payload
                .pointer(p)
                .map(|v| !stringify(v).trim().is_empty() && !v.is_object())
                .unwrap_or(false)
        })
    };
    let mut missing = Vec::new();
    if !present(&["/id"]) {
        missing.push("id");
    }
    if !present(&["/name/ja", "/name"]) {
        missing.push("name");
    }
    if !present(&["/dexNo", "/catalogNumber"]) {
        missing.push("dexNo");
    }
    missing
}

/// `name.ja`, or `name` itself when it is a plain string.
fn display_name(payload: &Value) -> String {
    match payload.get("name") {
        Some(Value::Object(name)) => name.get("ja").map(stringify).unwrap_or_default(),
        Some(other) => stringify(other),
        None => String::new(),
    }
}

/// Trailing blank cells are ignored; sheets often pad rows.
fn header_matches(current: &[String], expected: &[String]) -> bool {
    let trimmed = current
        .iter()
        .rposition(|c| !c.trim().is_empty())
        .map_or(&current[..0], |last| &current[..=last]);
    trimmed.len() == expected.len()
        && trimmed
            .iter()
            .zip(expected)
            .all(|(a, b)| a.trim() == b.as_str())
}

fn keyed_row(header: &[String], row: &[String]) -> Value {
    let map: Map<String, Value> = header
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let cell = row.get(i).cloned().unwrap_or_default();
            (h.clone(), Value::String(cell))
        })
        .collect();
    Value::Object(map)
}
