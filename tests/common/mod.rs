//! Shared test fixtures for the distribution-records integration tests.
//!
//! Everything here stands in for an outside collaborator: a scripted HTTP
//! transport, an in-process transport that calls an [`Ingestor`] directly, a
//! surface that records what it was asked to draw, a clock frozen at a known
//! instant, and a sheet store that fails on chosen sheets.

#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, TimeZone};
use distribution_records::client::{Transport, TransportResponse};
use distribution_records::error::{Error, Result, SideEffectError};
use distribution_records::ingest::{Clock, ErrorSink, Ingestor};
use distribution_records::presenter::{FeedbackState, Surface};
use distribution_records::store::{MemoryStore, Row, SheetStore};
use distribution_records::RawForm;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;

// -- forms --------------------------------------------------------------------

/// A complete, valid generation-9 form.
pub fn sample_form() -> RawForm {
    RawForm::new()
        .with("id", "001")
        .with("name-ja", "ピカチュウ")
        .with("name-en", "Pikachu")
        .with("dex-no", "25")
        .with("generation", "9")
        .with("game", "スカーレット")
        .with("event-name", "Spring Event")
        .with("dist-method", "配布")
        .with("dist-location", "店頭")
        .with("start-date", "2024-01-01")
        .with("end-date", "2024-02-01")
        .with("level", "5")
        .with("terastallize", "でんき")
        .with("gigantamax", "yes")
        .with("move1", "でんきショック")
        .with("move2", "")
        .with("move3", "なきごえ")
        .with("ribbon1", "イベントリボン")
}

/// The end-to-end payload: raw JSON as an older client would send it.
pub fn legacy_payload() -> serde_json::Value {
    serde_json::json!({
        "id": "001",
        "name": { "ja": "ピカチュウ" },
        "catalogNumber": "25",
        "generation": 1,
        "game": "赤",
        "distribution": {
            "method": "配布",
            "location": "店頭",
            "startDate": "2024-01-01",
            "endDate": ""
        },
        "level": 5,
        "moves": ["でんきショック", "", "", " "],
        "tags": []
    })
}

// -- clock --------------------------------------------------------------------

pub struct FixedClock(pub DateTime<FixedOffset>);

impl FixedClock {
    /// 2024-03-01 12:34:56 at UTC+9.
    pub fn tokyo() -> Arc<Self> {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        Arc::new(Self(offset.with_ymd_and_hms(2024, 3, 1, 12, 34, 56).unwrap()))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

// -- error sink -----------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink {
    pub reports: Mutex<Vec<SideEffectError>>,
}

impl RecordingSink {
    pub fn stages(&self) -> Vec<&'static str> {
        self.reports.lock().unwrap().iter().map(|e| e.stage).collect()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, error: &SideEffectError) {
        self.reports.lock().unwrap().push(error.clone());
    }
}

// -- stores -----------------------------------------------------------------------

/// A [`MemoryStore`] whose writes to the named sheets fail.
#[derive(Default)]
pub struct FailingStore {
    pub inner: MemoryStore,
    pub failing: HashSet<String>,
}

impl FailingStore {
    pub fn failing_on(sheets: &[&str]) -> Self {
        Self {
            inner: MemoryStore::new(),
            failing: sheets.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn check(&self, sheet: &str) -> Result<()> {
        if self.failing.contains(sheet) {
            Err(Error::InvalidArgument(format!("sheet '{}' is read-only", sheet)))
        } else {
            Ok(())
        }
    }
}

impl SheetStore for FailingStore {
    fn row_count(&self, sheet: &str) -> Result<usize> {
        self.inner.row_count(sheet)
    }

    fn read_row(&self, sheet: &str, row_no: usize) -> Result<Option<Row>> {
        self.inner.read_row(sheet, row_no)
    }

    fn write_row(&mut self, sheet: &str, row_no: usize, row: &[String]) -> Result<()> {
        self.check(sheet)?;
        self.inner.write_row(sheet, row_no, row)
    }

    fn append_row(&mut self, sheet: &str, row: &[String]) -> Result<usize> {
        self.check(sheet)?;
        self.inner.append_row(sheet, row)
    }
}

/// Ingestor over a fresh memory store with a frozen clock and a recording sink.
pub fn setup_ingestor() -> (Ingestor<MemoryStore>, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let ingestor = Ingestor::builder(MemoryStore::new())
        .clock(FixedClock::tokyo())
        .error_sink(sink.clone())
        .build();
    (ingestor, sink)
}

/// Rows of `sheet` in the ingestor's store.
pub fn sheet_rows<S: SheetStore>(ingestor: &Ingestor<S>, sheet: &str) -> Vec<Row> {
    ingestor.store().lock().unwrap().rows(sheet).unwrap()
}

// -- transports -------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Step {
    /// The request never got an answer.
    Fail(String),
    Respond(u16, String),
}

impl Step {
    pub fn ok() -> Self {
        Step::Respond(200, r#"{"success":true,"message":"Record saved"}"#.to_string())
    }

    pub fn rejected(message: &str) -> Self {
        Step::Respond(
            200,
            serde_json::json!({ "success": false, "message": message }).to_string(),
        )
    }
}

/// Plays back a fixed script, repeating the last step once it runs out.
pub struct ScriptedTransport {
    steps: Mutex<VecDeque<Step>>,
    last: Mutex<Option<Step>>,
    pub posts: Mutex<Vec<(Instant, String)>>,
    pub gets: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            last: Mutex::new(None),
            posts: Mutex::new(Vec::new()),
            gets: Mutex::new(Vec::new()),
        }
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }

    pub fn post_times(&self) -> Vec<Instant> {
        self.posts.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    fn next(&self) -> Result<TransportResponse> {
        let step = match self.steps.lock().unwrap().pop_front() {
            Some(step) => {
                *self.last.lock().unwrap() = Some(step.clone());
                step
            }
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .expect("transport script is empty"),
        };
        match step {
            Step::Fail(msg) => Err(Error::Transport(msg)),
            Step::Respond(status, body) => Ok(TransportResponse::new(status, body)),
        }
    }
}

impl Transport for ScriptedTransport {
    fn post_json(&self, _url: &str, body: &str) -> Result<TransportResponse> {
        self.posts
            .lock()
            .unwrap()
            .push((Instant::now(), body.to_string()));
        self.next()
    }

    fn get(&self, url: &str) -> Result<TransportResponse> {
        self.gets.lock().unwrap().push(url.to_string());
        self.next()
    }
}

/// Delivers POST bodies straight to an ingestor, as the HTTP layer would.
pub struct InProcessTransport<S: SheetStore + 'static> {
    pub ingestor: Arc<Ingestor<S>>,
}

impl<S: SheetStore + 'static> Transport for InProcessTransport<S> {
    fn post_json(&self, _url: &str, body: &str) -> Result<TransportResponse> {
        let confirmation = self.ingestor.ingest(body);
        Ok(TransportResponse::new(
            200,
            serde_json::to_string(&confirmation)?,
        ))
    }

    fn get(&self, _url: &str) -> Result<TransportResponse> {
        Ok(TransportResponse::new(404, "{}"))
    }
}

// -- surfaces ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Drawn {
    Render(FeedbackState, String),
    Clear,
}

/// Records every draw call; the log is shared so tests can read it after
/// handing the surface to a presenter.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    pub log: Arc<Mutex<Vec<Drawn>>>,
    pub showing: Arc<Mutex<Option<FeedbackState>>>,
}

impl RecordingSurface {
    pub fn log(&self) -> Vec<Drawn> {
        self.log.lock().unwrap().clone()
    }

    pub fn showing(&self) -> Option<FeedbackState> {
        *self.showing.lock().unwrap()
    }
}

impl Surface for RecordingSurface {
    fn render(&mut self, state: FeedbackState, message: &str) {
        let mut showing = self.showing.lock().unwrap();
        assert!(showing.is_none(), "render while {:?} is still visible", *showing);
        *showing = Some(state);
        self.log
            .lock()
            .unwrap()
            .push(Drawn::Render(state, message.to_string()));
    }

    fn clear(&mut self) {
        *self.showing.lock().unwrap() = None;
        self.log.lock().unwrap().push(Drawn::Clear);
    }
}
