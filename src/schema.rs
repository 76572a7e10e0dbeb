//! Column layout of the primary records sheet.
//!
//! Each [`Column`] names its header and the JSON pointer(s) it reads from a
//! submitted record. Reordering or extending the sheet is an edit to
//! [`PRIMARY_COLUMNS`]; the ingestor and the migration tool both work from the
//! table and need no code changes.

use crate::flatten::stringify;
use crate::normalize::pad_catalog_number;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// Text in the sheet, a JSON number when read back.
    Integer,
    /// Zero-padded when numeric, verbatim otherwise.
    CatalogNumber,
    /// Element `n` of an array, counting only non-blank elements.
    Item(usize),
    /// The record's own timestamp, or the ingestion time when it has none.
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub header: &'static str,
    /// JSON pointers tried in order; the first one present wins. The first
    /// entry is also where values are written back when rebuilding a record.
    pub paths: &'static [&'static str],
    pub kind: ColumnKind,
}

impl Column {
    pub const fn text(header: &'static str, paths: &'static [&'static str]) -> Self {
        Self {
            header,
            paths,
            kind: ColumnKind::Text,
        }
    }

    pub const fn integer(header: &'static str, paths: &'static [&'static str]) -> Self {
        Self {
            header,
            paths,
            kind: ColumnKind::Integer,
        }
    }

    pub const fn catalog_number(header: &'static str, paths: &'static [&'static str]) -> Self {
        Self {
            header,
            paths,
            kind: ColumnKind::CatalogNumber,
        }
    }

    pub const fn item(header: &'static str, paths: &'static [&'static str], index: usize) -> Self {
        Self {
            header,
            paths,
            kind: ColumnKind::Item(index),
        }
    }

    pub const fn timestamp(header: &'static str, paths: &'static [&'static str]) -> Self {
        Self {
            header,
            paths,
            kind: ColumnKind::Timestamp,
        }
    }

    fn lookup<'v>(&self, record: &'v Value) -> Option<&'v Value> {
        self.paths
            .iter()
            .find_map(|p| record.pointer(p).filter(|v| !v.is_null() && !v.is_object()))
    }

    /// Cell text for this column.
    pub fn cell(&self, record: &Value, now: &str) -> String {
        match self.kind {
            ColumnKind::Text | ColumnKind::Integer => {
                self.lookup(record).map(stringify).unwrap_or_default()
            }
            ColumnKind::CatalogNumber => {
                let raw = self.lookup(record).map(stringify).unwrap_or_default();
                pad_catalog_number(&raw).unwrap_or(raw)
            }
            ColumnKind::Item(index) => self
                .lookup(record)
                .and_then(|v| v.as_array())
                .and_then(|items| {
                    items
                        .iter()
                        .map(stringify)
                        .filter(|s| !s.trim().is_empty())
                        .nth(index)
                })
                .unwrap_or_default(),
            ColumnKind::Timestamp => match self.lookup(record).map(stringify) {
                Some(ts) if !ts.is_empty() => ts,
                _ => now.to_string(),
            },
        }
    }
}

const MOVES: &[&str] = &["/moves"];
const RIBBONS: &[&str] = &["/ribbons", "/tags"];

pub const PRIMARY_COLUMNS: &[Column] = &[
    Column::text("ID", &["/id"]),
    Column::text("Name (ja)", &["/name/ja", "/name"]),
    Column::text("Name (en)", &["/name/en"]),
    Column::catalog_number("Dex No", &["/dexNo", "/catalogNumber"]),
    Column::integer("Generation", &["/generation"]),
    Column::text("Game", &["/game"]),
    Column::text("Version", &["/version"]),
    Column::text("Event Name", &["/eventName"]),
    Column::text("Shiny", &["/shiny"]),
    Column::text("Distribution Method", &["/distribution/method"]),
    Column::text("Distribution Location", &["/distribution/location"]),
    Column::text("Start Date", &["/distribution/startDate"]),
    Column::text("End Date", &["/distribution/endDate"]),
    Column::text("OT Name", &["/otName"]),
    Column::text("Trainer ID", &["/trainerId"]),
    Column::text("Met Location", &["/metLocation"]),
    Column::text("Ball", &["/ball"]),
    Column::integer("Level", &["/level"]),
    Column::text("Gender", &["/gender"]),
    Column::text("Ability", &["/ability"]),
    Column::text("Nature", &["/nature"]),
    Column::text("Gigantamax", &["/gigantamax"]),
    Column::text("Tera Type", &["/terastallize"]),
    Column::text("Held Item", &["/heldItem"]),
    Column::item("Move 1", MOVES, 0),
    Column::item("Move 2", MOVES, 1),
    Column::item("Move 3", MOVES, 2),
    Column::item("Move 4", MOVES, 3),
    Column::item("Ribbon 1", RIBBONS, 0),
    Column::item("Ribbon 2", RIBBONS, 1),
    Column::item("Ribbon 3", RIBBONS, 2),
    Column::text("Other Info", &["/otherInfo"]),
    Column::timestamp("Timestamp", &["/timestamp"]),
];

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::primary()
    }
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// The records-sheet layout.
    pub fn primary() -> Self {
        Self::new(PRIMARY_COLUMNS.to_vec())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.to_string()).collect()
    }

    pub fn column_index(&self, header: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.header == header)
    }

    /// One sheet row for a submitted record.
    pub fn row_for(&self, record: &Value, now: &str) -> Vec<String> {
        self.columns.iter().map(|c| c.cell(record, now)).collect()
    }

    /// Rebuild record JSON from a header-keyed sheet row.
    ///
    /// Headers the schema does not know are ignored, blank list cells are
    /// dropped, catalog numbers are padded, and integer cells that fail to
    /// parse are kept as text.
    pub fn record_from_row(&self, row: &Map<String, Value>) -> Value {
        let mut record = Value::Object(Map::new());
        for column in &self.columns {
            let Some(cell) = row.get(column.header) else {
                continue;
            };
            let text = stringify(cell);
            let target = column.paths[0];
            match column.kind {
                ColumnKind::Text | ColumnKind::Timestamp => {
                    set_pointer(&mut record, target, Value::String(text));
                }
                ColumnKind::CatalogNumber => {
                    let padded = pad_catalog_number(&text).unwrap_or(text);
                    set_pointer(&mut record, target, Value::String(padded));
                }
                ColumnKind::Integer => {
                    let value = text
                        .trim()
                        .parse::<u64>()
                        .map(Value::from)
                        .unwrap_or(Value::String(text));
                    set_pointer(&mut record, target, value);
                }
                ColumnKind::Item(_) => {
                    let slot = ensure_pointer(&mut record, target, || Value::Array(Vec::new()));
                    if let (Value::Array(items), false) = (slot, text.trim().is_empty()) {
                        items.push(Value::String(text.trim().to_string()));
                    }
                }
            }
        }
        record
    }
}

fn set_pointer(root: &mut Value, pointer: &str, value: Value) {
    *ensure_pointer(root, pointer, || Value::Null) = value;
}

/// Walk `pointer`, creating intermediate objects, and return the leaf slot.
fn ensure_pointer<'v>(
    root: &'v mut Value,
    pointer: &str,
    init: impl FnOnce() -> Value,
) -> &'v mut Value {
    let mut parts: Vec<&str> = pointer.split('/').skip(1).collect();
    let leaf = parts.pop().unwrap_or("");
    let mut node = root;
    for part in parts {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => unreachable!(),
        };
    }
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map.entry(leaf.to_string()).or_insert_with(init),
        _ => unreachable!(),
    }
}
