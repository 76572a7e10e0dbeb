//! Form normalizer: raw UI field values in, canonical [`Record`] out.
//!
//! Field ids are resolved through [`FIELD_TABLE`] rather than read ad hoc, so
//! a typo in a form template shows up as an ignored field in the debug log
//! instead of a silently empty record attribute.

use crate::config;
use crate::error::{Error, Result, ValidationError};
use crate::models::{Distribution, Name, Record};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub const MAX_MOVES: usize = 4;
pub const MAX_RIBBONS: usize = 3;
pub const CATALOG_NUMBER_WIDTH: usize = 4;

// ---------------------------------------------------------------------------
// RawForm
// ---------------------------------------------------------------------------

/// One form field as the UI hands it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Single(String),
    Multi(Vec<String>),
}

impl FieldValue {
    /// The first value, or `""` for an empty multi-value.
    pub fn first(&self) -> &str {
        match self {
            FieldValue::Single(s) => s,
            FieldValue::Multi(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn values(&self) -> Vec<&str> {
        match self {
            FieldValue::Single(s) => vec![s.as_str()],
            FieldValue::Multi(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Untyped form state keyed by UI field id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawForm {
    fields: HashMap<String, FieldValue>,
}

impl RawForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style single-value setter.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.fields
            .insert(key.to_string(), FieldValue::Single(value.into()));
    }

    pub fn set_multi<I, V>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.fields.insert(key.to_string(), FieldValue::Multi(values));
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Single text value of a field, `""` when absent.
    pub fn text(&self, key: &str) -> &str {
        self.fields.get(key).map(FieldValue::first).unwrap_or("")
    }

    /// Overwrite fields with those of `other`.
    pub fn merge(&mut self, other: RawForm) {
        self.fields.extend(other.fields);
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Build a form from a flat JSON object.
    ///
    /// Strings, numbers and booleans become single values; arrays become
    /// multi-values; `null` fields are skipped.
    pub fn from_json(value: &Value) -> Result<Self> {
        let map = value.as_object().ok_or_else(|| {
            Error::InvalidArgument("form JSON must be an object".to_string())
        })?;

        let mut form = Self::new();
        for (key, v) in map {
            match v {
                Value::Null => {}
                Value::String(s) => form.set(key, s.clone()),
                Value::Number(_) | Value::Bool(_) => form.set(key, v.to_string()),
                Value::Array(items) => {
                    let values: Vec<String> = items.iter().map(scalar_text).collect();
                    form.set_multi(key, values);
                }
                Value::Object(_) => {
                    return Err(Error::InvalidArgument(format!(
                        "form field '{}' must not be an object",
                        key
                    )))
                }
            }
        }
        Ok(form)
    }

    /// Build a form from `key=value` pairs. Repeated keys accumulate.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut form = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                Error::InvalidArgument(format!("expected key=value, got '{}'", pair))
            })?;
            let key = key.trim();
            match form.fields.remove(key) {
                None => form.set(key, value),
                Some(FieldValue::Single(prev)) => {
                    form.set_multi(key, vec![prev, value.to_string()]);
                }
                Some(FieldValue::Multi(mut prev)) => {
                    prev.push(value.to_string());
                    form.set_multi(key, prev);
                }
            }
        }
        Ok(form)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Field table
// ---------------------------------------------------------------------------

/// Record attribute a form field feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Id,
    NameJa,
    NameEn,
    DexNo,
    Generation,
    Game,
    Version,
    EventName,
    DistMethod,
    DistLocation,
    StartDate,
    EndDate,
    Shiny,
    OtName,
    TrainerId,
    MetLocation,
    Ball,
    Level,
    Ability,
    Nature,
    Gender,
    HeldItem,
    /// Listed in the generation table; only kept for matching generations.
    Variant,
    Move(usize),
    Ribbon(usize),
    OtherInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub id: &'static str,
    pub target: Target,
    pub required: bool,
}

const fn field(id: &'static str, target: Target) -> FieldSpec {
    FieldSpec {
        id,
        target,
        required: false,
    }
}

const fn required(id: &'static str, target: Target) -> FieldSpec {
    FieldSpec {
        id,
        target,
        required: true,
    }
}

/// Every form field the normalizer understands, in form order.
pub const FIELD_TABLE: &[FieldSpec] = &[
    required("id", Target::Id),
    required("name-ja", Target::NameJa),
    field("name-en", Target::NameEn),
    required("dex-no", Target::DexNo),
    field("generation", Target::Generation),
    required("game", Target::Game),
    field("version", Target::Version),
    field("event-name", Target::EventName),
    field("dist-method", Target::DistMethod),
    field("dist-location", Target::DistLocation),
    required("start-date", Target::StartDate),
    field("end-date", Target::EndDate),
    field("shiny", Target::Shiny),
    field("ot-name", Target::OtName),
    field("trainer-id", Target::TrainerId),
    field("met-location", Target::MetLocation),
    field("ball", Target::Ball),
    field("level", Target::Level),
    field("ability", Target::Ability),
    field("nature", Target::Nature),
    field("gender", Target::Gender),
    field("gigantamax", Target::Variant),
    field("terastallize", Target::Variant),
    field("held-item", Target::HeldItem),
    field("move1", Target::Move(0)),
    field("move2", Target::Move(1)),
    field("move3", Target::Move(2)),
    field("move4", Target::Move(3)),
    field("ribbon1", Target::Ribbon(0)),
    field("ribbon2", Target::Ribbon(1)),
    field("ribbon3", Target::Ribbon(2)),
    field("other-info", Target::OtherInfo),
];

/// Multi-value alternatives to the numbered move/ribbon fields.
const MOVES_FIELD: &str = "moves";
const RIBBONS_FIELD: &str = "ribbons";

pub fn field_spec(id: &str) -> Option<&'static FieldSpec> {
    FIELD_TABLE.iter().find(|f| f.id == id)
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

/// Zero-pad a catalog number to four digits.
///
/// Returns `None` for blank or non-numeric input. Values already four digits
/// or wider are returned unchanged.
pub fn pad_catalog_number(raw: &str) -> Option<String> {
    let digits = raw.trim();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>width$}", digits, width = CATALOG_NUMBER_WIDTH))
}

/// Drop whitespace-only entries, keeping the rest in order.
pub fn filter_blank<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .filter(|v| !v.as_ref().trim().is_empty())
        .map(|v| v.as_ref().to_string())
        .collect()
}

fn is_iso_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").is_ok()
}

// ---------------------------------------------------------------------------
// FormNormalizer
// ---------------------------------------------------------------------------

/// Validates raw form input and builds [`Record`]s.
pub struct FormNormalizer {
    generation_fields: HashMap<u32, &'static [&'static str]>,
}

impl Default for FormNormalizer {
    fn default() -> Self {
        Self {
            generation_fields: config::generation_fields(),
        }
    }
}

impl FormNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the generation → extra-field table.
    pub fn with_generation_fields(
        mut self,
        table: HashMap<u32, &'static [&'static str]>,
    ) -> Self {
        self.generation_fields = table;
        self
    }

    /// Normalize with the current time as the record timestamp.
    pub fn normalize(&self, form: &RawForm) -> std::result::Result<Record, ValidationError> {
        self.normalize_at(form, Utc::now())
    }

    /// Normalize with an explicit timestamp.
    pub fn normalize_at(
        &self,
        form: &RawForm,
        now: DateTime<Utc>,
    ) -> std::result::Result<Record, ValidationError> {
        for key in form.keys().filter(|k| !self.is_known(k)) {
            tracing::debug!(field = key, "ignoring unknown form field");
        }

        let mut draft = Draft::default();
        let mut errors = ValidationError::default();
        for spec in FIELD_TABLE {
            let value = form.text(spec.id);
            if spec.required && value.trim().is_empty() {
                errors.missing.push(spec.id);
            }
            draft.assign(spec.target, value);
        }
        draft.moves.splice(0..0, list_values(form, MOVES_FIELD));
        draft.ribbons.splice(0..0, list_values(form, RIBBONS_FIELD));

        let dex_no = pad_catalog_number(&draft.dex_no);
        if dex_no.is_none() && !errors.missing.contains(&"dex-no") {
            errors.malformed.push("dex-no");
        }
        if !draft.start_date.is_empty() && !is_iso_date(&draft.start_date) {
            errors.malformed.push("start-date");
        }
        if !draft.end_date.is_empty() && !is_iso_date(&draft.end_date) {
            errors.malformed.push("end-date");
        }

        if !errors.is_empty() {
            tracing::debug!(fields = ?errors.fields(), "form failed validation");
            return Err(errors);
        }

        let generation = draft.generation.parse::<u32>().unwrap_or(0);
        let level = match draft.level.parse::<u32>() {
            Ok(n) if n >= 1 => n,
            _ => 1,
        };
        if draft.version.trim().is_empty() {
            draft.version = draft.game.clone();
        }
        let mut moves = filter_blank(&draft.moves);
        moves.truncate(MAX_MOVES);
        let mut ribbons = filter_blank(&draft.ribbons);
        ribbons.truncate(MAX_RIBBONS);

        Ok(Record {
            id: draft.id,
            name: Name {
                ja: draft.name_ja,
                en: draft.name_en,
            },
            dex_no: dex_no.unwrap_or_default(),
            generation,
            game: draft.game,
            version: draft.version,
            event_name: draft.event_name,
            distribution: Distribution {
                method: draft.dist_method,
                location: draft.dist_location,
                start_date: draft.start_date,
                end_date: draft.end_date,
            },
            shiny: draft.shiny,
            ot_name: draft.ot_name,
            trainer_id: draft.trainer_id,
            met_location: draft.met_location,
            ball: draft.ball,
            level,
            ability: draft.ability,
            nature: draft.nature,
            gender: draft.gender,
            variant_flags: self.variant_flags(form, generation),
            held_item: draft.held_item,
            moves,
            ribbons,
            other_info: draft.other_info,
            timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        })
    }

    fn is_known(&self, key: &str) -> bool {
        field_spec(key).is_some()
            || key == MOVES_FIELD
            || key == RIBBONS_FIELD
            || self
                .generation_fields
                .values()
                .any(|ids| ids.iter().any(|id| *id == key))
    }

    fn variant_flags(&self, form: &RawForm, generation: u32) -> BTreeMap<String, String> {
        self.generation_fields
            .get(&generation)
            .map(|ids| {
                ids.iter()
                    .map(|id| (id.to_string(), form.text(id).to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Indented JSON of a normalized record, for review before submitting.
pub fn preview(record: &Record) -> Result<String> {
    Ok(record.to_pretty_json()?)
}

fn list_values(form: &RawForm, key: &str) -> Vec<String> {
    form.get(key)
        .map(|v| v.values().into_iter().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Field values gathered through the field table before validation.
#[derive(Default)]
struct Draft {
    id: String,
    name_ja: String,
    name_en: String,
    dex_no: String,
    generation: String,
    game: String,
    version: String,
    event_name: String,
    dist_method: String,
    dist_location: String,
    start_date: String,
    end_date: String,
    shiny: String,
    ot_name: String,
    trainer_id: String,
    met_location: String,
    ball: String,
    level: String,
    ability: String,
    nature: String,
    gender: String,
    held_item: String,
    moves: Vec<String>,
    ribbons: Vec<String>,
    other_info: String,
}

impl Draft {
    fn assign(&mut self, target: Target, value: &str) {
        let slot = match target {
            Target::Id => &mut self.id,
            Target::NameJa => &mut self.name_ja,
            Target::NameEn => &mut self.name_en,
            Target::DexNo => &mut self.dex_no,
            Target::Generation => &mut self.generation,
            Target::Game => &mut self.game,
            Target::Version => &mut self.version,
            Target::EventName => &mut self.event_name,
            Target::DistMethod => &mut self.dist_method,
            Target::DistLocation => &mut self.dist_location,
            Target::StartDate => &mut self.start_date,
            Target::EndDate => &mut self.end_date,
            Target::Shiny => &mut self.shiny,
            Target::OtName => &mut self.ot_name,
            Target::TrainerId => &mut self.trainer_id,
            Target::MetLocation => &mut self.met_location,
            Target::Ball => &mut self.ball,
            Target::Level => &mut self.level,
            Target::Ability => &mut self.ability,
            Target::Nature => &mut self.nature,
            Target::Gender => &mut self.gender,
            Target::HeldItem => &mut self.held_item,
            Target::OtherInfo => &mut self.other_info,
            Target::Move(_) => {
                self.moves.push(value.to_string());
                return;
            }
            Target::Ribbon(_) => {
                self.ribbons.push(value.to_string());
                return;
            }
            // Read from the generation table once the generation is known.
            Target::Variant => return,
        };
        *slot = match target {
            Target::DexNo
            | Target::Generation
            | Target::Level
            | Target::StartDate
            | Target::EndDate => value.trim().to_string(),
            _ => value.to_string(),
        };
    }
}
