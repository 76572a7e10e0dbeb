use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Name
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub ja: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub en: String,
}

// ---------------------------------------------------------------------------
// Distribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub method: String,
    pub location: String,
    pub start_date: String,
    /// Empty means the distribution is open-ended.
    #[serde(default)]
    pub end_date: String,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Canonical form data for one submission.
///
/// Records are built by [`FormNormalizer`](crate::normalize::FormNormalizer)
/// and are read-only afterwards: the catalog number is already padded, move
/// and ribbon lists hold no blanks, and generation-specific flags are present
/// only for the generations that define them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub(crate) id: String,
    pub(crate) name: Name,
    pub(crate) dex_no: String,
    pub(crate) generation: u32,
    pub(crate) game: String,
    pub(crate) version: String,
    pub(crate) event_name: String,
    pub(crate) distribution: Distribution,
    #[serde(default)]
    pub(crate) shiny: String,
    #[serde(default)]
    pub(crate) ot_name: String,
    #[serde(default)]
    pub(crate) trainer_id: String,
    #[serde(default)]
    pub(crate) met_location: String,
    #[serde(default)]
    pub(crate) ball: String,
    pub(crate) level: u32,
    #[serde(default)]
    pub(crate) ability: String,
    #[serde(default)]
    pub(crate) nature: String,
    #[serde(default)]
    pub(crate) gender: String,
    #[serde(flatten)]
    pub(crate) variant_flags: BTreeMap<String, String>,
    #[serde(default)]
    pub(crate) held_item: String,
    #[serde(default)]
    pub(crate) moves: Vec<String>,
    #[serde(default)]
    pub(crate) ribbons: Vec<String>,
    #[serde(default)]
    pub(crate) other_info: String,
    pub(crate) timestamp: String,
}

impl Record {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The 4-digit zero-padded catalog (dex) number.
    pub fn dex_no(&self) -> &str {
        &self.dex_no
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn game(&self) -> &str {
        &self.game
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn distribution(&self) -> &Distribution {
        &self.distribution
    }

    pub fn shiny(&self) -> &str {
        &self.shiny
    }

    pub fn ot_name(&self) -> &str {
        &self.ot_name
    }

    pub fn trainer_id(&self) -> &str {
        &self.trainer_id
    }

    pub fn met_location(&self) -> &str {
        &self.met_location
    }

    pub fn ball(&self) -> &str {
        &self.ball
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn ability(&self) -> &str {
        &self.ability
    }

    pub fn nature(&self) -> &str {
        &self.nature
    }

    pub fn gender(&self) -> &str {
        &self.gender
    }

    /// Generation-specific flags keyed by form field id (e.g. `terastallize`).
    pub fn variant_flags(&self) -> &BTreeMap<String, String> {
        &self.variant_flags
    }

    pub fn held_item(&self) -> &str {
        &self.held_item
    }

    pub fn moves(&self) -> &[String] {
        &self.moves
    }

    pub fn ribbons(&self) -> &[String] {
        &self.ribbons
    }

    pub fn other_info(&self) -> &str {
        &self.other_info
    }

    /// RFC 3339 instant assigned when the form was normalized.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Indented JSON, as shown in the form's preview pane.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
