use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Server rejected submission: {0}")]
    Server(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("A submission is already in progress")]
    InProgress,
}

impl Error {
    /// Whether the submission client should try again after this error.
    ///
    /// Only failures where the endpoint never produced a readable verdict are
    /// retried. A `success: false` answer is deterministic and surfaces at once.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Http(_))
    }

    /// A message fit for the person who filled in the form.
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation(v) => format!("Please fill in the required fields ({v})"),
            Error::Server(msg) => msg.clone(),
            Error::Transport(msg) => format!("Could not reach the server: {msg}"),
            Error::Http(e) => format!("Could not reach the server: {e}"),
            Error::InProgress => "A submission is already in progress".to_string(),
            other => format!("An error occurred: {other}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// Form fields that failed normalization, identified by their UI field id.
///
/// Both lists follow the order of the normalizer's field table, so a UI can
/// highlight them top to bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub missing: Vec<&'static str>,
    pub malformed: Vec<&'static str>,
}

impl ValidationError {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.malformed.is_empty()
    }

    /// Every offending field id, missing ones first.
    pub fn fields(&self) -> Vec<&'static str> {
        self.missing
            .iter()
            .chain(self.malformed.iter())
            .copied()
            .collect()
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing: {}", self.missing.join(", ")));
        }
        if !self.malformed.is_empty() {
            parts.push(format!("malformed: {}", self.malformed.join(", ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// SideEffectError
// ---------------------------------------------------------------------------

/// A failure in the ingestion endpoint's best-effort logging.
///
/// Never returned from ingestion; only handed to an
/// [`ErrorSink`](crate::ingest::ErrorSink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffectError {
    /// Which step failed (`"primary"`, `"analytics"`, `"activity"`).
    pub stage: &'static str,
    pub message: String,
    /// Debug rendering of the underlying error, when there is one.
    pub detail: Option<String>,
}

impl SideEffectError {
    pub fn new(stage: &'static str, error: &Error) -> Self {
        Self {
            stage,
            message: error.to_string(),
            detail: Some(format!("{error:?}")),
        }
    }
}

impl fmt::Display for SideEffectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} step failed: {}", self.stage, self.message)
    }
}
