//! Form-submission pipeline for event distribution records.
//!
//! A form's raw field values are normalized into a typed [`Record`],
//! submitted to an ingestion endpoint with retry, and appended there as one
//! row of a spreadsheet-like store alongside analytics, activity, and error
//! logs. The outcome is shown through a [`FeedbackPresenter`].
//!
//! # Quick start
//!
//! ```no_run
//! use distribution_records::{Config, FormSubmitter, RawForm};
//!
//! let submitter = FormSubmitter::from_config(&Config::default()).unwrap();
//! let form = RawForm::new()
//!     .with("id", "001")
//!     .with("name-ja", "ピカチュウ")
//!     .with("dex-no", "25")
//!     .with("game", "赤")
//!     .with("start-date", "2024-01-01");
//!
//! let reply = submitter.submit_form(&form).unwrap();
//! assert!(reply.success);
//! ```

#[cfg(feature = "async")]
pub mod async_client;
pub mod client;
pub mod config;
pub mod error;
pub mod flatten;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod presenter;
pub mod schema;
#[cfg(feature = "server")]
pub mod server;
pub mod store;

#[cfg(feature = "async")]
pub use async_client::AsyncSubmissionClient;
pub use client::{HttpTransport, RetryPolicy, SubmissionClient, Transport};
pub use config::Config;
pub use error::{Error, Result, SideEffectError, ValidationError};
pub use ingest::Ingestor;
pub use models::{Confirmation, Record};
pub use normalize::{FormNormalizer, RawForm};
pub use presenter::{FeedbackPresenter, FeedbackState, SubmitGuard, Surface, TerminalSurface};
pub use schema::Schema;
pub use store::{DuckDbStore, MemoryStore, SheetStore};

/// Message shown while a submission is in flight.
pub const PENDING_MESSAGE: &str = "Submitting...";

// ---------------------------------------------------------------------------
// FormSubmitter
// ---------------------------------------------------------------------------

/// One form's submit button: normalize, submit, present.
///
/// A form that fails validation is reported on the surface and never reaches
/// the client. A second `submit_form` while one is in flight is refused.
pub struct FormSubmitter<T: Transport = HttpTransport, S: Surface = TerminalSurface> {
    normalizer: FormNormalizer,
    client: SubmissionClient<T>,
    presenter: FeedbackPresenter<S>,
    guard: SubmitGuard,
}

impl FormSubmitter<HttpTransport, TerminalSurface> {
    /// HTTP client and terminal feedback, configured from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = SubmissionClient::from_config(&config.client)?;
        let presenter = FeedbackPresenter::new(TerminalSurface, config.feedback.clone());
        Ok(Self::new(FormNormalizer::new(), client, presenter))
    }
}

impl<T: Transport, S: Surface> FormSubmitter<T, S> {
    pub fn new(
        normalizer: FormNormalizer,
        client: SubmissionClient<T>,
        presenter: FeedbackPresenter<S>,
    ) -> Self {
        Self {
            normalizer,
            client,
            presenter,
            guard: SubmitGuard::new(),
        }
    }

    pub fn normalizer(&self) -> &FormNormalizer {
        &self.normalizer
    }

    pub fn client(&self) -> &SubmissionClient<T> {
        &self.client
    }

    pub fn presenter(&self) -> &FeedbackPresenter<S> {
        &self.presenter
    }

    pub fn guard(&self) -> &SubmitGuard {
        &self.guard
    }

    /// Normalize `form` and submit the resulting record.
    pub fn submit_form(&self, form: &RawForm) -> Result<Confirmation> {
        let Some(_token) = self.guard.try_begin() else {
            let err = Error::InProgress;
            self.presenter.error(&err.user_message());
            return Err(err);
        };

        let record = match self.normalizer.normalize(form) {
            Ok(record) => record,
            Err(invalid) => {
                let err = Error::Validation(invalid);
                self.presenter.error(&err.user_message());
                return Err(err);
            }
        };

        self.presenter.pending(PENDING_MESSAGE);
        let outcome = self.client.submit(&record);
        self.presenter.present(&outcome);
        outcome
    }
}
