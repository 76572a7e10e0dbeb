//! Async wrapper around [`SubmissionClient`] for use in async runtimes (Tokio, etc.).
//!
//! Runs every call on the blocking thread pool via
//! [`tokio::task::spawn_blocking`], keeping the async event loop free while
//! the blocking client sleeps between retries.
//!
//! # Example
//!
//! ```no_run
//! use distribution_records::{AsyncSubmissionClient, FormNormalizer, RawForm};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = AsyncSubmissionClient::builder().build().await.unwrap();
//!     let form = RawForm::new()
//!         .with("id", "001")
//!         .with("name-ja", "ピカチュウ")
//!         .with("dex-no", "25")
//!         .with("game", "赤")
//!         .with("start-date", "2024-01-01");
//!     let record = FormNormalizer::new().normalize(&form).unwrap();
//!     let reply = client.submit(record).await.unwrap();
//!     println!("{}", reply.message);
//! }
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::client::{HttpTransport, RecordPage, SubmissionClient, SubmissionClientBuilder, Transport};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::{Confirmation, Record};

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::InvalidArgument(format!("Task join error: {e}"))
}

// ---------------------------------------------------------------------------
// AsyncSubmissionClientBuilder
// ---------------------------------------------------------------------------

/// Builder for an [`AsyncSubmissionClient`]; wraps the blocking builder.
#[derive(Default)]
pub struct AsyncSubmissionClientBuilder {
    inner: SubmissionClientBuilder,
}

impl AsyncSubmissionClientBuilder {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            inner: SubmissionClientBuilder::from_config(config),
        }
    }

    /// Adjust the underlying blocking builder.
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(SubmissionClientBuilder) -> SubmissionClientBuilder,
    {
        self.inner = f(self.inner);
        self
    }

    /// Build the HTTP client on the blocking pool.
    ///
    /// `reqwest`'s blocking client must not be created inside an async
    /// context, so construction is moved off the event loop as well.
    pub async fn build(self) -> Result<AsyncSubmissionClient> {
        let inner = self.inner;
        let client = tokio::task::spawn_blocking(move || inner.build())
            .await
            .map_err(join_error)??;
        Ok(AsyncSubmissionClient::from_blocking(client))
    }

    pub fn build_with_transport<T: Transport + 'static>(
        self,
        transport: T,
    ) -> Result<AsyncSubmissionClient<T>> {
        let client = self.inner.build_with_transport(transport)?;
        Ok(AsyncSubmissionClient::from_blocking(client))
    }
}

// ---------------------------------------------------------------------------
// AsyncSubmissionClient
// ---------------------------------------------------------------------------

/// Async wrapper around [`SubmissionClient`].
///
/// The blocking client holds no mutable state, so it is shared through an
/// [`Arc`] and concurrent submissions proceed independently.
pub struct AsyncSubmissionClient<T: Transport + 'static = HttpTransport> {
    inner: Arc<SubmissionClient<T>>,
}

impl<T: Transport + 'static> Clone for AsyncSubmissionClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl AsyncSubmissionClient<HttpTransport> {
    pub fn builder() -> AsyncSubmissionClientBuilder {
        AsyncSubmissionClientBuilder::default()
    }
}

impl<T: Transport + 'static> AsyncSubmissionClient<T> {
    pub fn from_blocking(client: SubmissionClient<T>) -> Self {
        Self {
            inner: Arc::new(client),
        }
    }

    /// Run a blocking client operation on the blocking thread pool.
    pub async fn run<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&SubmissionClient<T>) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let client = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&client))
            .await
            .map_err(join_error)?
    }

    pub async fn submit(&self, record: Record) -> Result<Confirmation> {
        self.run(move |c| c.submit(&record)).await
    }

    pub async fn submit_value(&self, value: Value) -> Result<Confirmation> {
        self.run(move |c| c.submit_value(&value)).await
    }

    pub async fn health(&self) -> Result<Value> {
        self.run(|c| c.health()).await
    }

    pub async fn list_records(&self, limit: usize, offset: usize) -> Result<RecordPage> {
        self.run(move |c| c.list_records(limit, offset)).await
    }

    pub async fn get_record(&self, id: &str) -> Result<Option<Value>> {
        let id = id.to_string();
        self.run(move |c| c.get_record(&id)).await
    }
}
