use std::sync::Arc;

use crate::ingest::Ingestor;
use crate::store::SheetStore;

/// Shared application state available to all route handlers via Axum's
/// `State` extractor.
pub struct AppState<S: SheetStore> {
    /// Ingestion runs on the blocking pool; the ingestor serializes store
    /// access internally.
    pub ingestor: Arc<Ingestor<S>>,
}

impl<S: SheetStore> AppState<S> {
    pub fn new(ingestor: Ingestor<S>) -> Self {
        Self {
            ingestor: Arc::new(ingestor),
        }
    }
}
