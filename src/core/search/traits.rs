//! Backend capability trait.

use super::{BackendId, SearchCandidate, SearchQuery};
use crate::error::BackendError;
use async_trait::async_trait;

/// A reverse image search backend.
///
/// One adapter per backend maps the backend's own payload into
/// [`SearchCandidate`]s. Implementations must be thread-safe (`Send + Sync`);
/// retries, if any, are the adapter's business. Timeouts are enforced by the
/// orchestrator.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Stable identifier used for selection and bookkeeping
    fn id(&self) -> BackendId;

    /// Look the query image up and return every hit
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchCandidate>, BackendError>;
}
