//! In-memory backend for tests and offline runs.

use super::{BackendId, SearchBackend, SearchCandidate, SearchQuery};
use crate::error::BackendError;
use async_trait::async_trait;
use std::time::Duration;

/// Backend that always answers with a fixed result (or a fixed failure).
///
/// Do not use against real traffic: it ignores the query entirely.
#[derive(Debug, Clone)]
pub struct StaticBackend {
    id: BackendId,
    response: Result<Vec<SearchCandidate>, String>,
    delay: Option<Duration>,
}

impl StaticBackend {
    /// Backend returning `results` for every query
    pub fn with_results(id: impl Into<String>, results: Vec<SearchCandidate>) -> Self {
        Self {
            id: BackendId::new(id),
            response: Ok(results),
            delay: None,
        }
    }

    /// Backend returning no results
    pub fn empty(id: impl Into<String>) -> Self {
        Self::with_results(id, Vec::new())
    }

    /// Backend that fails every query with `reason`
    pub fn failing(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: BackendId::new(id),
            response: Err(reason.into()),
            delay: None,
        }
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl SearchBackend for StaticBackend {
    fn id(&self) -> BackendId {
        self.id.clone()
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<SearchCandidate>, BackendError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.response {
            Ok(results) => Ok(results.clone()),
            Err(reason) => Err(BackendError::Failed {
                backend: self.id.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}
