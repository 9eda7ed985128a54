//! Concurrent backend fan-out with per-backend failure isolation.

use super::{BackendId, BackendRunResult, BackendStatus, DiscoveryRank, SearchBackend, SearchCandidate, SearchQuery};
use crate::error::BackendError;
use crate::events::{null_sender, Event, EventSender, SearchEvent};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything the backends produced for one query
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub candidates: Vec<SearchCandidate>,
    pub run_results: Vec<BackendRunResult>,
}

impl SearchOutcome {
    /// Number of backends that did not succeed
    pub fn failed_backends(&self) -> usize {
        self.run_results
            .iter()
            .filter(|r| r.status != BackendStatus::Success)
            .count()
    }
}

/// Queries every selected backend concurrently.
///
/// No retries: each backend gets exactly one attempt per request.
pub struct BackendOrchestrator {
    backends: Vec<Arc<dyn SearchBackend>>,
    per_backend_timeout: Duration,
}

impl BackendOrchestrator {
    pub fn new(backends: Vec<Arc<dyn SearchBackend>>, per_backend_timeout: Duration) -> Self {
        Self {
            backends,
            per_backend_timeout,
        }
    }

    /// Identifiers of all configured backends, in configured order
    pub fn backend_ids(&self) -> Vec<BackendId> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    pub fn per_backend_timeout(&self) -> Duration {
        self.per_backend_timeout
    }

    /// Search without progress events
    pub async fn search(
        &self,
        query: Arc<SearchQuery>,
        selection: Option<&HashSet<BackendId>>,
    ) -> SearchOutcome {
        self.search_with_events(query, selection, &null_sender()).await
    }

    /// Search all selected backends (all of them when `selection` is `None`).
    ///
    /// Never fails: a backend error, timeout or panic becomes an empty
    /// contribution plus a non-success [`BackendRunResult`].
    pub async fn search_with_events(
        &self,
        query: Arc<SearchQuery>,
        selection: Option<&HashSet<BackendId>>,
        events: &EventSender,
    ) -> SearchOutcome {
        self.search_within(query, selection, self.per_backend_timeout, events)
            .await
    }

    /// Like [`search_with_events`](Self::search_with_events), but no backend
    /// gets longer than `budget`, even when its own timeout is larger.
    pub async fn search_within(
        &self,
        query: Arc<SearchQuery>,
        selection: Option<&HashSet<BackendId>>,
        budget: Duration,
        events: &EventSender,
    ) -> SearchOutcome {
        if let Some(selection) = selection {
            let known: HashSet<BackendId> = self.backend_ids().into_iter().collect();
            for unknown in selection.iter().filter(|id| !known.contains(*id)) {
                warn!(backend = %unknown, "Ignoring unknown backend in selection");
            }
        }

        let selected: Vec<(usize, Arc<dyn SearchBackend>)> = self
            .backends
            .iter()
            .enumerate()
            .filter(|(_, backend)| selection.map_or(true, |s| s.contains(&backend.id())))
            .map(|(index, backend)| (index, Arc::clone(backend)))
            .collect();

        events.send(Event::Search(SearchEvent::Started {
            backends: selected.iter().map(|(_, b)| b.id()).collect(),
        }));

        let started = Instant::now();
        let timeout = self.per_backend_timeout.min(budget);
        let handles: Vec<_> = selected
            .into_iter()
            .map(|(index, backend)| {
                let id = backend.id();
                let query = Arc::clone(&query);
                let handle = tokio::spawn(async move {
                    let start = Instant::now();
                    let result = tokio::time::timeout(timeout, backend.search(&query)).await;
                    (result, start.elapsed())
                });
                (index, id, handle)
            })
            .collect();

        let mut outcome = SearchOutcome::default();

        // Awaited in configured order; the tasks themselves run concurrently
        for (index, id, handle) in handles {
            let (found, status, elapsed, error) = match handle.await {
                Ok((Ok(Ok(found)), elapsed)) => (found, BackendStatus::Success, elapsed, None),
                Ok((Ok(Err(e)), elapsed)) => {
                    warn!(backend = %id, error = %e, "Backend failed");
                    (Vec::new(), BackendStatus::Failed, elapsed, Some(e.to_string()))
                }
                Ok((Err(_), elapsed)) => {
                    let e = BackendError::Timeout {
                        backend: id.to_string(),
                        timeout,
                    };
                    warn!(backend = %id, error = %e, "Backend timed out");
                    (Vec::new(), BackendStatus::Timeout, elapsed, Some(e.to_string()))
                }
                Err(join_error) => {
                    let e = BackendError::Failed {
                        backend: id.to_string(),
                        reason: format!("task aborted: {}", join_error),
                    };
                    warn!(backend = %id, error = %e, "Backend task did not complete");
                    (Vec::new(), BackendStatus::Failed, started.elapsed(), Some(e.to_string()))
                }
            };

            let before = outcome.candidates.len();
            outcome.candidates.extend(
                found
                    .into_iter()
                    .filter_map(SearchCandidate::sanitized)
                    .enumerate()
                    .map(|(position, mut candidate)| {
                        candidate.backend = id.clone();
                        candidate.discovery_rank = DiscoveryRank {
                            backend_index: index as u32,
                            position: position as u32,
                        };
                        candidate
                    }),
            );
            let result_count = outcome.candidates.len() - before;

            debug!(
                backend = %id,
                status = ?status,
                result_count,
                elapsed_ms = elapsed.as_millis() as u64,
                "Backend finished"
            );

            let run = BackendRunResult {
                backend: id,
                status,
                result_count,
                elapsed_ms: elapsed.as_millis() as u64,
                error,
            };
            events.send(Event::Search(SearchEvent::BackendCompleted(run.clone())));
            outcome.run_results.push(run);
        }

        info!(
            candidates = outcome.candidates.len(),
            failed_backends = outcome.failed_backends(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Backend fan-out complete"
        );

        events.send(Event::Search(SearchEvent::Completed {
            total_candidates: outcome.candidates.len(),
            failed_backends: outcome.failed_backends(),
        }));

        outcome
    }
}
