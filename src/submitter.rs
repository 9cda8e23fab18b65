use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::research_service::{QueryResponse, RequestFailed, ResearchBackend};

/// Everything the front end renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub query: String,
    pub rag_result: String,
    pub agent_result: String,
    pub loading: bool,
}

/// Result of one `submit` call.
#[derive(Debug)]
pub struct Submission {
    pub id: u64,
    /// False when a newer submit was issued before this one resolved.
    pub applied: bool,
    pub outcome: Result<QueryResponse, RequestFailed>,
}

impl Submission {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Owns the query text and the two answer fields, and drives one backend
/// round trip per submit.
///
/// Overlapping submits are allowed. Only the most recently issued request
/// writes its answer; `loading` stays true while any request is outstanding.
pub struct QuerySubmitter {
    backend: Arc<dyn ResearchBackend>,
    error_placeholder: String,
    view: watch::Sender<ViewState>,
    latest_id: AtomicU64,
    pending: AtomicUsize,
}

impl QuerySubmitter {
    pub fn new(backend: Arc<dyn ResearchBackend>, error_placeholder: impl Into<String>) -> Self {
        let (view, _) = watch::channel(ViewState::default());
        Self {
            backend,
            error_placeholder: error_placeholder.into(),
            view,
            latest_id: AtomicU64::new(0),
            pending: AtomicUsize::new(0),
        }
    }

    pub fn state(&self) -> ViewState {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }

    pub fn set_query(&self, text: impl Into<String>) {
        let text = text.into();
        self.view.send_if_modified(|state| {
            if state.query == text {
                return false;
            }
            state.query = text;
            true
        });
    }

    pub async fn submit_current(&self) -> Submission {
        let query = self.view.borrow().query.clone();
        self.submit(&query).await
    }

    pub async fn submit(&self, query: &str) -> Submission {
        let pending = self.begin();
        debug!("Issued request #{} ({} chars)", pending.id, query.len());

        let outcome = self.backend.query(query).await;
        if let Err(e) = &outcome {
            warn!("Request #{} failed: {}", pending.id, e);
        }

        let id = pending.id;
        let applied = pending.resolve(&outcome);
        if !applied {
            debug!("Discarded stale response for request #{}", id);
        }

        Submission { id, applied, outcome }
    }

    fn begin(&self) -> PendingRequest<'_> {
        let mut id = 0;
        self.view.send_modify(|state| {
            id = self.latest_id.fetch_add(1, Ordering::SeqCst) + 1;
            self.pending.fetch_add(1, Ordering::SeqCst);
            state.loading = true;
            state.rag_result.clear();
            state.agent_result.clear();
        });
        PendingRequest {
            submitter: self,
            id,
            done: false,
        }
    }

    /// Retire request `id`. Writes `outcome` only when `id` is still the
    /// latest issued request. Returns whether the outcome was written.
    fn finish(&self, id: u64, outcome: Option<&Result<QueryResponse, RequestFailed>>) -> bool {
        let mut applied = false;
        self.view.send_modify(|state| {
            let remaining = self.pending.fetch_sub(1, Ordering::SeqCst) - 1;
            state.loading = remaining > 0;

            let Some(outcome) = outcome else { return };
            if id != self.latest_id.load(Ordering::SeqCst) {
                return;
            }
            match outcome {
                Ok(response) => {
                    state.rag_result = response.rag.clone();
                    state.agent_result = response.agent.clone();
                }
                Err(_) => {
                    state.rag_result = self.error_placeholder.clone();
                    state.agent_result.clear();
                }
            }
            applied = true;
        });
        applied
    }
}

/// Keeps `loading` honest when a submit future is dropped mid-flight.
struct PendingRequest<'a> {
    submitter: &'a QuerySubmitter,
    id: u64,
    done: bool,
}

impl PendingRequest<'_> {
    fn resolve(mut self, outcome: &Result<QueryResponse, RequestFailed>) -> bool {
        self.done = true;
        self.submitter.finish(self.id, Some(outcome))
    }
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if !self.done {
            debug!("Request #{} dropped before resolving", self.id);
            self.submitter.finish(self.id, None);
        }
    }
}
