//! Notification dispatch.
//!
//! The [`Dispatcher`] turns one [`Notification`] into one call per
//! registered backend:
//!
//! ```text
//! Received → Classified ─┬─ Remove ──────────────────────────► remove(id) on every backend
//!                        └─ Update → fetch per content kind ─┬► update(id, bytes)
//!                                                            └► skipped (retrieval failed)
//! ```
//!
//! # Isolation
//!
//! - Retrieval happens once per distinct [`Representation`] and its outcome
//!   is shared by every backend that needs it. A failed retrieval is not
//!   repeated within the pass and skips only those backends.
//! - Every backend call runs on its own tokio task inside a span naming the
//!   backend, bounded by `dispatch.backend_timeout_secs`. Its outcome is
//!   logged by the task itself, whether or not anyone awaits it.
//! - [`Dispatcher::handle`] returns as soon as every backend has been
//!   invoked. The returned [`Dispatch`] can be dropped (fire and forget) or
//!   [drained](Dispatch::drain) for end-to-end confirmation.
//!
//! The dispatcher holds no per-notification state between calls, so a host
//! may call `handle` concurrently for independent notifications.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use repo_indexer_core::backend::{BackendRegistry, BackendResponse, IndexBackend};
use repo_indexer_core::error::{BackendError, RetrievalError};
use repo_indexer_core::models::{ContentKind, EventKind, Notification, Representation};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::retriever::Repository;

/// Handle onto one in-flight backend call.
pub type BackendHandle = JoinHandle<Result<BackendResponse, BackendError>>;

/// Routes notifications to every registered backend.
pub struct Dispatcher {
    repository: Repository,
    backends: BackendRegistry,
    backend_timeout: Duration,
}

impl Dispatcher {
    pub fn new(repository: Repository, backends: BackendRegistry, backend_timeout: Duration) -> Self {
        Self {
            repository,
            backends,
            backend_timeout,
        }
    }

    pub fn backends(&self) -> &BackendRegistry {
        &self.backends
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Invoke every backend for `notification`.
    ///
    /// Never fails: retrieval and backend errors are logged and recorded in
    /// the returned [`Dispatch`]. Once this returns, the notification may be
    /// acknowledged to its source.
    #[instrument(
        name = "notification",
        skip_all,
        fields(
            delivery = %Uuid::new_v4(),
            resource = %notification.resource_id(),
            event = %notification.event_kind(),
        )
    )]
    pub async fn handle(&self, notification: &Notification) -> Dispatch {
        let resource_id = notification.resource_id();
        debug!(
            url = %self.repository.resource_url(resource_id),
            backends = self.backends.len(),
            "classified"
        );

        let backends = match notification.event_kind() {
            EventKind::Remove => self.dispatch_removal(resource_id),
            EventKind::Update => self.dispatch_update(resource_id).await,
        };

        Dispatch {
            resource_id: resource_id.to_string(),
            event: notification.event_kind(),
            backends,
        }
    }

    fn dispatch_removal(&self, resource_id: &str) -> Vec<BackendDispatch> {
        self.backends
            .backends()
            .iter()
            .map(|backend| BackendDispatch {
                backend: backend.name().to_string(),
                kind: backend.content_kind(),
                outcome: DispatchOutcome::Submitted(self.spawn_remove(backend, resource_id)),
            })
            .collect()
    }

    async fn dispatch_update(&self, resource_id: &str) -> Vec<BackendDispatch> {
        // One fetch per representation, success or failure, reused by every
        // backend of that kind in this pass.
        let mut fetched: HashMap<Representation, Result<Arc<[u8]>, RetrievalError>> =
            HashMap::new();
        let mut dispatched = Vec::with_capacity(self.backends.len());

        for backend in self.backends.backends() {
            let kind = backend.content_kind();
            let content = match kind {
                ContentKind::Rdf => {
                    self.fetch_shared(&mut fetched, resource_id, Representation::Rdf)
                        .await
                }
                ContentKind::NamedFields => {
                    self.fetch_shared(&mut fetched, resource_id, Representation::NamedFields)
                        .await
                }
                ContentKind::None => Ok(Arc::from(resource_id.as_bytes())),
            };

            let outcome = match content {
                Ok(content) => {
                    DispatchOutcome::Submitted(self.spawn_update(backend, resource_id, content))
                }
                Err(err) => {
                    log_skip(backend.name(), resource_id, &err);
                    DispatchOutcome::Skipped(err)
                }
            };
            dispatched.push(BackendDispatch {
                backend: backend.name().to_string(),
                kind,
                outcome,
            });
        }

        dispatched
    }

    async fn fetch_shared(
        &self,
        fetched: &mut HashMap<Representation, Result<Arc<[u8]>, RetrievalError>>,
        resource_id: &str,
        representation: Representation,
    ) -> Result<Arc<[u8]>, RetrievalError> {
        if let Some(outcome) = fetched.get(&representation) {
            debug!(%representation, "reusing retrieval outcome");
            return outcome.clone();
        }
        let outcome = self
            .repository
            .retriever(resource_id, representation)
            .fetch()
            .await
            .map(|result| result.shared_content());
        fetched.insert(representation, outcome.clone());
        outcome
    }

    fn spawn_update(
        &self,
        backend: &Arc<dyn IndexBackend>,
        resource_id: &str,
        content: Arc<[u8]>,
    ) -> BackendHandle {
        let backend = Arc::clone(backend);
        let resource_id = resource_id.to_string();
        let timeout = self.backend_timeout;
        let span = info_span!("backend", name = %backend.name(), op = "update");

        tokio::spawn(
            async move {
                debug!(bytes = content.len(), "submitting update");
                let outcome = bounded(timeout, backend.update(&resource_id, &content)).await;
                log_outcome(&resource_id, &outcome);
                outcome
            }
            .instrument(span),
        )
    }

    fn spawn_remove(&self, backend: &Arc<dyn IndexBackend>, resource_id: &str) -> BackendHandle {
        let backend = Arc::clone(backend);
        let resource_id = resource_id.to_string();
        let timeout = self.backend_timeout;
        let span = info_span!("backend", name = %backend.name(), op = "remove");

        tokio::spawn(
            async move {
                debug!("submitting removal");
                let outcome = bounded(timeout, backend.remove(&resource_id)).await;
                log_outcome(&resource_id, &outcome);
                outcome
            }
            .instrument(span),
        )
    }
}

async fn bounded<F>(timeout: Duration, call: F) -> Result<BackendResponse, BackendError>
where
    F: std::future::Future<Output = Result<BackendResponse, BackendError>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or_else(|_| Err(BackendError::Timeout(timeout)))
}

fn log_skip(backend: &str, resource_id: &str, err: &RetrievalError) {
    match err {
        RetrievalError::NotTransformable { .. } => info!(
            backend,
            resource = resource_id,
            "resource has no indexing transformation; not updating this backend"
        ),
        RetrievalError::Transport { status, .. } => error!(
            backend,
            resource = resource_id,
            status = ?status,
            error = %err,
            "could not retrieve content for update; backend skipped"
        ),
        RetrievalError::InvalidRdf { .. } => error!(
            backend,
            resource = resource_id,
            error = %err,
            "could not read RDF description; backend skipped"
        ),
    }
}

fn log_outcome(resource_id: &str, outcome: &Result<BackendResponse, BackendError>) {
    match outcome {
        Ok(response) => info!(
            resource = resource_id,
            status = response.status,
            detail = response.detail.as_deref().unwrap_or(""),
            "backend accepted"
        ),
        Err(BackendError::Timeout(after)) => {
            warn!(resource = resource_id, after = ?after, "backend timed out")
        }
        Err(err) => error!(resource = resource_id, error = %err, "backend write failed"),
    }
}

/// What happened to one backend for one notification.
pub enum DispatchOutcome {
    /// The call was issued; the handle resolves to the backend's answer.
    Submitted(BackendHandle),
    /// Content retrieval failed, so the backend was not called.
    Skipped(RetrievalError),
}

pub struct BackendDispatch {
    pub backend: String,
    pub kind: ContentKind,
    pub outcome: DispatchOutcome,
}

/// Result of [`Dispatcher::handle`]: every backend invoked or skipped.
pub struct Dispatch {
    resource_id: String,
    event: EventKind,
    backends: Vec<BackendDispatch>,
}

impl Dispatch {
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn event(&self) -> EventKind {
        self.event
    }

    pub fn backends(&self) -> &[BackendDispatch] {
        &self.backends
    }

    /// Report of what was issued, without waiting for any backend.
    pub fn report(&self) -> DispatchReport {
        let backends = self
            .backends
            .iter()
            .map(|b| BackendReport {
                backend: b.backend.clone(),
                kind: b.kind,
                status: match &b.outcome {
                    DispatchOutcome::Submitted(_) => BackendStatus::Submitted,
                    DispatchOutcome::Skipped(err) => BackendStatus::Skipped {
                        reason: err.to_string(),
                    },
                },
            })
            .collect();
        DispatchReport {
            resource: self.resource_id.clone(),
            event: self.event,
            backends,
        }
    }

    /// Wait for every submitted backend call and report the outcomes.
    pub async fn drain(self) -> DispatchReport {
        let mut backends = Vec::with_capacity(self.backends.len());
        for b in self.backends {
            let status = match b.outcome {
                DispatchOutcome::Skipped(err) => BackendStatus::Skipped {
                    reason: err.to_string(),
                },
                DispatchOutcome::Submitted(handle) => match handle.await {
                    Ok(Ok(response)) => BackendStatus::Succeeded {
                        status: response.status,
                    },
                    Ok(Err(err)) => BackendStatus::Failed {
                        reason: err.to_string(),
                    },
                    Err(join_err) => BackendStatus::Failed {
                        reason: format!("backend task aborted: {}", join_err),
                    },
                },
            };
            backends.push(BackendReport {
                backend: b.backend,
                kind: b.kind,
                status,
            });
        }
        DispatchReport {
            resource: self.resource_id,
            event: self.event,
            backends,
        }
    }
}

/// Serializable summary of a dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub resource: String,
    pub event: EventKind,
    pub backends: Vec<BackendReport>,
}

impl DispatchReport {
    pub fn status_of(&self, backend: &str) -> Option<&BackendStatus> {
        self.backends
            .iter()
            .find(|b| b.backend == backend)
            .map(|b| &b.status)
    }

    pub fn count(&self, pred: impl Fn(&BackendStatus) -> bool) -> usize {
        self.backends.iter().filter(|b| pred(&b.status)).count()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendReport {
    pub backend: String,
    pub kind: ContentKind,
    #[serde(flatten)]
    pub status: BackendStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BackendStatus {
    Submitted,
    Succeeded { status: i64 },
    Failed { reason: String },
    Skipped { reason: String },
}

impl BackendStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BackendStatus::Submitted => "submitted",
            BackendStatus::Succeeded { .. } => "succeeded",
            BackendStatus::Failed { .. } => "failed",
            BackendStatus::Skipped { .. } => "skipped",
        }
    }
}
