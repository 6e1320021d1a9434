//! Index backend abstraction.
//!
//! The [`IndexBackend`] trait is the only thing the dispatcher knows about
//! a search index, triple store, or any other sink: it declares which
//! [`ContentKind`] it needs, and accepts updates and removals keyed by
//! resource identifier. Backends are held as `Arc<dyn IndexBackend>` in a
//! [`BackendRegistry`] so each call can be moved onto its own task.
//!
//! Implementations must be `Send + Sync`; the same instance receives
//! concurrent calls from independent notifications and must not rely on
//! the caller for locking.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::BackendError;
use crate::models::ContentKind;

/// A backend's acknowledgement of a committed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendResponse {
    /// Backend-native status code. Zero means success.
    pub status: i64,
    /// Optional backend-supplied detail (timing, affected rows, ...).
    pub detail: Option<String>,
}

impl BackendResponse {
    pub fn ok() -> Self {
        Self {
            status: 0,
            detail: None,
        }
    }

    pub fn with_detail(detail: impl Into<String>) -> Self {
        Self {
            status: 0,
            detail: Some(detail.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }
}

/// An external index kept in sync with repository resources.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`name`](IndexBackend::name) | Label used in logs and reports |
/// | [`content_kind`](IndexBackend::content_kind) | Which representation updates need |
/// | [`update`](IndexBackend::update) | Write `content` under `resource_id`, then commit |
/// | [`remove`](IndexBackend::remove) | Delete `resource_id`, then commit |
///
/// Errors are returned, never panicked: a failing backend must not take
/// its task down with it.
#[async_trait]
pub trait IndexBackend: Send + Sync {
    /// Returns the configured instance name (e.g. `"solr:main"`).
    fn name(&self) -> &str;

    /// Returns which content the dispatcher must fetch before calling
    /// [`update`](IndexBackend::update).
    fn content_kind(&self) -> ContentKind;

    /// Parse `content` into the backend's document shape, attach
    /// `resource_id` as the unique key, submit and commit.
    async fn update(
        &self,
        resource_id: &str,
        content: &[u8],
    ) -> Result<BackendResponse, BackendError>;

    /// Delete the document keyed by `resource_id` and commit.
    async fn remove(&self, resource_id: &str) -> Result<BackendResponse, BackendError>;
}

/// Ordered set of configured backends.
///
/// Iteration order is registration order; the dispatcher gives no
/// ordering guarantee between backends beyond that.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn IndexBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    pub fn register(&mut self, backend: Arc<dyn IndexBackend>) {
        self.backends.push(backend);
    }

    pub fn backends(&self) -> &[Arc<dyn IndexBackend>] {
        &self.backends
    }

    pub fn find(&self, name: &str) -> Option<&Arc<dyn IndexBackend>> {
        self.backends.iter().find(|b| b.name() == name)
    }

    /// Distinct content kinds declared across all backends, sorted.
    pub fn content_kinds(&self) -> Vec<ContentKind> {
        let mut kinds: Vec<ContentKind> = self.backends.iter().map(|b| b.content_kind()).collect();
        kinds.sort();
        kinds.dedup();
        kinds
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.backends.iter().map(|b| (b.name(), b.content_kind())))
            .finish()
    }
}
