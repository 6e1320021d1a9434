//! In-memory [`IndexBackend`] for tests and embedding hosts.
//!
//! Stores raw content per resource behind `std::sync::RwLock` and keeps a
//! log of every call, so callers can assert exactly what a dispatcher did.
//! Can be switched into a failing mode to exercise error isolation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use tracing::debug;

use super::{BackendResponse, IndexBackend};
use crate::error::BackendError;
use crate::models::ContentKind;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Update { resource_id: String, content: Vec<u8> },
    Remove { resource_id: String },
}

/// In-memory index keyed by resource identifier.
pub struct InMemoryBackend {
    name: String,
    kind: ContentKind,
    documents: RwLock<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<BackendCall>>,
    failing: AtomicBool,
}

impl InMemoryBackend {
    pub fn new(name: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            name: name.into(),
            kind,
            documents: RwLock::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with [`BackendError::Rejected`].
    /// Calls are still recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Content currently stored for `resource_id`.
    pub fn get(&self, resource_id: &str) -> Option<Vec<u8>> {
        self.documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(resource_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.documents.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn update_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Update { .. }))
            .count()
    }

    pub fn remove_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Remove { .. }))
            .count()
    }

    fn record(&self, call: BackendCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    fn check_failing(&self) -> Result<(), BackendError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BackendError::Rejected {
                status: 1,
                message: format!("{} is configured to fail", self.name),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl IndexBackend for InMemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_kind(&self) -> ContentKind {
        self.kind
    }

    async fn update(
        &self,
        resource_id: &str,
        content: &[u8],
    ) -> Result<BackendResponse, BackendError> {
        self.record(BackendCall::Update {
            resource_id: resource_id.to_string(),
            content: content.to_vec(),
        });
        self.check_failing()?;

        let mut docs = self
            .documents
            .write()
            .map_err(|_| BackendError::Storage("document map lock poisoned".to_string()))?;
        docs.insert(resource_id.to_string(), content.to_vec());
        debug!(backend = %self.name, resource = resource_id, bytes = content.len(), "stored");
        Ok(BackendResponse::ok())
    }

    async fn remove(&self, resource_id: &str) -> Result<BackendResponse, BackendError> {
        self.record(BackendCall::Remove {
            resource_id: resource_id.to_string(),
        });
        self.check_failing()?;

        let mut docs = self
            .documents
            .write()
            .map_err(|_| BackendError::Storage("document map lock poisoned".to_string()))?;
        let existed = docs.remove(resource_id).is_some();
        debug!(backend = %self.name, resource = resource_id, existed, "removed");
        Ok(BackendResponse::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_update_then_remove() {
        let backend = InMemoryBackend::new("memory", ContentKind::NamedFields);
        backend.update("obj1", b"{\"title\":\"X\"}").await.unwrap();
        assert_eq!(backend.get("obj1").unwrap(), b"{\"title\":\"X\"}".to_vec());

        backend.remove("obj1").await.unwrap();
        assert!(backend.get("obj1").is_none());
        assert_eq!(backend.update_count(), 1);
        assert_eq!(backend.remove_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_backend_records_but_rejects() {
        let backend = InMemoryBackend::new("memory", ContentKind::Rdf);
        backend.set_failing(true);

        let err = backend.update("obj1", b"<rdf/>").await.unwrap_err();
        assert!(matches!(err, BackendError::Rejected { .. }));
        assert!(backend.is_empty());
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let backend = InMemoryBackend::new("memory", ContentKind::None);
        let resp = backend.remove("never-stored").await.unwrap();
        assert!(resp.is_success());
    }
}
