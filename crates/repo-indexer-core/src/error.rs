//! Error taxonomy for notification handling.
//!
//! Each type is scoped to the work it can spoil: a [`NotificationError`]
//! fails one notification, a [`RetrievalError`] skips the backends that
//! needed that content, a [`BackendError`] belongs to one backend call.

use std::time::Duration;

use thiserror::Error;

/// A notification that cannot be turned into a [`Notification`](crate::models::Notification).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification is missing the '{0}' header")]
    MissingHeader(String),

    #[error("notification header '{0}' is empty")]
    EmptyHeader(String),
}

/// Failure to produce a representation of a resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    /// Network fault, timeout, or a non-success HTTP status.
    #[error("GET {url} failed: {reason}")]
    Transport {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// The resource declares no indexing transformation, so it has no
    /// named-fields view. Expected for many resources.
    #[error("{url} declares no indexing transformation")]
    NotTransformable { url: String },

    /// The description came back but could not be read as RDF.
    #[error("could not read RDF description of {url}: {reason}")]
    InvalidRdf { url: String, reason: String },
}

impl RetrievalError {
    /// True for the expected "nothing to index in this form" outcome.
    pub fn is_expected(&self) -> bool {
        matches!(self, RetrievalError::NotTransformable { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            RetrievalError::Transport { url, .. }
            | RetrievalError::NotTransformable { url }
            | RetrievalError::InvalidRdf { url, .. } => url,
        }
    }
}

/// A backend refused or failed to apply an update or removal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The content could not be turned into the backend's document shape.
    #[error("could not parse content for {resource_id}: {reason}")]
    Parse { resource_id: String, reason: String },

    /// The backend answered with a non-success status.
    #[error("backend rejected the write (status {status}): {message}")]
    Rejected { status: i64, message: String },

    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Transport(String),

    /// Local storage failure inside an embedded backend.
    #[error("storage error: {0}")]
    Storage(String),

    #[error("backend call timed out after {0:?}")]
    Timeout(Duration),
}
