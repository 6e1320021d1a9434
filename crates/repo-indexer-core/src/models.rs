//! Data types that flow between the message source, the retrievers, and
//! the index backends.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// What a notification asks the indexers to do with a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The resource was created or changed; re-index its content.
    Update,
    /// The resource is gone; drop it from every index.
    Remove,
}

impl EventKind {
    pub fn is_removal(self) -> bool {
        matches!(self, EventKind::Remove)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Update => f.write_str("update"),
            EventKind::Remove => f.write_str("remove"),
        }
    }
}

/// One change event about one repository resource.
///
/// Built by a message-source adapter, consumed once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    resource_id: String,
    event_kind: EventKind,
}

impl Notification {
    pub fn new(resource_id: impl Into<String>, event_kind: EventKind) -> Self {
        Self {
            resource_id: resource_id.into(),
            event_kind,
        }
    }

    pub fn update(resource_id: impl Into<String>) -> Self {
        Self::new(resource_id, EventKind::Update)
    }

    pub fn remove(resource_id: impl Into<String>) -> Self {
        Self::new(resource_id, EventKind::Remove)
    }

    /// Repository-relative identifier of the resource (e.g. `"coll/obj1"`).
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn event_kind(&self) -> EventKind {
        self.event_kind
    }
}

/// A representation a retriever can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    /// The resource's full RDF description.
    Rdf,
    /// A flat projection of the resource produced by a server-side transform.
    NamedFields,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Representation::Rdf => f.write_str("rdf"),
            Representation::NamedFields => f.write_str("named_fields"),
        }
    }
}

/// The content an index backend declares it needs for updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Needs the RDF description.
    Rdf,
    /// Needs the named-fields projection.
    NamedFields,
    /// Needs no fetched content; updates carry the resource identifier.
    None,
}

impl ContentKind {
    /// The representation to retrieve for this kind, if any.
    pub fn representation(self) -> Option<Representation> {
        match self {
            ContentKind::Rdf => Some(Representation::Rdf),
            ContentKind::NamedFields => Some(Representation::NamedFields),
            ContentKind::None => None,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Rdf => f.write_str("rdf"),
            ContentKind::NamedFields => f.write_str("named_fields"),
            ContentKind::None => f.write_str("none"),
        }
    }
}

impl From<Representation> for ContentKind {
    fn from(value: Representation) -> Self {
        match value {
            Representation::Rdf => ContentKind::Rdf,
            Representation::NamedFields => ContentKind::NamedFields,
        }
    }
}

/// Bytes fetched for a resource, tagged with what they represent.
///
/// The content is shared, never copied or mutated after the fetch: every
/// clone points at the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievalResult {
    content: Arc<[u8]>,
    representation: Representation,
}

impl RetrievalResult {
    pub fn new(content: impl Into<Arc<[u8]>>, representation: Representation) -> Self {
        Self {
            content: content.into(),
            representation,
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// A cheap handle to the shared buffer, for moving into spawned tasks.
    pub fn shared_content(&self) -> Arc<[u8]> {
        Arc::clone(&self.content)
    }

    pub fn representation(&self) -> Representation {
        self.representation
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_maps_to_representation() {
        assert_eq!(
            ContentKind::Rdf.representation(),
            Some(Representation::Rdf)
        );
        assert_eq!(
            ContentKind::NamedFields.representation(),
            Some(Representation::NamedFields)
        );
        assert_eq!(ContentKind::None.representation(), None);
    }

    #[test]
    fn test_retrieval_result_clones_share_buffer() {
        let result = RetrievalResult::new(b"<rdf/>".to_vec(), Representation::Rdf);
        let copy = result.clone();
        assert!(Arc::ptr_eq(&result.shared_content(), &copy.shared_content()));
        assert_eq!(copy.content(), b"<rdf/>");
    }

    #[test]
    fn test_empty_result_is_distinct_from_missing() {
        let result = RetrievalResult::new(Vec::new(), Representation::NamedFields);
        assert!(result.is_empty());
        assert_eq!(result.representation(), Representation::NamedFields);
    }

    #[test]
    fn test_notification_accessors() {
        let n = Notification::remove("coll/obj2");
        assert_eq!(n.resource_id(), "coll/obj2");
        assert!(n.event_kind().is_removal());
        assert!(!Notification::update("x").event_kind().is_removal());
    }

    #[test]
    fn test_kinds_display_snake_case() {
        assert_eq!(ContentKind::NamedFields.to_string(), "named_fields");
        assert_eq!(EventKind::Remove.to_string(), "remove");
    }
}
