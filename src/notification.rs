//! Turning message headers into [`Notification`]s.
//!
//! A message source hands over key/value headers. Two of them matter: the
//! resource identifier and the event type. The event type is a removal
//! when it equals one of the configured removal codes; any other value is
//! an update.

use std::collections::{BTreeMap, HashMap};

use repo_indexer_core::error::NotificationError;
use repo_indexer_core::models::{EventKind, Notification};

use crate::config::NotificationConfig;

/// Read access to a message's headers.
pub trait MessageHeaders {
    fn header(&self, name: &str) -> Option<&str>;
}

impl MessageHeaders for HashMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl MessageHeaders for BTreeMap<String, String> {
    fn header(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// Classify an event-type code.
pub fn classify(event_type: &str, config: &NotificationConfig) -> EventKind {
    let code = event_type.trim();
    if config.removal_event_types.iter().any(|r| r == code) {
        EventKind::Remove
    } else {
        EventKind::Update
    }
}

/// Build a notification from message headers.
pub fn parse_notification(
    headers: &impl MessageHeaders,
    config: &NotificationConfig,
) -> Result<Notification, NotificationError> {
    let resource_id = required(headers, &config.identifier_header)?;
    let event_type = required(headers, &config.event_type_header)?;
    Ok(Notification::new(resource_id, classify(event_type, config)))
}

fn required<'a>(
    headers: &'a impl MessageHeaders,
    name: &str,
) -> Result<&'a str, NotificationError> {
    let value = headers
        .header(name)
        .ok_or_else(|| NotificationError::MissingHeader(name.to_string()))?
        .trim();
    if value.is_empty() {
        return Err(NotificationError::EmptyHeader(name.to_string()));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_removal_code_classifies_as_remove() {
        let config = NotificationConfig::default();
        let h = headers(&[
            (config.identifier_header.as_str(), "/obj2"),
            (
                config.event_type_header.as_str(),
                "http://fedora.info/definitions/v4/repository#NODE_REMOVED",
            ),
        ]);
        let n = parse_notification(&h, &config).unwrap();
        assert_eq!(n.resource_id(), "/obj2");
        assert_eq!(n.event_kind(), EventKind::Remove);
    }

    #[test]
    fn test_any_other_code_is_update() {
        let config = NotificationConfig::default();
        let h = headers(&[
            (config.identifier_header.as_str(), "obj1"),
            (
                config.event_type_header.as_str(),
                "http://fedora.info/definitions/v4/repository#PROPERTY_CHANGED",
            ),
        ]);
        let n = parse_notification(&h, &config).unwrap();
        assert_eq!(n.event_kind(), EventKind::Update);
    }

    #[test]
    fn test_missing_identifier_is_malformed() {
        let config = NotificationConfig::default();
        let h = headers(&[(config.event_type_header.as_str(), "anything")]);
        let err = parse_notification(&h, &config).unwrap_err();
        assert_eq!(
            err,
            NotificationError::MissingHeader(config.identifier_header.clone())
        );
    }

    #[test]
    fn test_missing_event_type_is_malformed() {
        let config = NotificationConfig::default();
        let h = headers(&[(config.identifier_header.as_str(), "obj1")]);
        assert!(matches!(
            parse_notification(&h, &config),
            Err(NotificationError::MissingHeader(_))
        ));
    }

    #[test]
    fn test_blank_identifier_is_malformed() {
        let config = NotificationConfig::default();
        let h = headers(&[
            (config.identifier_header.as_str(), "   "),
            (config.event_type_header.as_str(), "x"),
        ]);
        assert!(matches!(
            parse_notification(&h, &config),
            Err(NotificationError::EmptyHeader(_))
        ));
    }
}
