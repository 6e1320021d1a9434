//! Transformation-marker lookup in RDF/XML descriptions.
//!
//! The named-fields retriever needs exactly one fact from a resource's RDF:
//! the literal value of the transformation predicate on that resource. This
//! module walks the RDF/XML with a namespace-aware `quick-xml` reader and
//! tracks node/property striping just far enough to know which subject a
//! property belongs to. Both property elements and property attributes are
//! recognised:
//!
//! ```xml
//! <rdf:Description rdf:about="http://repo/rest/obj1">
//!   <indexing:hasIndexingTransformation>dc</indexing:hasIndexingTransformation>
//! </rdf:Description>
//!
//! <rdf:Description rdf:about="http://repo/rest/obj1"
//!                  indexing:hasIndexingTransformation="dc"/>
//! ```

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

const RDF_NS: &[u8] = b"http://www.w3.org/1999/02/22-rdf-syntax-ns#";

/// A predicate IRI split into namespace and local name, as RDF/XML
/// encodes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    namespace: String,
    local: String,
}

impl Predicate {
    /// Split `iri` after its last `#` or `/`. Returns `None` when nothing
    /// follows the separator.
    pub fn parse(iri: &str) -> Option<Self> {
        let idx = iri.rfind(['#', '/'])?;
        let (namespace, local) = iri.split_at(idx + 1);
        if local.is_empty() {
            return None;
        }
        Some(Self {
            namespace: namespace.to_string(),
            local: local.to_string(),
        })
    }

    fn matches(&self, ns: &ResolveResult, local: &[u8]) -> bool {
        match ns {
            ResolveResult::Bound(bound) => {
                bound.as_ref() == self.namespace.as_bytes() && local == self.local.as_bytes()
            }
            _ => false,
        }
    }
}

enum Frame {
    /// The `rdf:RDF` wrapper. Node elements nested in a property element
    /// are opened under that [`Frame::Property`] instead.
    Container,
    /// A node element describing `subject` (`None` for blank nodes).
    Node { subject: Option<String> },
    /// A property element of the enclosing node.
    Property {
        subject: Option<String>,
        is_marker: bool,
        text: String,
    },
}

/// Find the transformation key declared for `resource_url`.
///
/// Returns `Ok(None)` when the description carries no marker for that
/// subject, and `Err` with the reader's message when the bytes are not
/// well-formed XML.
pub fn find_transform_key(
    rdf_xml: &[u8],
    resource_url: &str,
    predicate: &Predicate,
) -> Result<Option<String>, String> {
    let mut reader = NsReader::from_reader(rdf_xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match event {
            Event::Start(e) => {
                let frame = open_element(&reader, &e, stack.last(), resource_url, predicate)?;
                match frame {
                    Opened::Found(key) => return Ok(Some(key)),
                    Opened::Frame(frame) => stack.push(frame),
                }
            }
            Event::Empty(e) => {
                // Self-closing elements never get a matching End, so only
                // their attributes can carry the marker.
                if let Opened::Found(key) =
                    open_element(&reader, &e, stack.last(), resource_url, predicate)?
                {
                    return Ok(Some(key));
                }
            }
            Event::Text(t) => {
                if let Some(Frame::Property { text, .. }) = stack.last_mut() {
                    text.push_str(&t.unescape().map_err(|e| e.to_string())?);
                }
            }
            Event::CData(c) => {
                if let Some(Frame::Property { text, .. }) = stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if let Some(Frame::Property {
                    subject,
                    is_marker: true,
                    text,
                }) = stack.pop()
                {
                    let value = text.trim();
                    if is_same_resource(subject.as_deref(), resource_url) && !value.is_empty() {
                        return Ok(Some(value.to_string()));
                    }
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

enum Opened {
    Frame(Frame),
    Found(String),
}

fn open_element(
    reader: &NsReader<&[u8]>,
    e: &BytesStart<'_>,
    parent: Option<&Frame>,
    resource_url: &str,
    predicate: &Predicate,
) -> Result<Opened, String> {
    let (ns, local) = reader.resolve_element(e.name());

    match parent {
        Some(Frame::Node { subject }) => {
            let is_marker = predicate.matches(&ns, local.as_ref());
            Ok(Opened::Frame(Frame::Property {
                subject: subject.clone(),
                is_marker,
                text: String::new(),
            }))
        }
        None if is_rdf(&ns, local.as_ref(), b"RDF") => Ok(Opened::Frame(Frame::Container)),
        // Top level (rdf:RDF omitted), inside rdf:RDF, or nested inside a
        // property element: this is a node element.
        _ => {
            let mut subject = None;
            let mut marker = None;
            for attr in e.attributes() {
                let attr = attr.map_err(|e| e.to_string())?;
                let (attr_ns, attr_local) = reader.resolve_attribute(attr.key);
                if is_rdf(&attr_ns, attr_local.as_ref(), b"about") {
                    subject = Some(attr.unescape_value().map_err(|e| e.to_string())?.into_owned());
                } else if predicate.matches(&attr_ns, attr_local.as_ref()) {
                    marker = Some(attr.unescape_value().map_err(|e| e.to_string())?.into_owned());
                }
            }
            if let Some(value) = marker {
                let value = value.trim();
                if is_same_resource(subject.as_deref(), resource_url) && !value.is_empty() {
                    return Ok(Opened::Found(value.to_string()));
                }
            }
            Ok(Opened::Frame(Frame::Node { subject }))
        }
    }
}

fn is_rdf(ns: &ResolveResult, local: &[u8], name: &[u8]) -> bool {
    matches!(ns, ResolveResult::Bound(bound) if bound.as_ref() == RDF_NS) && local == name
}

/// `rdf:about=""` is a same-document reference, i.e. the fetched resource.
fn is_same_resource(subject: Option<&str>, resource_url: &str) -> bool {
    match subject {
        Some(s) => s.is_empty() || s.trim_end_matches('/') == resource_url.trim_end_matches('/'),
        None => false,
    }
}
