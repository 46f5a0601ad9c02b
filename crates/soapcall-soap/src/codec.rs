//! The seam between envelopes and element (de)serialization.
//!
//! An [`ElementCodec`] compiles, per element identity, a [`Writer`] from
//! [`Value`] to XML and a [`Reader`] back. [`GenericCodec`] maps values to
//! XML structurally for descriptions without schema-aware code generation.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use soapcall_wsdl::{QName, SchemaSpace, SoapVersion};
use soapcall_xml::builder::Element;
use soapcall_xml::parser::{self, Node};
use tracing::trace;

use crate::xop::{self, XOP_NS};
use crate::{Include, Record, SoapError, Value};

/// Per-message state shared by the writers of one envelope.
#[derive(Debug)]
pub struct EncodeContext {
    version: SoapVersion,
    mtom: bool,
    attachments: Vec<Arc<Include>>,
}

impl EncodeContext {
    pub fn new(version: SoapVersion, mtom: bool) -> Self {
        Self {
            version,
            mtom,
            attachments: Vec::new(),
        }
    }

    pub fn version(&self) -> SoapVersion {
        self.version
    }

    /// Whether binary content is sent as XOP attachments instead of inline base64.
    pub fn mtom(&self) -> bool {
        self.mtom
    }

    pub fn attach(&mut self, include: Arc<Include>) {
        self.attachments.push(include);
    }

    pub fn into_attachments(self) -> Vec<Arc<Include>> {
        self.attachments
    }
}

/// Attachments of the received message, for resolving `xop:Include`.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'m> {
    attachments: &'m HashMap<String, Arc<Include>>,
}

impl<'m> DecodeContext<'m> {
    pub fn new(attachments: &'m HashMap<String, Arc<Include>>) -> Self {
        Self { attachments }
    }

    pub fn attachment(&self, content_id: &str) -> Option<&Arc<Include>> {
        self.attachments.get(content_id)
    }
}

pub type Writer =
    Arc<dyn Fn(&Value, &mut EncodeContext) -> Result<Element, SoapError> + Send + Sync>;

pub type Reader =
    Arc<dyn for<'a, 'i> Fn(Node<'a, 'i>, &DecodeContext<'_>) -> Result<Value, SoapError> + Send + Sync>;

pub trait ElementCodec: Send + Sync {
    fn compile_writer(&self, element: &QName) -> Result<Writer, SoapError>;

    fn compile_reader(&self, element: &QName) -> Result<Reader, SoapError>;
}

/// Structural mapping: records become child elements in the parent's
/// namespace, lists become repeated elements, text becomes character data.
#[derive(Debug, Clone, Default)]
pub struct GenericCodec {
    schema: Option<Arc<SchemaSpace>>,
}

impl GenericCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts compilation to elements declared in `schema`.
    pub fn with_schema(schema: Arc<SchemaSpace>) -> Self {
        Self {
            schema: Some(schema),
        }
    }

    fn check_declared(&self, element: &QName) -> Result<(), SoapError> {
        match &self.schema {
            Some(schema) if schema.get(element).is_none() => Err(SoapError::Codec {
                element: element.to_string(),
                reason: "element is not declared".to_owned(),
            }),
            _ => Ok(()),
        }
    }
}

impl ElementCodec for GenericCodec {
    fn compile_writer(&self, element: &QName) -> Result<Writer, SoapError> {
        self.check_declared(element)?;
        let element = element.clone();
        Ok(Arc::new(move |value: &Value, ctx: &mut EncodeContext| {
            write_value(&element.local, element.namespace(), value, ctx)
        }))
    }

    fn compile_reader(&self, element: &QName) -> Result<Reader, SoapError> {
        self.check_declared(element)?;
        let element = element.clone();
        Ok(Arc::new(move |node: Node<'_, '_>, ctx: &DecodeContext<'_>| {
            if !element.matches(node) {
                return Err(SoapError::Codec {
                    element: element.to_string(),
                    reason: format!("found <{}>", node.tag_name().name()),
                });
            }
            read_value(node, ctx)
        }))
    }
}

/// Writes `value` as element `name`; nested records inherit `namespace`.
pub fn write_value(
    name: &str,
    namespace: Option<&str>,
    value: &Value,
    ctx: &mut EncodeContext,
) -> Result<Element, SoapError> {
    let element = Element::new(name).set_namespace_optional(namespace);
    match value {
        Value::Empty => Ok(element),
        Value::Text(text) => Ok(element.set_text(text.as_str())),
        Value::Include(include) => {
            if ctx.mtom() {
                trace!(cid = include.content_id(), "attachment referenced by xop:Include");
                ctx.attach(Arc::clone(include));
                Ok(include.to_xml_reference_node(name, namespace))
            } else {
                Ok(element.set_text(STANDARD.encode(include.content()?)))
            }
        }
        Value::Record(record) => {
            let mut element = element;
            for (key, child) in record.iter() {
                for occurrence in child.occurrences() {
                    element = element.add_child(write_value(key, namespace, occurrence, ctx)?);
                }
            }
            Ok(element)
        }
        Value::List(_) => Err(SoapError::Codec {
            element: name.to_owned(),
            reason: "a list cannot be written as a single element".to_owned(),
        }),
    }
}

/// Reads any element structurally. An element whose only child is
/// `xop:Include` reads as the referenced attachment.
pub fn read_value(node: Node<'_, '_>, ctx: &DecodeContext<'_>) -> Result<Value, SoapError> {
    let mut children = parser::element_children(node).peekable();

    if children.peek().is_none() {
        let text = parser::text_of(node);
        return Ok(if text.is_empty() {
            Value::Empty
        } else {
            Value::Text(text)
        });
    }

    let mut record = Record::new();
    for child in children {
        if parser::is_named(child, Some(XOP_NS), "Include") {
            return resolve_include(child, ctx);
        }
        record.append(child.tag_name().name(), read_value(child, ctx)?);
    }
    Ok(Value::Record(record))
}

fn resolve_include(node: Node<'_, '_>, ctx: &DecodeContext<'_>) -> Result<Value, SoapError> {
    let content_id = xop::content_id_from_href(node.attribute("href").unwrap_or_default());
    ctx.attachment(&content_id)
        .map(|include| Value::Include(Arc::clone(include)))
        .ok_or(SoapError::UnresolvedInclude(content_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(element: &QName, value: &Value, mtom: bool) -> (String, Vec<Arc<Include>>) {
        let writer = GenericCodec::new().compile_writer(element).unwrap();
        let mut ctx = EncodeContext::new(SoapVersion::Soap11, mtom);
        let xml = writer(value, &mut ctx).unwrap().to_xml_string().unwrap();
        (xml, ctx.into_attachments())
    }

    #[test]
    fn record_round_trip() {
        let element = QName::new("urn:q", "Quote");
        let value = Value::from(
            Record::new()
                .with("symbol", "ACME")
                .with("memo", "line\r\nnext")
                .with("tag", Value::List(vec!["a".into(), "b".into()]))
                .with("note", Value::Empty),
        );

        let (xml, attachments) = write(&element, &value, false);
        assert!(attachments.is_empty());

        let doc = parser::parse(&xml).unwrap();
        let reader = GenericCodec::new().compile_reader(&element).unwrap();
        let empty = HashMap::new();
        let read = reader(doc.root_element(), &DecodeContext::new(&empty)).unwrap();
        assert_eq!(read, value);
    }

    #[test]
    fn include_is_inline_base64_without_mtom() {
        let include = Include::from_bytes("a@x", "application/octet-stream", b"hi".to_vec());
        let (xml, attachments) = write(&QName::new("urn:q", "Blob"), &include.into(), false);
        assert!(xml.contains(">aGk=<"), "{xml}");
        assert!(attachments.is_empty());
    }

    #[test]
    fn include_is_referenced_with_mtom() {
        let include = Arc::new(Include::from_bytes("a@x", "image/png", b"png".to_vec()));
        let element = QName::new("urn:q", "Blob");
        let (xml, attachments) = write(&element, &Value::Include(Arc::clone(&include)), true);
        assert_eq!(attachments.len(), 1);

        let doc = parser::parse(&xml).unwrap();
        let mut parts = HashMap::new();
        parts.insert("a@x".to_owned(), include);
        let reader = GenericCodec::new().compile_reader(&element).unwrap();
        let read = reader(doc.root_element(), &DecodeContext::new(&parts)).unwrap();
        assert_eq!(read.as_include().unwrap().content().unwrap(), b"png");
    }

    #[test]
    fn content_ids_are_escaped_in_hrefs() {
        let include = Arc::new(Include::from_bytes("a%41 b@x", "image/png", b"png".to_vec()));
        let element = QName::new("urn:q", "Blob");
        let (xml, _) = write(&element, &Value::Include(Arc::clone(&include)), true);
        assert!(xml.contains(r#"href="cid:a%2541%20b@x""#), "{xml}");

        let doc = parser::parse(&xml).unwrap();
        let mut parts = HashMap::new();
        parts.insert("a%41 b@x".to_owned(), include);
        let reader = GenericCodec::new().compile_reader(&element).unwrap();
        let read = reader(doc.root_element(), &DecodeContext::new(&parts)).unwrap();
        assert_eq!(read.as_include().unwrap().content_id(), "a%41 b@x");
    }

    #[test]
    fn unresolved_include_is_a_parse_error() {
        let xml = format!(
            r#"<b xmlns:xop="{XOP_NS}"><xop:Include href="cid:missing%40x"/></b>"#
        );
        let doc = parser::parse(&xml).unwrap();
        let empty = HashMap::new();
        let err = read_value(doc.root_element(), &DecodeContext::new(&empty)).unwrap_err();
        assert!(matches!(&err, SoapError::UnresolvedInclude(cid) if cid == "missing@x"));
        assert!(err.is_parse_error());
    }

    #[test]
    fn schema_restricts_compilation() {
        let codec = GenericCodec::with_schema(Arc::new(SchemaSpace::new()));
        assert!(matches!(
            codec.compile_writer(&QName::new("urn:q", "Unknown")),
            Err(SoapError::Codec { .. })
        ));
    }
}
