//! SOAP fault normalization across protocol versions.

use std::fmt;

use soapcall_wsdl::{QName, SoapVersion};
use soapcall_xml::XmlError;
use soapcall_xml::parser::{self, Node, NodeDeserializer, XmlVisitor};
use tracing::trace;

use crate::Record;

/// Fault class, common to both SOAP versions (SOAP 1.1 `Client`/`Server`
/// map to `Sender`/`Receiver`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultCode {
    VersionMismatch,
    MustUnderstand,
    DataEncodingUnknown,
    Sender,
    Receiver,
    Other,
}

impl FaultCode {
    fn classify(version: SoapVersion, class: &str) -> Self {
        match (version, class) {
            (_, "VersionMismatch") => Self::VersionMismatch,
            (_, "MustUnderstand") => Self::MustUnderstand,
            (SoapVersion::Soap12, "DataEncodingUnknown") => Self::DataEncodingUnknown,
            (SoapVersion::Soap11, "Client") | (SoapVersion::Soap12, "Sender") => Self::Sender,
            (SoapVersion::Soap11, "Server") | (SoapVersion::Soap12, "Receiver") => Self::Receiver,
            _ => Self::Other,
        }
    }
}

/// A fault reply, in a shape independent of the SOAP version.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapFault {
    pub version: SoapVersion,
    /// The declared fault the detail matched, else the local name of the code.
    pub name: String,
    pub code: FaultCode,
    /// The code as sent, resolved to a namespace.
    pub code_name: QName,
    pub subcodes: Vec<QName>,
    pub reason: String,
    pub role: Option<String>,
    pub node: Option<String>,
    /// Decoded detail entries, keyed by fault part name when declared.
    pub detail: Record,
    /// The fault element as a plain value tree, in its version's own vocabulary.
    pub raw: Record,
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code_name.local, self.reason)
    }
}

impl std::error::Error for SoapFault {}

/// What a fault element says before its detail is decoded.
#[derive(Debug, Default)]
pub(crate) struct FaultFields<'a> {
    pub code_name: Option<QName>,
    pub subcodes: Vec<QName>,
    pub reason: String,
    pub role: Option<String>,
    pub node: Option<String>,
    pub detail: Option<Node<'a, 'a>>,
}

impl FaultFields<'_> {
    pub(crate) fn into_fault(
        self,
        version: SoapVersion,
        name: Option<String>,
        detail: Record,
        raw: Record,
    ) -> SoapFault {
        let code_name = self
            .code_name
            .unwrap_or_else(|| QName::unqualified("Receiver"));
        let mut subcodes = self.subcodes;

        // SOAP 1.1 refines codes with dots: `Client.Authentication`.
        let (class, refinement) = match code_name.local.split_once('.') {
            Some((class, rest)) if version == SoapVersion::Soap11 => (class, Some(rest)),
            _ => (code_name.local.as_str(), None),
        };
        let code = if code_name.namespace() == Some(version.envelope_namespace()) {
            FaultCode::classify(version, class)
        } else {
            FaultCode::Other
        };
        if let Some(refinement) = refinement {
            subcodes.insert(0, QName::unqualified(refinement));
        }

        SoapFault {
            version,
            name: name.unwrap_or_else(|| code_name.local.clone()),
            code,
            subcodes,
            reason: self.reason,
            role: self.role,
            node: self.node,
            detail,
            raw,
            code_name,
        }
    }
}

pub(crate) fn parse_fault<'a>(
    node: Node<'a, 'a>,
    version: SoapVersion,
) -> Result<FaultFields<'a>, XmlError> {
    let deserializer = NodeDeserializer::new(node);
    match version {
        SoapVersion::Soap11 => deserializer.deserialize(Soap11FaultVisitor::default()),
        SoapVersion::Soap12 => deserializer.deserialize(Soap12FaultVisitor::default()),
    }
}

fn code_of(node: Node<'_, '_>) -> QName {
    let text = parser::text_of(node);
    let text = text.trim();
    QName::from_prefixed(node, text).unwrap_or_else(|| QName::unqualified(text))
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

#[derive(Default)]
struct Soap11FaultVisitor<'a> {
    fields: FaultFields<'a>,
}

impl<'a> XmlVisitor<'a> for Soap11FaultVisitor<'a> {
    type Value = FaultFields<'a>;

    fn visit_node(&mut self, node: Node<'a, 'a>) -> Result<(), XmlError> {
        for child in parser::element_children(node) {
            match child.tag_name().name() {
                "faultcode" => self.fields.code_name = Some(code_of(child)),
                "faultstring" => self.fields.reason = parser::text_of(child),
                "faultactor" => self.fields.role = non_empty(parser::text_of(child)),
                "detail" => self.fields.detail = Some(child),
                other => trace!(element = other, "ignoring fault child"),
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Self::Value, XmlError> {
        if self.fields.code_name.is_none() {
            return Err(XmlError::InvalidXml("SOAP 1.1 fault without faultcode".to_owned()));
        }
        Ok(self.fields)
    }
}

#[derive(Default)]
struct Soap12FaultVisitor<'a> {
    fields: FaultFields<'a>,
}

impl Soap12FaultVisitor<'_> {
    fn visit_code(&mut self, code: Node<'_, '_>) {
        for child in parser::element_children(code) {
            match child.tag_name().name() {
                "Value" if self.fields.code_name.is_none() => {
                    self.fields.code_name = Some(code_of(child));
                }
                "Value" => self.fields.subcodes.push(code_of(child)),
                "Subcode" => self.visit_code(child),
                _ => {}
            }
        }
    }

    fn visit_reason(&mut self, reason: Node<'_, '_>) {
        let texts: Vec<Node<'_, '_>> = parser::element_children(reason)
            .filter(|n| n.tag_name().name() == "Text")
            .collect();
        let preferred = texts
            .iter()
            .find(|n| {
                n.attribute((parser::NS_XML_URI, "lang"))
                    .is_some_and(|lang| lang.eq_ignore_ascii_case("en") || lang.starts_with("en-"))
            })
            .or_else(|| texts.first());
        if let Some(text) = preferred {
            self.fields.reason = parser::text_of(*text);
        }
    }
}

impl<'a> XmlVisitor<'a> for Soap12FaultVisitor<'a> {
    type Value = FaultFields<'a>;

    fn visit_node(&mut self, node: Node<'a, 'a>) -> Result<(), XmlError> {
        for child in parser::element_children(node) {
            match child.tag_name().name() {
                "Code" => self.visit_code(child),
                "Reason" => self.visit_reason(child),
                "Role" => self.fields.role = non_empty(parser::text_of(child)),
                "Node" => self.fields.node = non_empty(parser::text_of(child)),
                "Detail" => self.fields.detail = Some(child),
                other => trace!(element = other, "ignoring fault child"),
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Self::Value, XmlError> {
        if self.fields.code_name.is_none() {
            return Err(XmlError::InvalidXml("SOAP 1.2 fault without Code/Value".to_owned()));
        }
        Ok(self.fields)
    }
}
