//! Interpretation of the SOAP extension fragments found in WSDL bindings.

use std::collections::BTreeMap;

use soapcall_xml::parser::{self, Node};
use tracing::{debug, trace};

use crate::{HTTP_TRANSPORT, QName, Style, WsdlError, normalize_transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingEntry {
    pub style: Style,
    pub fragment: String,
}

/// Transport protocol URI to the `soap:binding` fragments declaring it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingTable {
    entries: BTreeMap<String, Vec<BindingEntry>>,
}

impl BindingTable {
    /// Parses every `binding` extension in `soap_namespace`. Fragments without
    /// a `style` attribute count as `document`. All spellings of the HTTP
    /// transport share one entry.
    pub fn resolve(
        operation: &str,
        binding: &QName,
        fragments: &[String],
        soap_namespace: &str,
    ) -> Result<Self, WsdlError> {
        let mut entries: BTreeMap<String, Vec<BindingEntry>> = BTreeMap::new();
        let context = format!("binding {binding}");

        for_each_extension(fragments, soap_namespace, "binding", &context, |node, fragment| {
            let transport = normalize_transport(node.attribute("transport").unwrap_or(HTTP_TRANSPORT));
            let style = parse_style(node, &context)?.unwrap_or(Style::Document);
            trace!(transport, %style, "binding fragment");
            entries
                .entry(transport.to_owned())
                .or_default()
                .push(BindingEntry {
                    style,
                    fragment: fragment.to_owned(),
                });
            Ok(())
        })?;

        if entries.is_empty() {
            return Err(WsdlError::NoSoapBinding {
                operation: operation.to_owned(),
                binding: binding.to_string(),
                namespace: soap_namespace.to_owned(),
            });
        }

        debug!(%binding, protocols = entries.len(), "binding table resolved");
        Ok(Self { entries })
    }

    pub fn get(&self, protocol: &str) -> Option<&[BindingEntry]> {
        self.entries
            .get(normalize_transport(protocol))
            .map(Vec::as_slice)
    }

    /// Whether `protocol` is bound with `style`. An explicit style on the
    /// operation wins over whatever the binding fragments declare.
    pub fn can_transport(&self, protocol: &str, style: Style, explicit: Option<Style>) -> bool {
        let Some(entries) = self.get(protocol) else {
            return false;
        };

        match explicit {
            Some(explicit) => explicit == style,
            None => entries.iter().any(|e| e.style == style),
        }
    }
}

/// `soap:operation`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoapOperationExt {
    pub soap_action: Option<String>,
    pub style: Option<Style>,
}

/// `soap:body`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapBodyExt {
    pub parts: Option<Vec<String>>,
    pub use_: String,
    pub namespace: Option<String>,
}

impl Default for SoapBodyExt {
    fn default() -> Self {
        Self {
            parts: None,
            use_: "literal".to_owned(),
            namespace: None,
        }
    }
}

/// `soap:header` or `soap:headerfault`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapHeaderExt {
    pub message: QName,
    pub part: String,
    pub use_: String,
    pub faults: Vec<SoapHeaderExt>,
}

/// `soap:fault`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFaultExt {
    pub name: Option<String>,
    pub use_: String,
}

pub fn soap_operation(
    fragments: &[String],
    soap_namespace: &str,
    context: &str,
) -> Result<SoapOperationExt, WsdlError> {
    let mut found = SoapOperationExt::default();
    for_each_extension(fragments, soap_namespace, "operation", context, |node, _| {
        found = SoapOperationExt {
            soap_action: node.attribute("soapAction").map(str::to_owned),
            style: parse_style(node, context)?,
        };
        Ok(())
    })?;
    Ok(found)
}

pub fn soap_body(
    fragments: &[String],
    soap_namespace: &str,
    context: &str,
) -> Result<Option<SoapBodyExt>, WsdlError> {
    let mut found = None;
    for_each_extension(fragments, soap_namespace, "body", context, |node, _| {
        found = Some(SoapBodyExt {
            parts: node
                .attribute("parts")
                .map(|p| p.split_whitespace().map(str::to_owned).collect()),
            use_: node.attribute("use").unwrap_or("literal").to_owned(),
            namespace: node.attribute("namespace").map(str::to_owned),
        });
        Ok(())
    })?;
    Ok(found)
}

pub fn soap_headers(
    fragments: &[String],
    soap_namespace: &str,
    context: &str,
) -> Result<Vec<SoapHeaderExt>, WsdlError> {
    let mut headers = Vec::new();
    for_each_extension(fragments, soap_namespace, "header", context, |node, _| {
        let mut header = header_from_node(node, context)?;
        for child in parser::element_children(node) {
            if child.tag_name().namespace() == Some(soap_namespace)
                && child.tag_name().name() == "headerfault"
            {
                header.faults.push(header_from_node(child, context)?);
            }
        }
        headers.push(header);
        Ok(())
    })?;
    Ok(headers)
}

pub fn soap_fault(
    fragments: &[String],
    soap_namespace: &str,
    context: &str,
) -> Result<Option<SoapFaultExt>, WsdlError> {
    let mut found = None;
    for_each_extension(fragments, soap_namespace, "fault", context, |node, _| {
        found = Some(SoapFaultExt {
            name: node.attribute("name").map(str::to_owned),
            use_: node.attribute("use").unwrap_or("literal").to_owned(),
        });
        Ok(())
    })?;
    Ok(found)
}

/// `location` of every `soap:address` among a port's extensions.
pub fn soap_addresses(
    fragments: &[String],
    soap_namespace: &str,
    context: &str,
) -> Result<Vec<String>, WsdlError> {
    let mut addresses = Vec::new();
    for_each_extension(fragments, soap_namespace, "address", context, |node, _| {
        if let Some(location) = node.attribute("location") {
            addresses.push(location.to_owned());
        }
        Ok(())
    })?;
    Ok(addresses)
}

/// Namespace of the first `binding` extension element, if any.
pub fn binding_namespace(fragments: &[String], context: &str) -> Result<Option<String>, WsdlError> {
    for fragment in fragments {
        let document = parse_fragment(fragment, context)?;
        let root = document.root_element();
        if root.tag_name().name() == "binding" {
            return Ok(root.tag_name().namespace().map(str::to_owned));
        }
    }
    Ok(None)
}

fn header_from_node(node: Node<'_, '_>, context: &str) -> Result<SoapHeaderExt, WsdlError> {
    let message_attr = node
        .attribute("message")
        .ok_or_else(|| WsdlError::MissingHeaderAttribute {
            message: context.to_owned(),
            attribute: "message",
        })?;

    let message = QName::from_prefixed(node, message_attr).ok_or_else(|| {
        WsdlError::MalformedFragment {
            context: context.to_owned(),
            reason: format!("unknown prefix in message '{message_attr}'"),
        }
    })?;

    let missing = |attribute| WsdlError::MissingHeaderAttribute {
        message: message.to_string(),
        attribute,
    };

    let part = node.attribute("part").ok_or_else(|| missing("part"))?;
    let use_ = node.attribute("use").ok_or_else(|| missing("use"))?;

    Ok(SoapHeaderExt {
        part: part.to_owned(),
        use_: use_.to_owned(),
        message,
        faults: Vec::new(),
    })
}

fn parse_style(node: Node<'_, '_>, context: &str) -> Result<Option<Style>, WsdlError> {
    node.attribute("style")
        .map(|s| {
            Style::parse(s).ok_or_else(|| WsdlError::MalformedFragment {
                context: context.to_owned(),
                reason: format!("unknown style '{s}'"),
            })
        })
        .transpose()
}

fn parse_fragment<'f>(
    fragment: &'f str,
    context: &str,
) -> Result<soapcall_xml::parser::Document<'f>, WsdlError> {
    parser::parse(fragment).map_err(|e| WsdlError::MalformedFragment {
        context: context.to_owned(),
        reason: e.to_string(),
    })
}

fn for_each_extension<F>(
    fragments: &[String],
    namespace: &str,
    local: &str,
    context: &str,
    mut f: F,
) -> Result<(), WsdlError>
where
    F: FnMut(Node<'_, '_>, &str) -> Result<(), WsdlError>,
{
    for fragment in fragments {
        let document = parse_fragment(fragment, context)?;
        let root = document.root_element();
        if parser::is_named(root, Some(namespace), local) {
            f(root, fragment)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WSDL_SOAP11_NS;

    fn frag(body: &str) -> String {
        format!(r#"<soap:{body} xmlns:soap="{WSDL_SOAP11_NS}" xmlns:tns="urn:t"/>"#)
    }

    #[test]
    fn missing_style_defaults_to_document() {
        let table = BindingTable::resolve(
            "Op",
            &QName::new("urn:t", "B"),
            &[frag(r#"binding transport="http://schemas.xmlsoap.org/soap/http""#)],
            WSDL_SOAP11_NS,
        )
        .unwrap();

        let entries = table.get(HTTP_TRANSPORT).unwrap();
        assert_eq!(entries[0].style, Style::Document);
        assert!(table.can_transport(HTTP_TRANSPORT, Style::Document, None));
        assert!(!table.can_transport(HTTP_TRANSPORT, Style::Rpc, None));
    }

    #[test]
    fn explicit_style_overrides_table() {
        let table = BindingTable::resolve(
            "Op",
            &QName::new("urn:t", "B"),
            &[frag(r#"binding style="document""#)],
            WSDL_SOAP11_NS,
        )
        .unwrap();

        assert!(table.can_transport(HTTP_TRANSPORT, Style::Rpc, Some(Style::Rpc)));
        assert!(!table.can_transport(HTTP_TRANSPORT, Style::Document, Some(Style::Rpc)));
        assert!(!table.can_transport("urn:smtp", Style::Document, None));
    }

    #[test]
    fn http_transport_spellings_share_an_entry() {
        let table = BindingTable::resolve(
            "Op",
            &QName::new("urn:t", "B"),
            &[
                frag(r#"binding transport="http://www.w3.org/2003/05/soap/bindings/HTTP/""#),
                frag(r#"binding style="rpc" transport="http://schemas.xmlsoap.org/soap/http/""#),
            ],
            WSDL_SOAP11_NS,
        )
        .unwrap();

        assert_eq!(table.get(HTTP_TRANSPORT).unwrap().len(), 2);
        assert!(table.can_transport(HTTP_TRANSPORT, Style::Document, None));
        assert!(table.can_transport(crate::SOAP12_HTTP_TRANSPORT, Style::Rpc, None));
    }

    #[test]
    fn no_fragment_in_namespace_is_configuration_error() {
        let other = r#"<http:binding xmlns:http="http://schemas.xmlsoap.org/wsdl/http/" verb="POST"/>"#;
        let err = BindingTable::resolve(
            "Op",
            &QName::new("urn:t", "B"),
            &[other.to_owned()],
            WSDL_SOAP11_NS,
        )
        .unwrap_err();
        assert!(matches!(err, WsdlError::NoSoapBinding { .. }));
    }

    #[test]
    fn header_requires_use() {
        let err = soap_headers(
            &[frag(r#"header message="tns:Auth" part="token""#)],
            WSDL_SOAP11_NS,
            "Op/input",
        )
        .unwrap_err();
        assert_eq!(
            err,
            WsdlError::MissingHeaderAttribute {
                message: "{urn:t}Auth".to_owned(),
                attribute: "use",
            }
        );
    }

    #[test]
    fn header_collects_headerfaults() {
        let fragment = format!(
            r#"<soap:header xmlns:soap="{WSDL_SOAP11_NS}" xmlns:tns="urn:t" message="tns:Auth" part="token" use="literal">
                 <soap:headerfault message="tns:AuthFault" part="problem" use="literal"/>
               </soap:header>"#
        );
        let headers = soap_headers(&[fragment], WSDL_SOAP11_NS, "Op/input").unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].message, QName::new("urn:t", "Auth"));
        assert_eq!(headers[0].faults[0].part, "problem");
    }

    #[test]
    fn body_parts_are_split_on_whitespace() {
        let body = soap_body(
            &[frag(r#"body use="literal" parts="a  b" namespace="urn:rpc""#)],
            WSDL_SOAP11_NS,
            "Op/input",
        )
        .unwrap()
        .unwrap();
        assert_eq!(body.parts, Some(vec!["a".to_owned(), "b".to_owned()]));
        assert_eq!(body.namespace.as_deref(), Some("urn:rpc"));
    }
}
