use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::binding::{self, SoapHeaderExt};
use crate::{Definitions, ElementDecl, Message, QName, SchemaSpace, WsdlError};

/// A message part resolved to the element that carries it on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRef {
    pub name: String,
    pub element: QName,
}

/// Which parts of an operation's message travel where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePartSet {
    pub body: Vec<PartRef>,
    pub header: Vec<PartRef>,
    pub headerfault: Vec<PartRef>,
    pub fault: BTreeMap<String, QName>,
}

/// Resolves `names` (all parts, in declaration order, when empty) of
/// `message` to element identities.
///
/// A part declaring only a `type` gets an element synthesized in the
/// message's own namespace, named after the part, and registered in `schema`.
/// Registration is idempotent, so repeated calls yield the same identities.
#[instrument(level = "debug", skip(message, schema), fields(message = %message.name))]
pub fn select_parts(
    message: &Message,
    names: &[String],
    schema: &SchemaSpace,
) -> Result<Vec<PartRef>, WsdlError> {
    let selected: Vec<&str> = if names.is_empty() {
        message.parts.iter().map(|p| p.name.as_str()).collect()
    } else {
        names.iter().map(String::as_str).collect()
    };

    selected
        .into_iter()
        .map(|name| {
            let part = message.part(name).ok_or_else(|| WsdlError::MissingPart {
                message: message.name.to_string(),
                part: name.to_owned(),
            })?;

            let element = match (&part.element, &part.type_name) {
                (Some(element), _) => element.clone(),
                (None, Some(type_name)) => {
                    let element = QName {
                        namespace: message.name.namespace.clone(),
                        local: part.name.clone(),
                    };
                    schema.declare(ElementDecl {
                        name: element.clone(),
                        type_name: Some(type_name.clone()),
                        synthesized: true,
                    })?;
                    element
                }
                (None, None) => {
                    return Err(WsdlError::UntypedPart {
                        message: message.name.to_string(),
                        part: part.name.clone(),
                    });
                }
            };

            Ok(PartRef {
                name: part.name.clone(),
                element,
            })
        })
        .collect()
}

/// Collects header (and header fault) parts from `soap:header` extensions.
pub(crate) fn collect_headers(
    definitions: &Definitions,
    headers: &[SoapHeaderExt],
    schema: &SchemaSpace,
) -> Result<(Vec<PartRef>, Vec<PartRef>), WsdlError> {
    let mut header = Vec::new();
    let mut headerfault = Vec::new();

    for ext in headers {
        let message = definitions.message(&ext.message)?;
        header.extend(select_parts(message, std::slice::from_ref(&ext.part), schema)?);

        for fault in &ext.faults {
            let message = definitions.message(&fault.message)?;
            headerfault.extend(select_parts(
                message,
                std::slice::from_ref(&fault.part),
                schema,
            )?);
        }
    }

    Ok((header, headerfault))
}

/// Builds the part set of one direction of an operation.
pub(crate) struct PartSetRequest<'a> {
    pub definitions: &'a Definitions,
    pub schema: &'a SchemaSpace,
    pub soap_namespace: &'a str,
    pub operation: &'a str,
    pub message: Option<&'a Message>,
    pub extensions: &'a [String],
    /// `(portType fault, binding fault extensions)`
    pub faults: Vec<(&'a Message, &'a [String], &'a str)>,
}

impl PartSetRequest<'_> {
    pub(crate) fn build(self) -> Result<MessagePartSet, WsdlError> {
        let context = format!("operation {}", self.operation);
        let body_ext = binding::soap_body(self.extensions, self.soap_namespace, &context)?
            .unwrap_or_default();

        if body_ext.use_ != "literal" {
            return Err(WsdlError::UnsupportedUse {
                operation: self.operation.to_owned(),
                use_: body_ext.use_,
            });
        }

        let header_exts = binding::soap_headers(self.extensions, self.soap_namespace, &context)?;
        let (header, headerfault) = collect_headers(self.definitions, &header_exts, self.schema)?;

        let body = match self.message {
            Some(message) => {
                let names = match body_ext.parts {
                    Some(names) => names,
                    // Parts bound to headers are not repeated in the body.
                    None => message
                        .parts
                        .iter()
                        .filter(|p| {
                            !header_exts
                                .iter()
                                .any(|h| h.message == message.name && h.part == p.name)
                        })
                        .map(|p| p.name.clone())
                        .collect(),
                };
                if names.is_empty() {
                    Vec::new()
                } else {
                    select_parts(message, &names, self.schema)?
                }
            }
            None => Vec::new(),
        };

        let mut fault = BTreeMap::new();
        for (message, extensions, name) in self.faults {
            let fault_context = format!("{context} fault {name}");
            if let Some(ext) = binding::soap_fault(extensions, self.soap_namespace, &fault_context)?
            {
                if ext.use_ != "literal" {
                    return Err(WsdlError::UnsupportedUse {
                        operation: self.operation.to_owned(),
                        use_: ext.use_,
                    });
                }
            }
            for part in select_parts(message, &[], self.schema)? {
                fault.insert(name.to_owned(), part.element);
            }
        }

        debug!(
            operation = self.operation,
            body = body.len(),
            header = header.len(),
            headerfault = headerfault.len(),
            fault = fault.len(),
            "message parts selected"
        );

        Ok(MessagePartSet {
            body,
            header,
            headerfault,
            fault,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Part;

    fn message() -> Message {
        Message::builder()
            .name(QName::new("urn:msg", "PayIn"))
            .parts(vec![
                Part::builder()
                    .name("order")
                    .element(QName::new("urn:schema", "Order"))
                    .build(),
                Part::builder()
                    .name("amount")
                    .type_name(QName::new("http://www.w3.org/2001/XMLSchema", "decimal"))
                    .build(),
                Part::builder().name("broken").build(),
            ])
            .build()
    }

    #[test]
    fn empty_names_select_all_parts_in_order() {
        let mut msg = message();
        msg.parts.pop();
        let parts = select_parts(&msg, &[], &SchemaSpace::new()).unwrap();
        let names: Vec<_> = parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["order", "amount"]);
    }

    #[test]
    fn type_parts_are_synthesized_in_message_namespace() {
        let schema = SchemaSpace::new();
        let parts = select_parts(&message(), &["amount".to_owned()], &schema).unwrap();
        assert_eq!(parts[0].element, QName::new("urn:msg", "amount"));

        let decl = schema.get(&parts[0].element).unwrap();
        assert!(decl.synthesized);
        assert_eq!(
            decl.type_name,
            Some(QName::new("http://www.w3.org/2001/XMLSchema", "decimal"))
        );
    }

    #[test]
    fn selection_is_idempotent() {
        let schema = SchemaSpace::new();
        let names = ["order".to_owned(), "amount".to_owned()];
        let first = select_parts(&message(), &names, &schema).unwrap();
        let second = select_parts(&message(), &names, &schema).unwrap();
        assert_eq!(first, second);
        assert_eq!(schema.len(), 1);
    }

    #[test]
    fn unknown_and_untyped_parts_fail() {
        let schema = SchemaSpace::new();
        assert!(matches!(
            select_parts(&message(), &["missing".to_owned()], &schema),
            Err(WsdlError::MissingPart { .. })
        ));
        assert!(matches!(
            select_parts(&message(), &["broken".to_owned()], &schema),
            Err(WsdlError::UntypedPart { .. })
        ));
    }
}
