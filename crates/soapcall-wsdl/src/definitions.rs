//! WSDL 1.1 description model.
//!
//! Documents are parsed elsewhere; this model holds what the operation
//! compiler needs. SOAP extension elements (`soap:binding`, `soap:operation`,
//! `soap:body`, `soap:header`, `soap:fault`, `soap:address`) are kept as raw
//! XML fragments and interpreted lazily by [`crate::binding`].

use typed_builder::TypedBuilder;

use crate::{Direction, QName, WsdlError};

#[derive(Debug, Clone, TypedBuilder)]
pub struct Part {
    #[builder(setter(into))]
    pub name: String,
    #[builder(default, setter(into, strip_option))]
    pub element: Option<QName>,
    #[builder(default, setter(into, strip_option))]
    pub type_name: Option<QName>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct Message {
    pub name: QName,
    #[builder(default)]
    pub parts: Vec<Part>,
}

impl Message {
    pub fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct OperationMessage {
    pub direction: Direction,
    pub message: QName,
    #[builder(default, setter(into, strip_option))]
    pub name: Option<String>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct OperationFault {
    #[builder(setter(into))]
    pub name: String,
    pub message: QName,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct PortTypeOperation {
    #[builder(setter(into))]
    pub name: String,
    /// `input`/`output` in document order.
    #[builder(default)]
    pub messages: Vec<OperationMessage>,
    #[builder(default)]
    pub faults: Vec<OperationFault>,
}

impl PortTypeOperation {
    pub fn order(&self) -> Vec<Direction> {
        self.messages.iter().map(|m| m.direction).collect()
    }

    pub fn message(&self, direction: Direction) -> Option<&OperationMessage> {
        self.messages.iter().find(|m| m.direction == direction)
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct PortType {
    pub name: QName,
    #[builder(default)]
    pub operations: Vec<PortTypeOperation>,
}

#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct BindingMessage {
    #[builder(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct BindingFault {
    #[builder(setter(into))]
    pub name: String,
    #[builder(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct BindingOperation {
    #[builder(setter(into))]
    pub name: String,
    #[builder(default)]
    pub extensions: Vec<String>,
    #[builder(default, setter(strip_option))]
    pub input: Option<BindingMessage>,
    #[builder(default, setter(strip_option))]
    pub output: Option<BindingMessage>,
    #[builder(default)]
    pub faults: Vec<BindingFault>,
}

impl BindingOperation {
    pub fn message(&self, direction: Direction) -> Option<&BindingMessage> {
        match direction {
            Direction::Input => self.input.as_ref(),
            Direction::Output => self.output.as_ref(),
        }
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct Binding {
    pub name: QName,
    pub port_type: QName,
    #[builder(default)]
    pub extensions: Vec<String>,
    #[builder(default)]
    pub operations: Vec<BindingOperation>,
}

impl Binding {
    pub fn operation(&self, name: &str) -> Option<&BindingOperation> {
        self.operations.iter().find(|op| op.name == name)
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct Port {
    #[builder(setter(into))]
    pub name: String,
    pub binding: QName,
    #[builder(default)]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct Service {
    pub name: QName,
    #[builder(default)]
    pub ports: Vec<Port>,
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct Definitions {
    #[builder(setter(into))]
    pub target_namespace: String,
    #[builder(default)]
    pub messages: Vec<Message>,
    #[builder(default)]
    pub port_types: Vec<PortType>,
    #[builder(default)]
    pub bindings: Vec<Binding>,
    #[builder(default)]
    pub services: Vec<Service>,
}

/// Narrows which service, port or binding an operation is taken from.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct OperationLookup {
    #[builder(default, setter(into, strip_option))]
    pub service: Option<QName>,
    #[builder(default, setter(into, strip_option))]
    pub port: Option<String>,
    #[builder(default, setter(into, strip_option))]
    pub binding: Option<QName>,
}

/// The WSDL pieces one operation is assembled from.
#[derive(Debug, Clone)]
pub struct OperationSource<'d> {
    pub service: Option<&'d Service>,
    pub port: Option<&'d Port>,
    pub binding: &'d Binding,
    pub port_type: &'d PortType,
    pub binding_operation: &'d BindingOperation,
    pub port_type_operation: &'d PortTypeOperation,
}

impl Definitions {
    pub fn message(&self, name: &QName) -> Result<&Message, WsdlError> {
        self.messages
            .iter()
            .find(|m| &m.name == name)
            .ok_or_else(|| WsdlError::not_found("message", name))
    }

    pub fn binding(&self, name: &QName) -> Result<&Binding, WsdlError> {
        self.bindings
            .iter()
            .find(|b| &b.name == name)
            .ok_or_else(|| WsdlError::not_found("binding", name))
    }

    pub fn port_type(&self, name: &QName) -> Result<&PortType, WsdlError> {
        self.port_types
            .iter()
            .find(|p| &p.name == name)
            .ok_or_else(|| WsdlError::not_found("portType", name))
    }

    /// Locates the single service/port/binding combination offering `operation`.
    pub fn locate(
        &self,
        operation: &str,
        lookup: &OperationLookup,
    ) -> Result<OperationSource<'_>, WsdlError> {
        let mut candidates: Vec<(Option<&Service>, Option<&Port>, &Binding)> = Vec::new();

        for service in &self.services {
            if lookup.service.as_ref().is_some_and(|s| s != &service.name) {
                continue;
            }
            for port in &service.ports {
                if lookup.port.as_ref().is_some_and(|p| p != &port.name) {
                    continue;
                }
                if lookup.binding.as_ref().is_some_and(|b| b != &port.binding) {
                    continue;
                }
                let binding = self.binding(&port.binding)?;
                if binding.operation(operation).is_some() {
                    candidates.push((Some(service), Some(port), binding));
                }
            }
        }

        // A binding may be used without any service declaring an address for it.
        if candidates.is_empty() && lookup.service.is_none() && lookup.port.is_none() {
            for binding in &self.bindings {
                if lookup.binding.as_ref().is_some_and(|b| b != &binding.name) {
                    continue;
                }
                if binding.operation(operation).is_some() {
                    candidates.push((None, None, binding));
                }
            }
        }

        let (service, port, binding) = match candidates.as_slice() {
            [] => return Err(WsdlError::not_found("operation", operation)),
            [single] => *single,
            many => {
                let options = many
                    .iter()
                    .map(|(s, p, b)| match (s, p) {
                        (Some(s), Some(p)) => format!("{}/{}", s.name, p.name),
                        _ => b.name.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(WsdlError::AmbiguousOperation {
                    operation: operation.to_owned(),
                    candidates: options,
                });
            }
        };

        let port_type = self.port_type(&binding.port_type)?;
        let port_type_operation = port_type
            .operations
            .iter()
            .find(|op| op.name == operation)
            .ok_or_else(|| {
                WsdlError::not_found("portType operation", format!("{}#{operation}", port_type.name))
            })?;
        let binding_operation = binding
            .operation(operation)
            .ok_or_else(|| WsdlError::not_found("binding operation", operation))?;

        Ok(OperationSource {
            service,
            port,
            binding,
            port_type,
            binding_operation,
            port_type_operation,
        })
    }
}
