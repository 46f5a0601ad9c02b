use std::sync::{Arc, OnceLock};

use tracing::{debug, instrument};
use typed_builder::TypedBuilder;

use crate::binding::{self, BindingTable};
use crate::parts::PartSetRequest;
use crate::{
    BindingOperation, Definitions, Direction, HTTP_TRANSPORT, MessagePartSet, OperationKind,
    OperationLookup, PortTypeOperation, QName, SchemaSpace, SoapVersion, Style, WsdlError,
};

/// Caller overrides applied when an operation is taken from a description.
#[derive(Debug, Clone, Default, TypedBuilder)]
pub struct OperationOptions {
    #[builder(default, setter(into, strip_option))]
    pub lookup: Option<OperationLookup>,
    /// Forces the style, whatever the binding fragments declare.
    #[builder(default, setter(strip_option))]
    pub style: Option<Style>,
    #[builder(default, setter(into, strip_option))]
    pub action: Option<String>,
    #[builder(default, setter(strip_option))]
    pub endpoints: Option<Vec<String>>,
    #[builder(default, setter(into, strip_option))]
    pub protocol: Option<String>,
}

/// One named WSDL operation, bound to a port and a SOAP version.
///
/// Immutable once built; `action`, `endpoint_addresses` and `binding_table`
/// are computed on first access and then frozen.
#[derive(Debug)]
pub struct Operation {
    name: String,
    definitions: Arc<Definitions>,
    schema: Arc<SchemaSpace>,
    service: Option<QName>,
    port: Option<String>,
    binding: QName,
    port_type: QName,
    soap_namespace: &'static str,
    soap_version: SoapVersion,
    kind: OperationKind,
    explicit_style: Option<Style>,
    protocol: String,
    action_override: Option<String>,
    endpoint_override: Option<Vec<String>>,
    action: OnceLock<Result<Option<String>, WsdlError>>,
    endpoint_addresses: OnceLock<Result<Vec<String>, WsdlError>>,
    binding_table: OnceLock<Result<BindingTable, WsdlError>>,
}

impl Operation {
    #[instrument(level = "debug", skip(definitions, schema, options))]
    pub fn new(
        definitions: Arc<Definitions>,
        schema: Arc<SchemaSpace>,
        name: &str,
        options: OperationOptions,
    ) -> Result<Self, WsdlError> {
        let lookup = options.lookup.unwrap_or_default();
        let source = definitions.locate(name, &lookup)?;
        let binding_name = source.binding.name.clone();

        let namespace =
            binding::binding_namespace(&source.binding.extensions, &format!("binding {binding_name}"))?
                .ok_or_else(|| WsdlError::NoSoapBinding {
                    operation: name.to_owned(),
                    binding: binding_name.to_string(),
                    namespace: "any SOAP namespace".to_owned(),
                })?;

        let soap_version = SoapVersion::from_wsdl_namespace(&namespace).ok_or_else(|| {
            WsdlError::UnsupportedSoapNamespace {
                binding: binding_name.to_string(),
                namespace: namespace.clone(),
            }
        })?;

        let kind = OperationKind::from_order(&source.port_type_operation.order())
            .ok_or_else(|| WsdlError::NoMessages {
                operation: name.to_owned(),
            })?;

        let explicit_style = match options.style {
            Some(style) => Some(style),
            None => {
                binding::soap_operation(
                    &source.binding_operation.extensions,
                    soap_version.wsdl_namespace(),
                    &format!("operation {name}"),
                )?
                .style
            }
        };

        let service = source.service.map(|s| s.name.clone());
        let port = source.port.map(|p| p.name.clone());
        let port_type = source.port_type.name.clone();

        debug!(
            operation = name,
            %soap_version,
            %kind,
            binding = %binding_name,
            explicit_style = ?explicit_style,
            "operation created"
        );

        Ok(Self {
            name: name.to_owned(),
            service,
            port,
            binding: binding_name,
            port_type,
            soap_namespace: soap_version.wsdl_namespace(),
            soap_version,
            kind,
            explicit_style,
            protocol: options.protocol.unwrap_or_else(|| HTTP_TRANSPORT.to_owned()),
            action_override: options.action,
            endpoint_override: options.endpoints,
            action: OnceLock::new(),
            endpoint_addresses: OnceLock::new(),
            binding_table: OnceLock::new(),
            definitions,
            schema,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> Option<&QName> {
        self.service.as_ref()
    }

    pub fn port(&self) -> Option<&str> {
        self.port.as_deref()
    }

    pub fn binding(&self) -> &QName {
        &self.binding
    }

    pub fn port_type(&self) -> &QName {
        &self.port_type
    }

    pub fn soap_namespace(&self) -> &'static str {
        self.soap_namespace
    }

    pub fn soap_version(&self) -> SoapVersion {
        self.soap_version
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn explicit_style(&self) -> Option<Style> {
        self.explicit_style
    }

    pub fn definitions(&self) -> &Arc<Definitions> {
        &self.definitions
    }

    pub fn schema(&self) -> &Arc<SchemaSpace> {
        &self.schema
    }

    pub fn binding_table(&self) -> Result<&BindingTable, WsdlError> {
        self.binding_table
            .get_or_init(|| {
                let binding = self.definitions.binding(&self.binding)?;
                BindingTable::resolve(
                    &self.name,
                    &self.binding,
                    &binding.extensions,
                    self.soap_namespace,
                )
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// The `soapAction`, from the caller override or the binding's `soap:operation`.
    pub fn action(&self) -> Result<Option<&str>, WsdlError> {
        self.action
            .get_or_init(|| {
                if let Some(action) = &self.action_override {
                    return Ok(Some(action.clone()));
                }
                let (_, binding_operation, _) = self.source()?;
                Ok(binding::soap_operation(
                    &binding_operation.extensions,
                    self.soap_namespace,
                    &format!("operation {}", self.name),
                )?
                .soap_action)
            })
            .as_ref()
            .map(Option::as_deref)
            .map_err(Clone::clone)
    }

    /// Endpoint URIs in declaration order, from the override or the port's `soap:address`.
    pub fn endpoint_addresses(&self) -> Result<&[String], WsdlError> {
        self.endpoint_addresses
            .get_or_init(|| {
                if let Some(endpoints) = &self.endpoint_override {
                    return Ok(endpoints.clone());
                }
                let (Some(service), Some(port)) = (&self.service, &self.port) else {
                    return Ok(Vec::new());
                };
                let port = self
                    .definitions
                    .services
                    .iter()
                    .filter(|s| &s.name == service)
                    .flat_map(|s| s.ports.iter())
                    .find(|p| &p.name == port)
                    .ok_or_else(|| WsdlError::not_found("port", port))?;
                binding::soap_addresses(
                    &port.extensions,
                    self.soap_namespace,
                    &format!("port {}", port.name),
                )
            })
            .as_ref()
            .map(Vec::as_slice)
            .map_err(Clone::clone)
    }

    /// Whether this operation can be carried over `protocol` with `style`.
    pub fn can_transport(&self, protocol: &str, style: Style) -> Result<bool, WsdlError> {
        Ok(self
            .binding_table()?
            .can_transport(protocol, style, self.explicit_style))
    }

    /// The style in effect: the explicit one, else the first declared for the protocol.
    pub fn style(&self) -> Result<Style, WsdlError> {
        if let Some(style) = self.explicit_style {
            return Ok(style);
        }
        Ok(self
            .binding_table()?
            .get(&self.protocol)
            .and_then(|entries| entries.first())
            .map_or(Style::Document, |entry| entry.style))
    }

    /// Namespace of the rpc wrapper element for `direction`.
    pub fn rpc_namespace(&self, direction: Direction) -> Result<String, WsdlError> {
        let (_, binding_operation, _) = self.source()?;
        let extensions = binding_operation
            .message(direction)
            .map_or(&[][..], |m| m.extensions.as_slice());
        let body = binding::soap_body(
            extensions,
            self.soap_namespace,
            &format!("operation {}", self.name),
        )?;
        Ok(body
            .and_then(|b| b.namespace)
            .unwrap_or_else(|| self.definitions.target_namespace.clone()))
    }

    pub fn input_parts(&self) -> Result<MessagePartSet, WsdlError> {
        self.parts(Direction::Input)
    }

    /// Output parts, including the declared faults.
    pub fn output_parts(&self) -> Result<MessagePartSet, WsdlError> {
        self.parts(Direction::Output)
    }

    fn parts(&self, direction: Direction) -> Result<MessagePartSet, WsdlError> {
        let (_, binding_operation, port_type_operation) = self.source()?;

        let message = port_type_operation
            .message(direction)
            .map(|m| self.definitions.message(&m.message))
            .transpose()?;

        let extensions = binding_operation
            .message(direction)
            .map_or(&[][..], |m| m.extensions.as_slice());

        let mut faults = Vec::new();
        if direction == Direction::Output {
            for fault in &port_type_operation.faults {
                let message = self.definitions.message(&fault.message)?;
                let extensions = binding_operation
                    .faults
                    .iter()
                    .find(|f| f.name == fault.name)
                    .map_or(&[][..], |f| f.extensions.as_slice());
                faults.push((message, extensions, fault.name.as_str()));
            }
        }

        PartSetRequest {
            definitions: &self.definitions,
            schema: &self.schema,
            soap_namespace: self.soap_namespace,
            operation: &self.name,
            message,
            extensions,
            faults,
        }
        .build()
    }

    fn source(
        &self,
    ) -> Result<(&crate::Binding, &BindingOperation, &PortTypeOperation), WsdlError> {
        let binding = self.definitions.binding(&self.binding)?;
        let binding_operation = binding
            .operation(&self.name)
            .ok_or_else(|| WsdlError::not_found("binding operation", &self.name))?;
        let port_type_operation = self
            .definitions
            .port_type(&self.port_type)?
            .operations
            .iter()
            .find(|op| op.name == self.name)
            .ok_or_else(|| WsdlError::not_found("portType operation", &self.name))?;
        Ok((binding, binding_operation, port_type_operation))
    }
}
