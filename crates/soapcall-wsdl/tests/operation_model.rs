use std::sync::Arc;

use soapcall_wsdl::{
    Binding, BindingMessage, BindingOperation, Definitions, Direction, HTTP_TRANSPORT, Message,
    Operation, OperationKind, OperationMessage, OperationOptions, Part, Port, PortType,
    PortTypeOperation, QName, SchemaSpace, Service, SoapVersion, Style, WSDL_SOAP11_NS,
    WSDL_SOAP12_NS, WsdlError,
};
use tracing_test::traced_test;

const TNS: &str = "urn:example:stock";
const XSD: &str = "http://www.w3.org/2001/XMLSchema";

fn q(local: &str) -> QName {
    QName::new(TNS, local)
}

fn ext(soap_ns: &str, body: &str) -> String {
    format!(r#"<soap:{body} xmlns:soap="{soap_ns}" xmlns:tns="{TNS}"/>"#)
}

fn messages() -> Vec<Message> {
    vec![
        Message::builder()
            .name(q("GetQuoteIn"))
            .parts(vec![
                Part::builder().name("auth").element(q("Auth")).build(),
                Part::builder().name("symbol").element(q("Symbol")).build(),
            ])
            .build(),
        Message::builder()
            .name(q("GetQuoteOut"))
            .parts(vec![
                Part::builder()
                    .name("price")
                    .type_name(QName::new(XSD, "decimal"))
                    .build(),
            ])
            .build(),
        Message::builder()
            .name(q("QuoteFault"))
            .parts(vec![Part::builder().name("problem").element(q("Problem")).build()])
            .build(),
    ]
}

fn port_type_operation(name: &str, order: &[Direction]) -> PortTypeOperation {
    let messages = order
        .iter()
        .map(|direction| {
            let message = match direction {
                Direction::Input => q("GetQuoteIn"),
                Direction::Output => q("GetQuoteOut"),
            };
            OperationMessage::builder()
                .direction(*direction)
                .message(message)
                .build()
        })
        .collect();

    PortTypeOperation::builder()
        .name(name)
        .messages(messages)
        .faults(vec![soapcall_wsdl::OperationFault::builder()
            .name("QuoteFault")
            .message(q("QuoteFault"))
            .build()])
        .build()
}

fn definitions(soap_ns: &str, binding_ext: &str) -> Definitions {
    let header = ext(soap_ns, r#"header message="tns:GetQuoteIn" part="auth" use="literal""#);
    let body = ext(soap_ns, r#"body use="literal""#);

    let orders: [(&str, &[Direction]); 4] = [
        ("GetQuote", &[Direction::Input, Direction::Output]),
        ("Publish", &[Direction::Input]),
        ("Announce", &[Direction::Output]),
        ("Poll", &[Direction::Output, Direction::Input]),
    ];

    let binding_operations = orders
        .iter()
        .map(|(name, _)| {
            BindingOperation::builder()
                .name(*name)
                .extensions(vec![ext(soap_ns, r#"operation soapAction="urn:example:GetQuote""#)])
                .input(BindingMessage::builder().extensions(vec![header.clone(), body.clone()]).build())
                .output(BindingMessage::builder().extensions(vec![body.clone()]).build())
                .build()
        })
        .collect();

    Definitions::builder()
        .target_namespace(TNS)
        .messages(messages())
        .port_types(vec![PortType::builder()
            .name(q("StockPortType"))
            .operations(
                orders
                    .iter()
                    .map(|(name, order)| port_type_operation(name, order))
                    .collect(),
            )
            .build()])
        .bindings(vec![Binding::builder()
            .name(q("StockBinding"))
            .port_type(q("StockPortType"))
            .extensions(vec![ext(soap_ns, binding_ext)])
            .operations(binding_operations)
            .build()])
        .services(vec![Service::builder()
            .name(q("StockService"))
            .ports(vec![Port::builder()
                .name("StockPort")
                .binding(q("StockBinding"))
                .extensions(vec![
                    ext(soap_ns, r#"address location="http://stock.example.com/quote""#),
                    ext(soap_ns, r#"address location="http://backup.example.com/quote""#),
                ])
                .build()])
            .build()])
        .build()
}

fn operation(defs: Definitions, name: &str) -> Result<Operation, WsdlError> {
    Operation::new(
        Arc::new(defs),
        Arc::new(SchemaSpace::new()),
        name,
        OperationOptions::default(),
    )
}

const DOCUMENT_BINDING: &str =
    r#"binding style="document" transport="http://schemas.xmlsoap.org/soap/http""#;

#[test]
fn kinds_follow_input_output_order() {
    let cases = [
        ("GetQuote", OperationKind::RequestResponse),
        ("Publish", OperationKind::OneWay),
        ("Announce", OperationKind::Notification),
        ("Poll", OperationKind::SolicitResponse),
    ];
    for (name, kind) in cases {
        let op = operation(definitions(WSDL_SOAP11_NS, DOCUMENT_BINDING), name).unwrap();
        assert_eq!(op.kind(), kind, "{name}");
    }
}

#[test]
fn rpc_is_not_transportable_over_document_only_binding() {
    let op = operation(definitions(WSDL_SOAP11_NS, DOCUMENT_BINDING), "GetQuote").unwrap();
    assert_eq!(op.explicit_style(), None);
    assert!(!op.can_transport(HTTP_TRANSPORT, Style::Rpc).unwrap());
    assert!(op.can_transport(HTTP_TRANSPORT, Style::Document).unwrap());
    assert_eq!(op.style().unwrap(), Style::Document);
}

#[test]
fn explicit_style_wins() {
    let op = Operation::new(
        Arc::new(definitions(WSDL_SOAP11_NS, DOCUMENT_BINDING)),
        Arc::new(SchemaSpace::new()),
        "GetQuote",
        OperationOptions::builder().style(Style::Rpc).build(),
    )
    .unwrap();
    assert!(op.can_transport(HTTP_TRANSPORT, Style::Rpc).unwrap());
    assert!(!op.can_transport(HTTP_TRANSPORT, Style::Document).unwrap());
}

#[test]
fn lazy_fields_come_from_the_binding_and_port() {
    let op = operation(definitions(WSDL_SOAP12_NS, DOCUMENT_BINDING), "GetQuote").unwrap();
    assert_eq!(op.soap_version(), SoapVersion::Soap12);
    assert_eq!(op.action().unwrap(), Some("urn:example:GetQuote"));
    assert_eq!(
        op.endpoint_addresses().unwrap(),
        ["http://stock.example.com/quote", "http://backup.example.com/quote"]
    );
    // Frozen after first access.
    assert!(std::ptr::eq(
        op.binding_table().unwrap(),
        op.binding_table().unwrap()
    ));
}

#[test]
fn lazy_fields_are_computed_once_across_threads() {
    let op = operation(definitions(WSDL_SOAP11_NS, DOCUMENT_BINDING), "GetQuote").unwrap();
    let op = &op;

    let tables: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(move || op.binding_table().unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert!(tables.iter().all(|table| std::ptr::eq(*table, tables[0])));
    assert!(std::ptr::eq(tables[0], op.binding_table().unwrap()));
}

#[test]
fn overrides_replace_derived_values() {
    let op = Operation::new(
        Arc::new(definitions(WSDL_SOAP11_NS, DOCUMENT_BINDING)),
        Arc::new(SchemaSpace::new()),
        "GetQuote",
        OperationOptions::builder()
            .action("urn:override")
            .endpoints(vec!["http://localhost:8080/".to_owned()])
            .build(),
    )
    .unwrap();
    assert_eq!(op.action().unwrap(), Some("urn:override"));
    assert_eq!(op.endpoint_addresses().unwrap(), ["http://localhost:8080/"]);
}

#[test]
fn unsupported_binding_namespace_is_rejected() {
    let err = operation(
        definitions("http://schemas.xmlsoap.org/wsdl/http/", DOCUMENT_BINDING),
        "GetQuote",
    )
    .unwrap_err();
    assert!(matches!(err, WsdlError::UnsupportedSoapNamespace { .. }));
}

#[test]
fn unknown_operation_is_not_found() {
    let err = operation(definitions(WSDL_SOAP11_NS, DOCUMENT_BINDING), "Nope").unwrap_err();
    assert!(matches!(err, WsdlError::NotFound { kind: "operation", .. }));
}

#[test]
fn parts_split_between_header_and_body() {
    let op = operation(definitions(WSDL_SOAP11_NS, DOCUMENT_BINDING), "GetQuote").unwrap();

    let input = op.input_parts().unwrap();
    assert_eq!(input.header.len(), 1);
    assert_eq!(input.header[0].name, "auth");
    assert_eq!(input.body.len(), 1);
    assert_eq!(input.body[0].element, q("Symbol"));
    assert!(input.fault.is_empty());

    let output = op.output_parts().unwrap();
    assert_eq!(output.body[0].element, q("price"));
    assert_eq!(output.fault.get("QuoteFault"), Some(&q("Problem")));

    // Compiling again must not conflict with the synthesized `price` element.
    let again = op.output_parts().unwrap();
    assert_eq!(output, again);
    assert!(op.schema().get(&q("price")).unwrap().synthesized);
}

#[test]
fn header_without_part_names_the_message() {
    let mut defs = definitions(WSDL_SOAP11_NS, DOCUMENT_BINDING);
    defs.bindings[0].operations[0].input = Some(
        BindingMessage::builder()
            .extensions(vec![ext(
                WSDL_SOAP11_NS,
                r#"header message="tns:GetQuoteIn" use="literal""#,
            )])
            .build(),
    );
    let op = operation(defs, "GetQuote").unwrap();
    let err = op.input_parts().unwrap_err();
    assert_eq!(
        err,
        WsdlError::MissingHeaderAttribute {
            message: format!("{{{TNS}}}GetQuoteIn"),
            attribute: "part",
        }
    );
}

#[test]
fn rpc_namespace_defaults_to_target_namespace() {
    let op = operation(definitions(WSDL_SOAP11_NS, DOCUMENT_BINDING), "GetQuote").unwrap();
    assert_eq!(op.rpc_namespace(Direction::Input).unwrap(), TNS);
}

#[test]
#[traced_test]
fn part_selection_is_logged() {
    let op = operation(definitions(WSDL_SOAP11_NS, DOCUMENT_BINDING), "GetQuote").unwrap();
    op.input_parts().unwrap();
    assert!(logs_contain("operation created"));
    assert!(logs_contain("message parts selected"));
}
