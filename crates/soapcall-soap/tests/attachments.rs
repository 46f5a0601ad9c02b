use std::collections::HashMap;
use std::sync::Arc;

use soapcall_soap::mime::ContentType;
use soapcall_soap::xop::{self, XOP_NS};
use soapcall_soap::{EnvelopeCompiler, GenericCodec, Include, Record, SoapError, Value};
use soapcall_wsdl::{MessagePartSet, PartRef, QName, SoapVersion};
use tracing_test::traced_test;

const TNS: &str = "urn:example:stock";

fn resource(name: &str) -> Vec<u8> {
    let path = format!("{}/tests/resources/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read(&path).unwrap_or_else(|e| panic!("{path}: {e}"))
}

fn chart_parts() -> MessagePartSet {
    MessagePartSet {
        body: vec![PartRef {
            name: "chart".to_owned(),
            element: QName::new(TNS, "Chart"),
        }],
        ..MessagePartSet::default()
    }
}

fn content_type(start: Option<&str>) -> ContentType {
    let ct = ContentType::new("multipart/related")
        .with_param("type", "application/xop+xml")
        .with_param("boundary", "MIME_b");
    match start {
        Some(start) => ct.with_param("start", start),
        None => ct,
    }
}

#[test]
#[traced_test]
fn start_parameter_selects_the_root() {
    let message = xop::decode_xop(
        &content_type(Some("<root@stock.example.com>")),
        &resource("chart_response.multipart"),
    )
    .unwrap();

    assert!(message.root.contains("soap:Envelope"));
    assert_eq!(
        message.root_content_type.as_ref().map(|ct| ct.media_type.as_str()),
        Some("application/xop+xml")
    );
    // The part with a malformed Content-ID is dropped with a warning.
    assert_eq!(message.attachments.len(), 1);
    assert_eq!(message.warnings.len(), 1);
    assert!(logs_contain("MIME part without a valid Content-ID ignored"));

    let handlers = EnvelopeCompiler::builder()
        .version(SoapVersion::Soap11)
        .build()
        .compile(&chart_parts(), &GenericCodec::new())
        .unwrap();
    let answer = handlers.decode(&message.root, &message.attachments).unwrap();
    let chart = answer.get("chart").and_then(Value::as_include).unwrap();
    assert_eq!(chart.mime_type(), "image/png");
    assert_eq!(chart.content().unwrap(), b"PNGDATA");
}

#[test]
#[traced_test]
fn missing_start_falls_back_to_the_first_part() {
    let message = xop::decode_xop(&content_type(None), &resource("chart_response.multipart")).unwrap();
    assert!(message.root.contains("soap:Envelope"));
    assert!(message.warnings.iter().any(|w| w.contains("first part")));
    assert!(logs_contain("using the first part"));
}

#[test]
#[traced_test]
fn unmatched_start_falls_back_to_the_first_part() {
    let message = xop::decode_xop(
        &content_type(Some("<nowhere@stock.example.com>")),
        &resource("chart_response.multipart"),
    )
    .unwrap();
    assert!(message.root.contains("soap:Envelope"));
    assert!(logs_contain("start part not found"));
}

#[test]
fn missing_boundary_is_a_parse_error() {
    let err = xop::decode_xop(
        &ContentType::parse("multipart/related; type=\"application/xop+xml\""),
        &resource("chart_response.multipart"),
    )
    .unwrap_err();
    assert!(matches!(err, SoapError::Multipart(_)));
    assert!(err.is_parse_error());
}

#[test]
fn mtom_request_packs_attachments_after_the_root() {
    let handlers = EnvelopeCompiler::builder()
        .version(SoapVersion::Soap12)
        .mtom(true)
        .build()
        .compile(&chart_parts(), &GenericCodec::new())
        .unwrap();

    let chart = Include::from_bytes("chart@stock.example.com", "image/png", b"\x89PNG".to_vec());
    let encoded = handlers
        .encode(&Record::new().with("chart", chart))
        .unwrap();
    assert_eq!(encoded.attachments.len(), 1);
    assert!(encoded.xml.contains(XOP_NS));

    let package = xop::encode_xop(
        &encoded.xml,
        SoapVersion::Soap12,
        "UTF-8",
        Some("urn:example:Chart"),
        &encoded.attachments,
    )
    .unwrap();
    assert_eq!(package.content_type.param("start"), Some("<xml@stock.example.com>"));
    assert_eq!(
        package.content_type.param("start-info"),
        Some(r#"application/soap+xml; action="urn:example:Chart""#)
    );

    // What goes out must come back in.
    let received = xop::decode_xop(&package.content_type, &package.body).unwrap();
    assert!(received.warnings.is_empty());
    assert_eq!(received.root, encoded.xml);

    let answer = handlers.decode(&received.root, &received.attachments).unwrap();
    let chart = answer.get("chart").and_then(Value::as_include).unwrap();
    assert_eq!(chart.content().unwrap(), b"\x89PNG");
}

#[test]
fn unresolved_reference_fails_decoding() {
    let handlers = EnvelopeCompiler::builder()
        .version(SoapVersion::Soap11)
        .build()
        .compile(&chart_parts(), &GenericCodec::new())
        .unwrap();
    let message = xop::decode_xop(
        &content_type(Some("<root@stock.example.com>")),
        &resource("chart_response.multipart"),
    )
    .unwrap();

    let empty: HashMap<String, Arc<Include>> = HashMap::new();
    assert!(matches!(
        handlers.decode(&message.root, &empty),
        Err(SoapError::UnresolvedInclude(cid)) if cid == "chart@stock.example.com"
    ));
}
