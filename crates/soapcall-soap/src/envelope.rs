//! Compiles a message part set into an encode/decode pair for one direction.

use std::collections::HashMap;
use std::sync::Arc;

use soapcall_wsdl::{MessagePartSet, QName, SoapVersion, Style};
use soapcall_xml::builder::{Attribute, Builder, Declaration, Element};
use soapcall_xml::parser::{self, Node};
use tracing::{debug, instrument, trace, warn};
use typed_builder::TypedBuilder;

use crate::codec::{self, DecodeContext, ElementCodec, EncodeContext, Reader, Writer};
use crate::fault::{self, SoapFault};
use crate::{Include, Record, SoapError, Value};

/// A serialized envelope and the attachments its `xop:Include`s point at.
#[derive(Debug, Clone)]
pub struct EncodedMessage {
    pub xml: String,
    pub attachments: Vec<Arc<Include>>,
}

/// A decoded reply: header and body parts by part name, and the fault if
/// the body carried one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Answer {
    pub parts: Record,
    pub fault: Option<SoapFault>,
}

impl Answer {
    pub fn is_fault(&self) -> bool {
        self.fault.is_some()
    }

    pub fn get(&self, part: &str) -> Option<&Value> {
        self.parts.get(part)
    }
}

type EncodeFn = Box<dyn Fn(&Record) -> Result<EncodedMessage, SoapError> + Send + Sync>;
type DecodeFn =
    Box<dyn Fn(&str, &HashMap<String, Arc<Include>>) -> Result<Answer, SoapError> + Send + Sync>;

/// The compiled pair. Both are immutable and safe to share between threads.
pub struct EnvelopeHandlers {
    encode: EncodeFn,
    decode: DecodeFn,
}

impl EnvelopeHandlers {
    pub fn encode(&self, args: &Record) -> Result<EncodedMessage, SoapError> {
        (self.encode)(args)
    }

    pub fn decode(
        &self,
        xml: &str,
        attachments: &HashMap<String, Arc<Include>>,
    ) -> Result<Answer, SoapError> {
        (self.decode)(xml, attachments)
    }
}

impl std::fmt::Debug for EnvelopeHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvelopeHandlers").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct EnvelopeCompiler {
    version: SoapVersion,
    #[builder(default = Style::Document)]
    style: Style,
    /// Name of the rpc wrapper element written on encode.
    #[builder(default, setter(into))]
    operation: String,
    #[builder(default, setter(into, strip_option))]
    rpc_namespace: Option<String>,
    /// Send binary values as XOP attachments.
    #[builder(default = false)]
    mtom: bool,
    /// Accept an empty reply, or an envelope without a Body.
    #[builder(default = false)]
    tolerate_empty: bool,
    /// Header parts flagged `mustUnderstand`.
    #[builder(default)]
    must_understand: Vec<String>,
}

struct CompiledPart {
    name: String,
    element: QName,
    writer: Writer,
    reader: Reader,
}

struct Compiled {
    config: EnvelopeCompiler,
    header: Vec<CompiledPart>,
    body: Vec<CompiledPart>,
    faults: Vec<CompiledPart>,
}

impl EnvelopeCompiler {
    #[must_use]
    pub fn with_rpc_namespace(mut self, namespace: Option<String>) -> Self {
        self.rpc_namespace = namespace;
        self
    }

    #[instrument(level = "debug", skip_all, fields(version = %self.version, style = %self.style, operation = %self.operation))]
    pub fn compile(
        &self,
        parts: &MessagePartSet,
        codec: &dyn ElementCodec,
    ) -> Result<EnvelopeHandlers, SoapError> {
        let compile = |name: &str, element: &QName| -> Result<CompiledPart, SoapError> {
            Ok(CompiledPart {
                name: name.to_owned(),
                element: element.clone(),
                writer: codec.compile_writer(element)?,
                reader: codec.compile_reader(element)?,
            })
        };

        let header = parts
            .header
            .iter()
            .chain(&parts.headerfault)
            .map(|p| compile(&p.name, &p.element))
            .collect::<Result<Vec<_>, _>>()?;
        let body = parts
            .body
            .iter()
            .map(|p| compile(&p.name, &p.element))
            .collect::<Result<Vec<_>, _>>()?;
        let faults = parts
            .fault
            .iter()
            .map(|(name, element)| compile(name, element))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            header = header.len(),
            body = body.len(),
            faults = faults.len(),
            "envelope compiled"
        );

        let header_count = parts.header.len();
        let compiled = Arc::new(Compiled {
            config: self.clone(),
            header,
            body,
            faults,
        });

        let encoder = Arc::clone(&compiled);
        let decoder = compiled;
        Ok(EnvelopeHandlers {
            encode: Box::new(move |args: &Record| encoder.encode(args, header_count)),
            decode: Box::new(move |xml: &str, attachments: &HashMap<String, Arc<Include>>| {
                decoder.decode(xml, attachments)
            }),
        })
    }
}

impl Compiled {
    fn encode(&self, args: &Record, header_count: usize) -> Result<EncodedMessage, SoapError> {
        let config = &self.config;
        let version = config.version;
        let env_ns = version.envelope_namespace();
        let mut ctx = EncodeContext::new(version, config.mtom);

        let mut headers = Vec::new();
        for part in &self.header[..header_count] {
            let Some(value) = args.get(&part.name) else {
                trace!(part = %part.name, "no value for header part");
                continue;
            };
            let flagged = config.must_understand.contains(&part.name);
            for occurrence in value.occurrences() {
                let mut element = (part.writer)(occurrence, &mut ctx)?;
                if flagged {
                    let flag = match version {
                        SoapVersion::Soap11 => "1",
                        SoapVersion::Soap12 => "true",
                    };
                    element = element.add_attribute(Attribute::new_with_namespace(
                        "mustUnderstand",
                        flag,
                        Some(env_ns),
                    ));
                }
                headers.push(element);
            }
        }

        let mut body_children = Vec::new();
        for part in &self.body {
            let value = args
                .get(&part.name)
                .ok_or_else(|| SoapError::MissingArgument(part.name.clone()))?;
            for occurrence in value.occurrences() {
                let element = match config.style {
                    // rpc accessors are named after the part and unqualified.
                    Style::Rpc => codec::write_value(&part.name, None, occurrence, &mut ctx)?,
                    Style::Document => (part.writer)(occurrence, &mut ctx)?,
                };
                body_children.push(element);
            }
        }

        for key in args.keys() {
            if !self.header.iter().chain(&self.body).any(|p| p.name == key) {
                warn!(argument = key, "argument does not match any message part");
            }
        }

        let mut body = Element::new("Body").set_namespace(env_ns);
        body = match config.style {
            Style::Rpc => body.add_child(
                Element::new(config.operation.as_str())
                    .set_namespace_optional(config.rpc_namespace.as_deref())
                    .add_children(body_children),
            ),
            Style::Document => body.add_children(body_children),
        };

        let mut envelope = Element::new("Envelope")
            .set_namespace(env_ns)
            .add_namespace_declaration(env_ns, Some(version.envelope_prefix()));
        if !headers.is_empty() {
            envelope = envelope.add_child(
                Element::new("Header")
                    .set_namespace(env_ns)
                    .add_children(headers),
            );
        }
        envelope = envelope.add_child(body);

        let xml = Builder::new(Some(Declaration::new("1.0", "UTF-8")), envelope).to_xml_string()?;
        let attachments = ctx.into_attachments();
        debug!(size = xml.len(), attachments = attachments.len(), "envelope encoded");
        Ok(EncodedMessage { xml, attachments })
    }

    fn decode(
        &self,
        xml: &str,
        attachments: &HashMap<String, Arc<Include>>,
    ) -> Result<Answer, SoapError> {
        let config = &self.config;
        if xml.trim().is_empty() {
            return if config.tolerate_empty {
                Ok(Answer::default())
            } else {
                Err(SoapError::EmptyResponse)
            };
        }

        let document = parser::parse(xml)?;
        let root = document.root_element();
        let found = root
            .tag_name()
            .namespace()
            .and_then(SoapVersion::from_envelope_namespace)
            .filter(|_| root.tag_name().name() == "Envelope")
            .ok_or_else(|| {
                SoapError::NotAnEnvelope(format!(
                    "root element is {{{}}}{}",
                    root.tag_name().namespace().unwrap_or_default(),
                    root.tag_name().name()
                ))
            })?;
        let env_ns = found.envelope_namespace();
        let ctx = DecodeContext::new(attachments);
        let mut answer = Answer::default();

        let child_named =
            |local: &str| parser::element_children(root).find(|n| parser::is_named(*n, Some(env_ns), local));

        let Some(body) = child_named("Body") else {
            return if config.tolerate_empty {
                Ok(answer)
            } else {
                Err(SoapError::MissingBody)
            };
        };

        // A server may answer a VersionMismatch fault in its own version.
        let fault_node =
            parser::element_children(body).find(|n| parser::is_named(*n, Some(env_ns), "Fault"));
        if found != config.version && fault_node.is_none() {
            return Err(SoapError::VersionMismatch {
                expected: config.version,
                found,
            });
        }

        if let Some(header) = child_named("Header") {
            for child in parser::element_children(header) {
                match self.header.iter().find(|p| p.element.matches(child)) {
                    Some(part) => answer.parts.append(part.name.clone(), (part.reader)(child, &ctx)?),
                    None => {
                        trace!(element = child.tag_name().name(), "undeclared header passed through");
                        answer
                            .parts
                            .append(child.tag_name().name(), codec::read_value(child, &ctx)?);
                    }
                }
            }
        }

        if let Some(fault_node) = fault_node {
            answer.fault = Some(self.decode_fault(fault_node, found, &ctx)?);
            return Ok(answer);
        }

        let children: Vec<Node<'_, '_>> = match config.style {
            Style::Rpc => parser::element_children(body)
                .next()
                .map(|wrapper| parser::element_children(wrapper).collect())
                .unwrap_or_default(),
            Style::Document => parser::element_children(body).collect(),
        };

        for child in children {
            let declared = match config.style {
                Style::Rpc => self.body.iter().find(|p| p.name == child.tag_name().name()),
                Style::Document => self.body.iter().find(|p| p.element.matches(child)),
            };
            match declared {
                Some(part) if config.style == Style::Document => {
                    answer.parts.append(part.name.clone(), (part.reader)(child, &ctx)?);
                }
                Some(part) => {
                    answer.parts.append(part.name.clone(), codec::read_value(child, &ctx)?);
                }
                None => {
                    trace!(element = child.tag_name().name(), "undeclared body element passed through");
                    answer
                        .parts
                        .append(child.tag_name().name(), codec::read_value(child, &ctx)?);
                }
            }
        }

        Ok(answer)
    }

    fn decode_fault(
        &self,
        node: Node<'_, '_>,
        version: SoapVersion,
        ctx: &DecodeContext<'_>,
    ) -> Result<SoapFault, SoapError> {
        let fields = fault::parse_fault(node, version)?;
        let raw = match codec::read_value(node, ctx)? {
            Value::Record(record) => record,
            _ => Record::new(),
        };

        let mut name = None;
        let mut detail = Record::new();
        if let Some(detail_node) = fields.detail {
            for child in parser::element_children(detail_node) {
                match self.faults.iter().find(|p| p.element.matches(child)) {
                    Some(part) => {
                        name.get_or_insert_with(|| part.name.clone());
                        detail.append(part.name.clone(), (part.reader)(child, ctx)?);
                    }
                    None => detail.append(child.tag_name().name(), codec::read_value(child, ctx)?),
                }
            }
        }

        let fault = fields.into_fault(version, name, detail, raw);
        debug!(name = %fault.name, code = ?fault.code, reason = %fault.reason, "fault decoded");
        Ok(fault)
    }
}
