use std::sync::Arc;
use std::time::Instant;

use soapcall_soap::{
    Answer, ElementCodec, EnvelopeCompiler, EnvelopeHandlers, GenericCodec, Include, Record,
};
use soapcall_wsdl::{Direction, Operation, OperationKind, SoapVersion, Style, is_http_transport};
use tracing::{debug, info, instrument};

use crate::config::CompileOptions;
use crate::trace::Trace;
use crate::transport::TransportClient;
use crate::SoapCallError;

/// A failed call, with the trace recorded up to the failure.
#[derive(Debug, thiserror::Error)]
#[error("{operation}: {error}")]
pub struct CallError {
    pub operation: String,
    #[source]
    pub error: SoapCallError,
    pub trace: Trace,
}

/// An operation ready to be called. Holds no per-call state, so one instance
/// can serve concurrent callers.
#[derive(Debug)]
pub struct CompiledOperation {
    name: String,
    kind: OperationKind,
    version: SoapVersion,
    style: Style,
    request: EnvelopeHandlers,
    reply: EnvelopeHandlers,
    transport: TransportClient,
}

/// Resolves parts, envelopes and transport for `operation`. Every
/// configuration or protocol problem surfaces here, before any network access.
#[instrument(level = "info", skip_all, fields(operation = operation.name()))]
pub fn compile_operation(
    operation: &Operation,
    options: &CompileOptions,
) -> Result<CompiledOperation, SoapCallError> {
    let protocol = operation.protocol();
    if !is_http_transport(protocol) {
        return Err(SoapCallError::Protocol(format!(
            "transport {protocol} is not supported"
        )));
    }

    let style = operation.style()?;
    if !operation.can_transport(protocol, style)? {
        return Err(SoapCallError::Protocol(format!(
            "binding {} does not carry {style} over {protocol}",
            operation.binding()
        )));
    }

    let codec: Arc<dyn ElementCodec> = options
        .codec
        .clone()
        .unwrap_or_else(|| Arc::new(GenericCodec::new()));

    let kind = operation.kind();
    let version = operation.soap_version();

    let (request_namespace, reply_namespace) = match style {
        Style::Rpc => (
            Some(operation.rpc_namespace(Direction::Input)?),
            Some(operation.rpc_namespace(Direction::Output)?),
        ),
        Style::Document => (None, None),
    };

    let request = EnvelopeCompiler::builder()
        .version(version)
        .style(style)
        .operation(operation.name())
        .mtom(options.mtom)
        .must_understand(options.must_understand.clone())
        .build()
        .with_rpc_namespace(request_namespace);
    let reply = EnvelopeCompiler::builder()
        .version(version)
        .style(style)
        .operation(format!("{}Response", operation.name()))
        .tolerate_empty(!kind.expects_response())
        .build()
        .with_rpc_namespace(reply_namespace);

    let request = request.compile(&operation.input_parts()?, codec.as_ref())?;
    let reply = reply.compile(&operation.output_parts()?, codec.as_ref())?;

    let endpoint = match &options.transport.endpoint {
        Some(endpoint) => endpoint.clone(),
        None => operation
            .endpoint_addresses()?
            .first()
            .cloned()
            .ok_or_else(|| {
                SoapCallError::Configuration(format!(
                    "operation {} has no endpoint address",
                    operation.name()
                ))
            })?,
    };

    let transport = TransportClient::compile(
        operation.name(),
        kind,
        version,
        operation.action()?,
        &endpoint,
        &options.transport,
    )?;

    info!(%kind, %version, %style, endpoint = %endpoint, "operation compiled");
    Ok(CompiledOperation {
        name: operation.name().to_owned(),
        kind,
        version,
        style,
        request,
        reply,
        transport,
    })
}

impl CompiledOperation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn soap_version(&self) -> SoapVersion {
        self.version
    }

    pub fn style(&self) -> Style {
        self.style
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Calls the operation. A fault reply is a successful call whose
    /// [`Answer`] carries the fault.
    pub fn call(&self, args: &Record) -> Result<(Answer, Trace), CallError> {
        self.call_with_attachments(args, &[])
    }

    /// Like [`CompiledOperation::call`], sending `attachments` as extra MIME
    /// parts next to the ones collected from the arguments.
    pub fn call_with_attachments(
        &self,
        args: &Record,
        attachments: &[Arc<Include>],
    ) -> Result<(Answer, Trace), CallError> {
        let mut trace = Trace::new(&self.name);
        match self.execute(args, attachments, &mut trace) {
            Ok(answer) => Ok((answer, trace)),
            Err(error) => Err(CallError {
                operation: self.name.clone(),
                error,
                trace,
            }),
        }
    }

    /// Calls the operation, recording into a caller-owned trace.
    pub fn call_with_trace(&self, args: &Record, trace: &mut Trace) -> Result<Answer, SoapCallError> {
        self.execute(args, &[], trace)
    }

    #[instrument(level = "info", skip_all, fields(operation = %self.name))]
    fn execute(
        &self,
        args: &Record,
        attachments: &[Arc<Include>],
        trace: &mut Trace,
    ) -> Result<Answer, SoapCallError> {
        let started = Instant::now();
        if trace.operation.is_empty() {
            trace.operation.clone_from(&self.name);
        }

        let phase = Instant::now();
        let mut message = self.request.encode(args)?;
        message.attachments.extend(attachments.iter().cloned());
        trace.encode = Some(phase.elapsed());

        let result = self.transport.send(&message, trace).and_then(|received| {
            if !self.kind.expects_response() {
                return Ok(Answer::default());
            }
            let phase = Instant::now();
            let answer = self
                .reply
                .decode(&received.content, &received.attachments)
                .map_err(SoapCallError::Decode);
            trace.decode = Some(phase.elapsed());
            answer
        });
        trace.elapsed = Some(started.elapsed());

        if let Ok(answer) = &result {
            debug!(fault = answer.is_fault(), parts = answer.parts.len(), "call finished");
        }
        result
    }
}
