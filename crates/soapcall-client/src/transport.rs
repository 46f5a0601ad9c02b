//! One SOAP-over-HTTP exchange: request construction, dispatch, and
//! classification of the response.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use hyper::header::{ACCEPT, CONTENT_TYPE, HOST, USER_AGENT};
use hyper::http::Method;
use soapcall_soap::mime::ContentType;
use soapcall_soap::{EncodedMessage, Include, xop};
use soapcall_wsdl::{OperationKind, SOAP11_ENV_NS, SoapVersion};
use tracing::{debug, info, instrument, warn};

use crate::config::TransportConfig;
use crate::http::{HttpClient, HttpRequest, HttpResponse, TransportHook};
use crate::trace::Trace;
use crate::ureq_client::{UreqHttpClient, default_client};
use crate::{SoapCallError, VERSION};

const SOAP12_ACCEPT: &str = "application/soap+xml, multipart/related, text/*";
/// Extension namespace number used with `M-POST`.
const MPOST_NS: &str = "01";

/// The payload of a reply: the root XML and the other MIME parts by content id.
#[derive(Debug, Default)]
pub struct Received {
    pub content: String,
    pub attachments: HashMap<String, Arc<Include>>,
}

enum Dispatcher {
    Client(Arc<dyn HttpClient>),
    Hook(Arc<dyn TransportHook>),
}

pub struct TransportClient {
    name: String,
    kind: OperationKind,
    version: SoapVersion,
    action: Option<String>,
    endpoint: String,
    method: Method,
    charset: String,
    headers: Vec<(String, String)>,
    dispatcher: Dispatcher,
}

impl std::fmt::Debug for TransportClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportClient")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("version", &self.version)
            .field("endpoint", &self.endpoint)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl TransportClient {
    /// Checks everything that does not depend on the call arguments.
    #[instrument(level = "debug", skip(config))]
    pub fn compile(
        name: &str,
        kind: OperationKind,
        version: SoapVersion,
        action: Option<&str>,
        endpoint: &str,
        config: &TransportConfig,
    ) -> Result<Self, SoapCallError> {
        let mpost = Method::from_bytes(b"M-POST")
            .map_err(|e| SoapCallError::Protocol(e.to_string()))?;

        if config.method == mpost {
            if version != SoapVersion::Soap11 {
                return Err(SoapCallError::Protocol(format!(
                    "M-POST is only defined for SOAP 1.1, not {version}"
                )));
            }
        } else if config.method != Method::POST {
            return Err(SoapCallError::Protocol(format!(
                "HTTP method {} cannot carry SOAP requests",
                config.method
            )));
        }

        let url = url::Url::parse(endpoint)
            .map_err(|e| SoapCallError::Configuration(format!("endpoint '{endpoint}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SoapCallError::Protocol(format!(
                "endpoint '{endpoint}' is not an HTTP URL"
            )));
        }

        let mut headers = Vec::new();
        if let Some(host) = url.host_str() {
            let host = match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_owned(),
            };
            headers.push((HOST.as_str().to_owned(), host));
        }
        if version == SoapVersion::Soap12 {
            headers.push((ACCEPT.as_str().to_owned(), SOAP12_ACCEPT.to_owned()));
        }

        let action_value = format!("\"{}\"", action.unwrap_or_default());
        if config.method == mpost {
            headers.push(("Man".to_owned(), format!("\"{SOAP11_ENV_NS}\"; ns={MPOST_NS}")));
            headers.push((format!("{MPOST_NS}-SOAPAction"), action_value));
        } else {
            headers.push(("SOAPAction".to_owned(), action_value));
        }

        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("soapcall/{VERSION}"));
        headers.push((USER_AGENT.as_str().to_owned(), user_agent));

        if config.version_headers {
            headers.push(("X-Soapcall-Client-Version".to_owned(), VERSION.to_owned()));
            headers.push(("X-Soapcall-Soap-Version".to_owned(), soapcall_soap::VERSION.to_owned()));
            headers.push(("X-Soapcall-Wsdl-Version".to_owned(), soapcall_wsdl::VERSION.to_owned()));
        }
        headers.extend(config.headers.iter().cloned());

        let dispatcher = match (&config.hook, &config.client, config.timeouts) {
            (Some(hook), _, _) => Dispatcher::Hook(Arc::clone(hook)),
            (None, Some(client), _) => Dispatcher::Client(Arc::clone(client)),
            (None, None, Some((connect, read))) => {
                Dispatcher::Client(Arc::new(UreqHttpClient::new(connect, read)))
            }
            (None, None, None) => Dispatcher::Client(default_client()),
        };

        debug!(endpoint, method = %config.method, hook = config.hook.is_some(), "transport compiled");

        Ok(Self {
            name: name.to_owned(),
            kind,
            version,
            action: action.map(str::to_owned),
            endpoint: endpoint.to_owned(),
            method: config.method.clone(),
            charset: config.charset.clone(),
            headers,
            dispatcher,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Sends `message`. For operations without a reply the response body is
    /// never looked at and an empty [`Received`] is returned.
    #[instrument(level = "info", skip_all, fields(operation = %self.name, endpoint = %self.endpoint))]
    pub fn send(&self, message: &EncodedMessage, trace: &mut Trace) -> Result<Received, SoapCallError> {
        let expect_response = self.kind.expects_response();

        let started = Instant::now();
        let request = self.build_request(message)?;
        trace.request = Some(request.clone());
        trace.connect = Some(started.elapsed());

        let started = Instant::now();
        let response = self.dispatch(&request);
        trace.transport = Some(started.elapsed());
        let response = response?;
        trace.response = Some(response.clone());

        let started = Instant::now();
        let received = self.classify(response, expect_response, trace);
        trace.parse = Some(started.elapsed());
        received
    }

    fn build_request(&self, message: &EncodedMessage) -> Result<HttpRequest, SoapCallError> {
        let (content_type, body) = if message.attachments.is_empty() {
            let content_type = match (self.version, &self.action) {
                (SoapVersion::Soap12, Some(action)) => ContentType::new(self.version.media_type())
                    .with_param("charset", &self.charset)
                    .with_param("action", action),
                _ => ContentType::new(self.version.media_type()).with_param("charset", &self.charset),
            };
            (content_type, message.xml.clone().into_bytes())
        } else {
            let package = xop::encode_xop(
                &message.xml,
                self.version,
                &self.charset,
                self.action.as_deref(),
                &message.attachments,
            )?;
            (package.content_type, package.body)
        };

        let mut headers = vec![(CONTENT_TYPE.as_str().to_owned(), content_type.to_string())];
        headers.extend(self.headers.iter().cloned());

        Ok(HttpRequest {
            method: self.method.clone(),
            url: self.endpoint.clone(),
            headers,
            body,
        })
    }

    fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse, SoapCallError> {
        match &self.dispatcher {
            Dispatcher::Hook(hook) => {
                debug!("dispatching through hook");
                let response = hook.dispatch(request).ok_or_else(|| {
                    SoapCallError::Transport("hook returned no response".to_owned())
                })?;
                response.validate()?;
                Ok(response)
            }
            Dispatcher::Client(client) => client
                .send_request(request)
                .map_err(|e| SoapCallError::Transport(format!("{e:#}"))),
        }
    }

    fn classify(
        &self,
        response: HttpResponse,
        expect_response: bool,
        trace: &mut Trace,
    ) -> Result<Received, SoapCallError> {
        if response.is_error() {
            if let Some(warning) = response.header("Client-Warning") {
                return Err(SoapCallError::Transport(format!(
                    "HTTP {} ({warning})",
                    response.status
                )));
            }
            if response.body.is_empty() {
                return Err(SoapCallError::Transport(format!(
                    "HTTP {} with an empty body",
                    response.status
                )));
            }
            warn!(status = response.status, "HTTP error status, parsing the body anyway");
            trace.warn(format!("HTTP status {}, body parsed for a fault", response.status));
        }

        if !expect_response {
            debug!(kind = %self.kind, "no reply expected, body ignored");
            return Ok(Received::default());
        }

        let content_type = response
            .header(CONTENT_TYPE.as_str())
            .map(ContentType::parse)
            .ok_or_else(|| SoapCallError::Parse("response has no Content-Type".to_owned()))?;

        let received = if content_type.is_multipart_related() {
            let message = xop::decode_xop(&content_type, &response.body)?;
            for warning in message.warnings {
                trace.warn(warning);
            }
            Received {
                content: message.root,
                attachments: message.attachments,
            }
        } else if content_type.is_xml() {
            let content = String::from_utf8(response.body)
                .map_err(|_| SoapCallError::Parse("response body is not UTF-8".to_owned()))?;
            Received {
                content,
                attachments: HashMap::new(),
            }
        } else {
            return Err(SoapCallError::Parse(format!(
                "unexpected response content type {}",
                content_type.media_type
            )));
        };

        info!(
            status = response.status,
            size = received.content.len(),
            attachments = received.attachments.len(),
            "response received"
        );
        Ok(received)
    }
}
