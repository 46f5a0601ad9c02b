//! Compiled SOAP operations over HTTP.
//!
//! [`compile_operation`] resolves everything static about an operation once:
//! parts, envelope handlers, endpoint, action and transport. The resulting
//! [`CompiledOperation`] only encodes, sends and decodes on each call.

pub mod config;
pub mod http;
pub mod operation;
pub mod trace;
pub mod transport;
pub mod ureq_client;

pub use config::{CompileOptions, TransportConfig};
pub use http::{HttpClient, HttpRequest, HttpResponse, TransportHook};
pub use operation::{CallError, CompiledOperation, compile_operation};
pub use trace::Trace;
pub use transport::{Received, TransportClient};
pub use ureq_client::{UreqHttpClient, default_client};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What went wrong, as far as a caller deciding whether to retry cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Protocol,
    Transport,
    Parse,
}

#[derive(Debug, thiserror::Error)]
pub enum SoapCallError {
    #[error(transparent)]
    Wsdl(#[from] soapcall_wsdl::WsdlError),

    #[error(transparent)]
    Soap(#[from] soapcall_soap::SoapError),

    /// Any failure while turning a received reply into values.
    #[error("cannot decode reply: {0}")]
    Decode(#[source] soapcall_soap::SoapError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("protocol not supported: {0}")]
    Protocol(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("cannot parse response: {0}")]
    Parse(String),
}

impl SoapCallError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Wsdl(_) | Self::Configuration(_) => ErrorKind::Configuration,
            Self::Soap(e) if e.is_parse_error() => ErrorKind::Parse,
            Self::Soap(_) => ErrorKind::Configuration,
            Self::Protocol(_) => ErrorKind::Protocol,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Parse(_) | Self::Decode(_) => ErrorKind::Parse,
        }
    }

    /// Only transport failures may go away when the call is repeated.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}
