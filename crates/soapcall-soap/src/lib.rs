//! SOAP 1.1 / 1.2 envelopes for compiled WSDL operations.
//!
//! [`envelope::EnvelopeCompiler`] turns a [`soapcall_wsdl::MessagePartSet`]
//! into a matched encode/decode pair; faults of either SOAP version are
//! normalized into [`fault::SoapFault`]. Binary content travels as XOP
//! [`xop::Include`]s inside `multipart/related` messages ([`mime`]).

pub mod codec;
pub mod envelope;
pub mod fault;
pub mod mime;
pub mod value;
pub mod xop;

pub use codec::{DecodeContext, ElementCodec, EncodeContext, GenericCodec, Reader, Writer};
pub use envelope::{Answer, EncodedMessage, EnvelopeCompiler, EnvelopeHandlers};
pub use fault::{FaultCode, SoapFault};
pub use value::{Record, Value};
pub use xop::Include;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, thiserror::Error)]
pub enum SoapError {
    #[error("XML error: {0}")]
    Xml(#[from] soapcall_xml::XmlError),

    #[error("XML builder error: {0}")]
    XmlBuilder(#[from] soapcall_xml::builder::XmlBuilderError),

    #[error(transparent)]
    Wsdl(#[from] soapcall_wsdl::WsdlError),

    #[error("not a SOAP envelope: {0}")]
    NotAnEnvelope(String),

    #[error("received a {found} envelope, expected {expected}")]
    VersionMismatch {
        expected: soapcall_wsdl::SoapVersion,
        found: soapcall_wsdl::SoapVersion,
    },

    #[error("envelope has no Body")]
    MissingBody,

    #[error("empty response where a reply was expected")]
    EmptyResponse,

    #[error("no value for body part '{0}'")]
    MissingArgument(String),

    #[error("cannot handle {element}: {reason}")]
    Codec { element: String, reason: String },

    #[error("unresolved xop:Include reference 'cid:{0}'")]
    UnresolvedInclude(String),

    #[error("malformed multipart message: {0}")]
    Multipart(String),

    #[error("attachment {content_id}: {source}")]
    Attachment {
        content_id: String,
        #[source]
        source: std::io::Error,
    },
}

impl SoapError {
    /// Whether the error comes from the received message rather than from
    /// the operation's definition or the caller's arguments.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::Xml(_)
                | Self::NotAnEnvelope(_)
                | Self::VersionMismatch { .. }
                | Self::MissingBody
                | Self::EmptyResponse
                | Self::UnresolvedInclude(_)
                | Self::Multipart(_)
        )
    }
}
