use std::fmt;

pub const WSDL_SOAP11_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const WSDL_SOAP12_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
pub const SOAP11_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP12_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";

/// Transport URI used by `soap:binding` for SOAP over HTTP.
pub const HTTP_TRANSPORT: &str = "http://schemas.xmlsoap.org/soap/http";
/// The SOAP 1.2 recommendation's own name for the HTTP binding.
pub const SOAP12_HTTP_TRANSPORT: &str = "http://www.w3.org/2003/05/soap/bindings/HTTP/";

pub fn is_http_transport(uri: &str) -> bool {
    uri == HTTP_TRANSPORT || uri == SOAP12_HTTP_TRANSPORT || uri == "http://schemas.xmlsoap.org/soap/http/"
}

/// Folds the spellings of the HTTP transport onto [`HTTP_TRANSPORT`].
pub fn normalize_transport(uri: &str) -> &str {
    if is_http_transport(uri) {
        HTTP_TRANSPORT
    } else {
        uri
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoapVersion {
    Soap11,
    Soap12,
}

impl SoapVersion {
    /// Maps the namespace of a WSDL `binding` extension element to a SOAP version.
    pub fn from_wsdl_namespace(ns: &str) -> Option<Self> {
        match ns {
            WSDL_SOAP11_NS => Some(Self::Soap11),
            WSDL_SOAP12_NS => Some(Self::Soap12),
            _ => None,
        }
    }

    pub fn from_envelope_namespace(ns: &str) -> Option<Self> {
        match ns {
            SOAP11_ENV_NS => Some(Self::Soap11),
            SOAP12_ENV_NS => Some(Self::Soap12),
            _ => None,
        }
    }

    pub fn wsdl_namespace(self) -> &'static str {
        match self {
            Self::Soap11 => WSDL_SOAP11_NS,
            Self::Soap12 => WSDL_SOAP12_NS,
        }
    }

    pub fn envelope_namespace(self) -> &'static str {
        match self {
            Self::Soap11 => SOAP11_ENV_NS,
            Self::Soap12 => SOAP12_ENV_NS,
        }
    }

    /// Media type of a bare envelope on the wire.
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Soap11 => "text/xml",
            Self::Soap12 => "application/soap+xml",
        }
    }

    /// Conventional prefix for the envelope namespace.
    pub fn envelope_prefix(self) -> &'static str {
        match self {
            Self::Soap11 => "SOAP-ENV",
            Self::Soap12 => "env",
        }
    }
}

impl fmt::Display for SoapVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Soap11 => "SOAP11",
            Self::Soap12 => "SOAP12",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Style {
    Document,
    Rpc,
}

impl Style {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "document" => Some(Self::Document),
            "rpc" => Some(Self::Rpc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Rpc => "rpc",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

/// The four WSDL 1.1 transmission primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    OneWay,
    RequestResponse,
    Notification,
    SolicitResponse,
}

impl OperationKind {
    /// Derives the kind from the order in which `input` and `output` appear
    /// in the portType operation. Only the first two entries matter.
    pub fn from_order(order: &[Direction]) -> Option<Self> {
        match order {
            [Direction::Input] => Some(Self::OneWay),
            [Direction::Output] => Some(Self::Notification),
            [Direction::Input, Direction::Output, ..] => Some(Self::RequestResponse),
            [Direction::Output, Direction::Input, ..] => Some(Self::SolicitResponse),
            _ => None,
        }
    }

    /// Whether a caller of this operation waits for a reply.
    pub fn expects_response(self) -> bool {
        !matches!(self, Self::OneWay | Self::Notification)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneWay => "one-way",
            Self::RequestResponse => "request-response",
            Self::Notification => "notification-operation",
            Self::SolicitResponse => "solicit-response",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
