use hyper::header::{HeaderName, HeaderValue};
use hyper::http::{Method, StatusCode};

use crate::SoapCallError;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_u16(self.status).ok()
    }

    pub fn is_error(&self) -> bool {
        self.status_code()
            .is_some_and(|s| s.is_client_error() || s.is_server_error())
    }

    /// Rejects responses no HTTP server could have sent.
    pub(crate) fn validate(&self) -> Result<(), SoapCallError> {
        if self.status_code().is_none() {
            return Err(SoapCallError::Transport(format!(
                "malformed response: status {}",
                self.status
            )));
        }
        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                SoapCallError::Transport(format!("malformed response: header name '{name}'"))
            })?;
            HeaderValue::from_str(value).map_err(|_| {
                SoapCallError::Transport(format!("malformed response: value of header '{name}'"))
            })?;
        }
        Ok(())
    }
}

/// Sends requests over the network. Implementations are shared between
/// calls and threads.
pub trait HttpClient: Send + Sync {
    fn send_request(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse>;
}

/// Replaces network dispatch, typically in tests or offline replay.
///
/// `None` means no response was produced.
pub trait TransportHook: Send + Sync {
    fn dispatch(&self, request: &HttpRequest) -> Option<HttpResponse>;
}

impl<F> TransportHook for F
where
    F: Fn(&HttpRequest) -> Option<HttpResponse> + Send + Sync,
{
    fn dispatch(&self, request: &HttpRequest) -> Option<HttpResponse> {
        self(request)
    }
}

fn find_header<'h>(headers: &'h [(String, String)], name: &str) -> Option<&'h str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
