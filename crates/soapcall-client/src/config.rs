use std::sync::Arc;
use std::time::Duration;

use hyper::http::Method;
use soapcall_soap::ElementCodec;
use typed_builder::TypedBuilder;

use crate::http::{HttpClient, TransportHook};

#[derive(Clone, TypedBuilder)]
pub struct TransportConfig {
    /// `POST`, or `M-POST` for SOAP 1.1 servers requiring the HTTP Extension Framework.
    #[builder(default = Method::POST)]
    pub method: Method,
    #[builder(default = "utf-8".to_owned(), setter(into))]
    pub charset: String,
    /// Overrides the endpoint addresses of the operation.
    #[builder(default, setter(into, strip_option))]
    pub endpoint: Option<String>,
    /// Defaults to the shared process-wide client.
    #[builder(default, setter(strip_option))]
    pub client: Option<Arc<dyn HttpClient>>,
    #[builder(default, setter(strip_option))]
    pub hook: Option<Arc<dyn TransportHook>>,
    /// `(connect, read)`; a dedicated client is created when set.
    #[builder(default, setter(strip_option))]
    pub timeouts: Option<(Duration, Duration)>,
    #[builder(default)]
    pub headers: Vec<(String, String)>,
    #[builder(default, setter(into, strip_option))]
    pub user_agent: Option<String>,
    /// Send `X-Soapcall-*-Version` headers.
    #[builder(default = true)]
    pub version_headers: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("method", &self.method)
            .field("charset", &self.charset)
            .field("endpoint", &self.endpoint)
            .field("client", &self.client.is_some())
            .field("hook", &self.hook.is_some())
            .field("timeouts", &self.timeouts)
            .field("headers", &self.headers)
            .field("user_agent", &self.user_agent)
            .field("version_headers", &self.version_headers)
            .finish()
    }
}

#[derive(Clone, Default, TypedBuilder)]
pub struct CompileOptions {
    #[builder(default)]
    pub transport: TransportConfig,
    /// Element codec; structural mapping when absent.
    #[builder(default, setter(strip_option))]
    pub codec: Option<Arc<dyn ElementCodec>>,
    /// Send `Include` values as XOP attachments.
    #[builder(default = false)]
    pub mtom: bool,
    /// Header parts sent with `mustUnderstand`.
    #[builder(default)]
    pub must_understand: Vec<String>,
}

impl std::fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompileOptions")
            .field("transport", &self.transport)
            .field("codec", &self.codec.is_some())
            .field("mtom", &self.mtom)
            .field("must_understand", &self.must_understand)
            .finish()
    }
}
