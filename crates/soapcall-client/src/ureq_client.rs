use std::io::Read;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tracing::{debug, error, info, info_span, instrument, warn};

use crate::http::{HttpClient, HttpRequest, HttpResponse};

/// Blocking client on a keep-alive `ureq` agent.
pub struct UreqHttpClient {
    agent: ureq::Agent,
}

impl UreqHttpClient {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let mut builder = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout);
        match native_tls::TlsConnector::new() {
            Ok(connector) => builder = builder.tls_connector(Arc::new(connector)),
            Err(e) => warn!(error = %e, "TLS unavailable, only plain HTTP endpoints will work"),
        }
        Self {
            agent: builder.build(),
        }
    }
}

impl Default for UreqHttpClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30), Duration::from_secs(60))
    }
}

fn collect_headers(response: &ureq::Response) -> Vec<(String, String)> {
    response
        .headers_names()
        .iter()
        .filter_map(|name| {
            response
                .header(name)
                .map(|value| (name.clone(), value.to_owned()))
        })
        .collect()
}

fn read_body(response: ureq::Response) -> std::io::Result<Vec<u8>> {
    let mut body = Vec::new();
    response.into_reader().read_to_end(&mut body)?;
    Ok(body)
}

impl HttpClient for UreqHttpClient {
    #[instrument(name = "http_client.send_request", level = "info", skip(self, request), fields(method = %request.method, url = %request.url), err)]
    fn send_request(&self, request: &HttpRequest) -> anyhow::Result<HttpResponse> {
        let span = info_span!("http.request", method = %request.method, url = %request.url);
        let _enter = span.enter();

        let mut ureq_request = self.agent.request(request.method.as_str(), &request.url);
        for (name, value) in &request.headers {
            ureq_request = ureq_request.set(name, value);
        }
        debug!(headers_count = request.headers.len(), body_length = request.body.len(), "request configured");

        let (status, headers, body) = match ureq_request.send_bytes(&request.body) {
            Ok(response) => {
                let status = response.status();
                let headers = collect_headers(&response);
                let body = read_body(response).map_err(|e| {
                    error!(error = %e, "failed to read response body");
                    e
                })?;
                (status, headers, body)
            }
            // Error statuses still carry a response; SOAP faults travel on 500.
            Err(ureq::Error::Status(status, response)) => {
                debug!(status, "received error status");
                let headers = collect_headers(&response);
                let body = read_body(response).unwrap_or_default();
                (status, headers, body)
            }
            Err(e) => {
                error!(error = %e, "request failed");
                return Err(e.into());
            }
        };

        info!(status, response_body_length = body.len(), "response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// The process-wide client used by operations compiled without their own.
///
/// Created on first use and kept for the life of the process so that every
/// operation shares one connection pool.
pub fn default_client() -> Arc<dyn HttpClient> {
    static DEFAULT: OnceLock<Arc<UreqHttpClient>> = OnceLock::new();
    let client = DEFAULT.get_or_init(|| {
        debug!("creating default HTTP client");
        Arc::new(UreqHttpClient::default())
    });
    Arc::clone(client) as Arc<dyn HttpClient>
}
