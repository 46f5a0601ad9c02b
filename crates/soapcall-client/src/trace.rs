use std::fmt::Write;
use std::time::{Duration, SystemTime};

use crate::http::{HttpRequest, HttpResponse};

/// What happened during one call. Filled in phase by phase; a failed call
/// hands back whatever was recorded up to the failure.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub operation: String,
    pub started: Option<SystemTime>,
    pub encode: Option<Duration>,
    /// Building the HTTP request and picking the dispatcher.
    pub connect: Option<Duration>,
    /// Network round trip, or hook dispatch.
    pub transport: Option<Duration>,
    /// Response classification and MIME unpacking.
    pub parse: Option<Duration>,
    pub decode: Option<Duration>,
    pub elapsed: Option<Duration>,
    pub request: Option<HttpRequest>,
    pub response: Option<HttpResponse>,
    pub warnings: Vec<String>,
}

impl Trace {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            started: Some(SystemTime::now()),
            ..Self::default()
        }
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    /// One line per recorded phase.
    pub fn timings(&self) -> String {
        let phases = [
            ("encode", self.encode),
            ("connect", self.connect),
            ("transport", self.transport),
            ("parse", self.parse),
            ("decode", self.decode),
            ("elapsed", self.elapsed),
        ];
        let mut out = String::new();
        for (phase, duration) in phases {
            if let Some(duration) = duration {
                let _ = writeln!(out, "{phase:>9}: {:.3} ms", duration.as_secs_f64() * 1000.0);
            }
        }
        out
    }

    pub fn request_text(&self) -> Option<String> {
        let request = self.request.as_ref()?;
        let mut out = format!("{} {}\n", request.method, request.url);
        render(&mut out, &request.headers, &request.body);
        Some(out)
    }

    pub fn response_text(&self) -> Option<String> {
        let response = self.response.as_ref()?;
        let mut out = format!("HTTP {}\n", response.status);
        render(&mut out, &response.headers, &response.body);
        Some(out)
    }
}

fn render(out: &mut String, headers: &[(String, String)], body: &[u8]) {
    for (name, value) in headers {
        let _ = writeln!(out, "{name}: {value}");
    }
    out.push('\n');
    out.push_str(&String::from_utf8_lossy(body));
}
