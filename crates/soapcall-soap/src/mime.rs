//! MIME plumbing for `multipart/related` messages.

use tracing::{debug, trace};

use crate::SoapError;

/// A parsed `Content-Type` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lowercased `type/subtype`.
    pub media_type: String,
    /// Parameters with lowercased names and unquoted values.
    pub params: Vec<(String, String)>,
}

impl ContentType {
    pub fn new(media_type: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into().to_ascii_lowercase(),
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params
            .push((name.into().to_ascii_lowercase(), value.into()));
        self
    }

    pub fn parse(value: &str) -> Self {
        let mut segments = split_unquoted(value, ';').into_iter();
        let media_type = segments
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let params = segments
            .filter_map(|segment| {
                let (name, value) = segment.split_once('=')?;
                Some((name.trim().to_ascii_lowercase(), unquote(value.trim())))
            })
            .collect();

        Self { media_type, params }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_multipart_related(&self) -> bool {
        self.media_type == "multipart/related"
    }

    /// `text/xml`, `application/xml`, `application/soap+xml` and other `+xml` types.
    pub fn is_xml(&self) -> bool {
        matches!(self.media_type.as_str(), "text/xml" | "application/xml")
            || self.media_type.ends_with("+xml")
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.media_type)?;
        for (name, value) in &self.params {
            if needs_quoting(value) {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "; {name}=\"{escaped}\"")?;
            } else {
                write!(f, "; {name}={value}")?;
            }
        }
        Ok(())
    }
}

/// One body part of a multipart message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MimePart {
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl MimePart {
    pub fn new(body: Vec<u8>) -> Self {
        Self {
            headers: Vec::new(),
            body,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.header("Content-Type").map(ContentType::parse)
    }

    /// The `Content-ID` without its angle brackets, when well formed.
    pub fn content_id(&self) -> Option<&str> {
        self.header("Content-ID")?
            .trim()
            .strip_prefix('<')?
            .strip_suffix('>')
            .filter(|cid| !cid.is_empty())
    }
}

/// A fresh boundary string.
pub fn generate_boundary() -> String {
    format!("MIME_boundary-{}", uuid::Uuid::new_v4().simple())
}

pub fn encode_multipart(boundary: &str, parts: &[MimePart]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        write_str(&mut body, "--");
        write_str(&mut body, boundary);
        write_crlf(&mut body);
        for (name, value) in &part.headers {
            write_str(&mut body, name);
            write_str(&mut body, ": ");
            write_str(&mut body, value);
            write_crlf(&mut body);
        }
        write_crlf(&mut body);
        body.extend_from_slice(&part.body);
        write_crlf(&mut body);
    }
    write_str(&mut body, "--");
    write_str(&mut body, boundary);
    write_str(&mut body, "--");
    write_crlf(&mut body);
    body
}

/// Splits a multipart body on `boundary`. Bare LF line endings are accepted.
pub fn decode_multipart(data: &[u8], boundary: &str) -> Result<Vec<MimePart>, SoapError> {
    let delimiter = format!("--{boundary}");
    let inner_delimiter = format!("\n--{boundary}");

    let mut position = find_subsequence(data, delimiter.as_bytes())
        .ok_or_else(|| SoapError::Multipart(format!("boundary '{boundary}' not found")))?;

    let mut parts = Vec::new();
    loop {
        let after = position + delimiter.len();
        if data[after..].starts_with(b"--") {
            break;
        }

        let Some(line_end) = find_subsequence(&data[after..], b"\n").map(|i| after + i + 1) else {
            return Err(SoapError::Multipart("truncated after boundary".to_owned()));
        };

        let Some(next) = find_subsequence(&data[line_end..], inner_delimiter.as_bytes()) else {
            return Err(SoapError::Multipart(
                "missing closing boundary".to_owned(),
            ));
        };

        let mut end = line_end + next;
        if end > line_end && data[end - 1] == b'\r' {
            end -= 1;
        }

        let part = parse_part(&data[line_end..end]);
        trace!(headers = ?part.headers, size = part.body.len(), "multipart part");
        parts.push(part);

        // Skip the LF that starts the inner delimiter.
        position = line_end + next + 1;
    }

    if parts.is_empty() {
        return Err(SoapError::Multipart("message has no parts".to_owned()));
    }

    debug!(parts = parts.len(), "multipart message split");
    Ok(parts)
}

fn parse_part(data: &[u8]) -> MimePart {
    let (header_bytes, body) = if data.starts_with(b"\r\n") {
        (&data[..0], &data[2..])
    } else if data.starts_with(b"\n") {
        (&data[..0], &data[1..])
    } else {
        let crlf = find_subsequence(data, b"\r\n\r\n").map(|i| (i, i + 4));
        let lf = find_subsequence(data, b"\n\n").map(|i| (i, i + 2));
        let split = match (crlf, lf) {
            (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
            (a, b) => a.or(b),
        };
        match split {
            Some((headers_end, body_start)) => (&data[..headers_end], &data[body_start..]),
            None => (data, &data[data.len()..]),
        }
    };

    let text = String::from_utf8_lossy(header_bytes);
    let mut headers: Vec<(String, String)> = Vec::new();
    for line in text.split('\n').map(|l| l.trim_end_matches('\r')) {
        if line.starts_with([' ', '\t']) {
            // Folded continuation of the previous header.
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(line.trim());
            }
        } else if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_owned(), value.trim().to_owned()));
        }
    }

    MimePart {
        headers,
        body: body.to_vec(),
    }
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || "()<>@,;:\\\"/[]?=".contains(c))
}

fn split_unquoted(value: &str, separator: char) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            c if c == separator && !quoted => {
                segments.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    segments.push(&value[start..]);
    segments
}

fn unquote(value: &str) -> String {
    let Some(inner) = value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) else {
        return value.to_owned();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[inline]
fn write_str(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
}

#[inline]
fn write_crlf(buf: &mut Vec<u8>) {
    buf.extend_from_slice(b"\r\n");
}

pub(crate) fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_parameters() {
        let ct = ContentType::parse(
            r#"Multipart/Related; boundary="MIME;b"; type="application/xop+xml"; start="<root@x>"; start-info="text/xml""#,
        );
        assert!(ct.is_multipart_related());
        assert_eq!(ct.param("boundary"), Some("MIME;b"));
        assert_eq!(ct.param("START"), Some("<root@x>"));
        assert_eq!(ct.param("start-info"), Some("text/xml"));
        assert_eq!(ct.param("charset"), None);
    }

    #[test]
    fn content_type_display_quotes_when_needed() {
        let ct = ContentType::new("multipart/related")
            .with_param("type", "application/xop+xml")
            .with_param("boundary", "abc");
        assert_eq!(
            ct.to_string(),
            r#"multipart/related; type="application/xop+xml"; boundary=abc"#
        );
        assert!(ContentType::parse("application/soap+xml; charset=utf-8").is_xml());
        assert!(!ContentType::parse("image/png").is_xml());
    }

    #[test]
    fn multipart_split_with_lf_endings() {
        let body = b"preamble\n--b\nContent-ID: <a@x>\nContent-Type: text/plain\n\nfirst\n--b\nContent-ID: <b@x>\n\nsecond\n--b--\n";
        let parts = decode_multipart(body, "b").unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].content_id(), Some("a@x"));
        assert_eq!(parts[0].body, b"first");
        assert_eq!(parts[1].body, b"second");
    }

    #[test]
    fn multipart_encode_then_split() {
        let parts = vec![
            MimePart::new(b"<x/>".to_vec()).with_header("Content-ID", "<root@x>"),
            MimePart::new(vec![0, 159, 146, 150]).with_header("Content-ID", "<bin@x>"),
        ];
        let encoded = encode_multipart("bnd", &parts);
        assert!(encoded.ends_with(b"--bnd--\r\n"));
        assert_eq!(decode_multipart(&encoded, "bnd").unwrap(), parts);
    }

    #[test]
    fn zero_parts_is_an_error() {
        assert!(matches!(
            decode_multipart(b"--b--\r\n", "b"),
            Err(SoapError::Multipart(_))
        ));
        assert!(matches!(
            decode_multipart(b"no delimiter", "b"),
            Err(SoapError::Multipart(_))
        ));
    }

    #[test]
    fn folded_headers_are_joined() {
        let part = parse_part(b"Content-Type: application/xop+xml;\r\n\ttype=\"text/xml\"\r\n\r\nbody");
        assert_eq!(
            part.header("content-type"),
            Some("application/xop+xml; type=\"text/xml\"")
        );
        assert_eq!(part.body, b"body");
    }
}
