//! XOP `Include`s and the `multipart/related` packaging around them.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use soapcall_wsdl::SoapVersion;
use soapcall_xml::builder::{Attribute, Element};
use tracing::{debug, instrument, warn};

use crate::SoapError;
use crate::mime::{self, ContentType, MimePart};

pub const XOP_NS: &str = "http://www.w3.org/2004/08/xop/include";
pub const XMIME_NS: &str = "http://www.w3.org/2005/05/xmlmime";
pub const XOP_MEDIA_TYPE: &str = "application/xop+xml";

/// Bytes escaped when a content id is written into a `cid:` URL.
const CID_URL: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// The content id a `cid:` href points at.
pub fn content_id_from_href(href: &str) -> String {
    let encoded = href.strip_prefix("cid:").unwrap_or(href);
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

#[derive(Debug)]
enum Source {
    Bytes(Vec<u8>),
    /// Read on first access, then kept.
    File { path: PathBuf, loaded: OnceLock<Vec<u8>> },
}

/// A binary attachment referenced from the XML by `cid:` URI.
#[derive(Debug)]
pub struct Include {
    content_id: String,
    mime_type: String,
    charset: Option<String>,
    source: Source,
}

impl Include {
    pub fn from_bytes(
        content_id: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            mime_type: mime_type.into(),
            charset: None,
            source: Source::Bytes(bytes.into()),
        }
    }

    /// An attachment whose content is read from `path` when first needed.
    pub fn from_file(
        content_id: impl Into<String>,
        mime_type: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            mime_type: mime_type.into(),
            charset: None,
            source: Source::File {
                path: path.as_ref().to_path_buf(),
                loaded: OnceLock::new(),
            },
        }
    }

    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    /// `cid:` URL of this attachment, as written in `xop:Include/@href`.
    pub fn href(&self) -> String {
        format!("cid:{}", utf8_percent_encode(&self.content_id, CID_URL))
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn content(&self) -> Result<&[u8], SoapError> {
        match &self.source {
            Source::Bytes(bytes) => Ok(bytes),
            Source::File { path, loaded } => {
                if let Some(bytes) = loaded.get() {
                    return Ok(bytes);
                }
                let bytes = std::fs::read(path).map_err(|source| SoapError::Attachment {
                    content_id: self.content_id.clone(),
                    source,
                })?;
                debug!(cid = %self.content_id, path = %path.display(), size = bytes.len(), "attachment loaded");
                Ok(loaded.get_or_init(|| bytes))
            }
        }
    }

    /// The content decoded with the declared charset (UTF-8 when none).
    pub fn as_string(&self) -> Result<String, SoapError> {
        let bytes = self.content()?;
        let charset = self.charset.as_deref().unwrap_or("utf-8");
        match charset.to_ascii_lowercase().as_str() {
            "iso-8859-1" | "latin1" | "us-ascii" => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            "utf-8" | "utf8" => Ok(String::from_utf8_lossy(bytes).into_owned()),
            other => {
                warn!(cid = %self.content_id, charset = other, "unknown charset, decoding as UTF-8");
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }

    pub fn write_to(&self, mut writer: impl Write) -> Result<(), SoapError> {
        let content = self.content()?;
        writer
            .write_all(content)
            .map_err(|source| SoapError::Attachment {
                content_id: self.content_id.clone(),
                source,
            })
    }

    pub fn content_type(&self) -> ContentType {
        let content_type = ContentType::new(&self.mime_type);
        match &self.charset {
            Some(charset) => content_type.with_param("charset", charset),
            None => content_type,
        }
    }

    pub fn to_mime_part(&self) -> Result<MimePart, SoapError> {
        Ok(MimePart::new(self.content()?.to_vec())
            .with_header("Content-Type", self.content_type().to_string())
            .with_header("Content-Transfer-Encoding", "binary")
            .with_header("Content-ID", format!("<{}>", self.content_id)))
    }

    /// `name` carrying an `xop:Include` that points at this attachment.
    pub fn to_xml_reference_node(&self, name: &str, namespace: Option<&str>) -> Element {
        Element::new(name)
            .set_namespace_optional(namespace)
            .add_attribute(Attribute::new_with_namespace(
                "contentType",
                self.mime_type.as_str(),
                Some(XMIME_NS),
            ))
            .add_child(
                Element::new("Include")
                    .set_namespace(XOP_NS)
                    .add_namespace_declaration(XOP_NS, Some("xop"))
                    .add_attribute(Attribute::new("href", self.href())),
            )
    }

    /// Builds an include from a received part. Parts without a usable
    /// `Content-ID` are dropped with a warning.
    pub fn from_mime(part: &MimePart) -> Option<Self> {
        let Some(content_id) = part.content_id() else {
            warn!(content_id = ?part.header("Content-ID"), "MIME part without a valid Content-ID ignored");
            return None;
        };

        let content_type = part.content_type();
        let mime_type = content_type
            .as_ref()
            .map_or("application/octet-stream", |ct| ct.media_type.as_str());

        let mut include = Self::from_bytes(content_id, mime_type, part.body.clone());
        include.charset = content_type
            .as_ref()
            .and_then(|ct| ct.param("charset"))
            .map(str::to_owned);
        Some(include)
    }
}

impl PartialEq for Include {
    fn eq(&self, other: &Self) -> bool {
        self.content_id == other.content_id
            && self.mime_type == other.mime_type
            && self.charset == other.charset
            && matches!((self.content(), other.content()), (Ok(a), Ok(b)) if a == b)
    }
}

/// An outgoing XOP package.
#[derive(Debug, Clone)]
pub struct XopPackage {
    pub content_type: ContentType,
    pub body: Vec<u8>,
}

/// A received message after XOP unpacking.
#[derive(Debug, Default)]
pub struct XopMessage {
    pub root: String,
    pub root_content_type: Option<ContentType>,
    /// Non-root parts by content id.
    pub attachments: HashMap<String, Arc<Include>>,
    pub warnings: Vec<String>,
}

/// Content id of the root part: the first attachment's domain with `xml` as
/// the local part.
pub fn root_content_id(attachments: &[Arc<Include>]) -> String {
    let domain = attachments
        .first()
        .and_then(|include| include.content_id().split_once('@'))
        .map_or("localhost", |(_, domain)| domain);
    format!("xml@{domain}")
}

#[instrument(level = "debug", skip(xml, attachments), fields(attachments = attachments.len()))]
pub fn encode_xop(
    xml: &str,
    version: SoapVersion,
    charset: &str,
    action: Option<&str>,
    attachments: &[Arc<Include>],
) -> Result<XopPackage, SoapError> {
    let root_cid = root_content_id(attachments);
    let boundary = mime::generate_boundary();

    let start_info = match (version, action) {
        (SoapVersion::Soap12, Some(action)) => ContentType::new(version.media_type())
            .with_param("action", action)
            .to_string(),
        _ => version.media_type().to_owned(),
    };

    let root_type = ContentType::new(XOP_MEDIA_TYPE)
        .with_param("charset", charset)
        .with_param("type", &start_info);

    let mut parts = vec![
        MimePart::new(xml.as_bytes().to_vec())
            .with_header("Content-Type", root_type.to_string())
            .with_header("Content-Transfer-Encoding", "8bit")
            .with_header("Content-ID", format!("<{root_cid}>")),
    ];
    for include in attachments {
        parts.push(include.to_mime_part()?);
    }

    let content_type = ContentType::new("multipart/related")
        .with_param("type", XOP_MEDIA_TYPE)
        .with_param("start", format!("<{root_cid}>"))
        .with_param("start-info", start_info)
        .with_param("boundary", &boundary);

    Ok(XopPackage {
        content_type,
        body: mime::encode_multipart(&boundary, &parts),
    })
}

/// Unpacks a `multipart/related` message. The root part is the one named by
/// `start`, or the first part (with a warning) when that cannot be matched.
#[instrument(level = "debug", skip(body), fields(size = body.len()))]
pub fn decode_xop(content_type: &ContentType, body: &[u8]) -> Result<XopMessage, SoapError> {
    let boundary = content_type
        .param("boundary")
        .ok_or_else(|| SoapError::Multipart("no boundary parameter".to_owned()))?;

    let parts = mime::decode_multipart(body, boundary)?;
    let mut warnings = Vec::new();

    let start = content_type
        .param("start")
        .map(|s| s.trim().trim_start_matches('<').trim_end_matches('>'));

    let root_index = match start {
        Some(start) => match parts.iter().position(|p| p.content_id() == Some(start)) {
            Some(index) => index,
            None => {
                let message = format!("start part <{start}> not found, using the first part");
                warn!(start, "start part not found, using the first part");
                warnings.push(message);
                0
            }
        },
        None => {
            warn!("multipart message without start parameter, using the first part");
            warnings.push("no start parameter, using the first part".to_owned());
            0
        }
    };

    let root_part = &parts[root_index];
    let root = String::from_utf8(root_part.body.clone())
        .map_err(|_| SoapError::Multipart("root part is not UTF-8".to_owned()))?;

    let mut attachments = HashMap::new();
    for (index, part) in parts.iter().enumerate() {
        if index == root_index {
            continue;
        }
        match Include::from_mime(part) {
            Some(include) => {
                attachments.insert(include.content_id().to_owned(), Arc::new(include));
            }
            None => warnings.push(format!("part {index} has no valid Content-ID")),
        }
    }

    debug!(root_index, attachments = attachments.len(), "multipart message decoded");
    Ok(XopMessage {
        root,
        root_content_type: root_part.content_type(),
        attachments,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cid_takes_the_first_attachment_domain() {
        let attachments = vec![
            Arc::new(Include::from_bytes("img1@example.org", "image/png", vec![1])),
            Arc::new(Include::from_bytes("img2@other.net", "image/png", vec![2])),
        ];
        assert_eq!(root_content_id(&attachments), "xml@example.org");
        assert_eq!(root_content_id(&[]), "xml@localhost");
    }

    #[test]
    fn reference_node_points_at_cid() {
        let include = Include::from_bytes("pic@x", "image/jpeg", vec![]);
        let xml = include
            .to_xml_reference_node("photo", Some("urn:p"))
            .to_xml_string()
            .unwrap();
        assert!(xml.contains(r#"href="cid:pic@x""#), "{xml}");
        assert!(xml.contains("image/jpeg"), "{xml}");
        assert!(xml.contains(XOP_NS), "{xml}");
    }

    #[test]
    fn as_string_honours_charset() {
        let include = Include::from_bytes("t@x", "text/plain", vec![0x63, 0x61, 0x66, 0xe9])
            .with_charset("ISO-8859-1");
        assert_eq!(include.as_string().unwrap(), "café");
    }

    #[test]
    fn file_content_is_read_once() {
        let path = std::env::temp_dir().join(format!("soapcall-xop-{}", uuid::Uuid::new_v4()));
        std::fs::write(&path, b"payload").unwrap();
        let include = Include::from_file("f@x", "application/octet-stream", &path);
        assert_eq!(include.content().unwrap(), b"payload");
        std::fs::remove_file(&path).unwrap();
        // Still available after the file is gone.
        let mut out = Vec::new();
        include.write_to(&mut out).unwrap();
        assert_eq!(out, b"payload");
    }

    #[test]
    fn missing_file_is_an_attachment_error() {
        let include = Include::from_file("gone@x", "image/png", "/nonexistent/soapcall/file");
        assert!(matches!(include.content(), Err(SoapError::Attachment { .. })));
    }
}
