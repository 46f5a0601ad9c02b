//! Owned XML element builder.
//!
//! Elements own their names and text so that trees can be assembled from
//! dynamic data and handed between threads. Namespaces are tracked by URI and
//! prefixes are resolved while writing.
mod attribute;
mod builder;
mod declaration;
mod element;
mod namespace;

use std::borrow::Cow;
use std::collections::HashMap;

pub use self::attribute::*;
pub use self::builder::*;
pub use self::declaration::*;
pub use self::element::*;
pub use self::namespace::*;

/// Namespace URI to prefix. A `None` prefix is the default namespace.
pub type AliasMap = HashMap<Namespace, Option<String>>;

#[derive(Debug, thiserror::Error)]
pub enum XmlBuilderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

pub trait NamespaceWrite {
    fn ns_write<W: std::io::Write>(
        &self,
        w: &mut W,
        aliases: &AliasMap,
    ) -> Result<(), XmlBuilderError>;
}

pub fn escape_text(value: &str) -> Cow<'_, str> {
    // A raw CR would be normalized to LF by any reader.
    if !value.contains(['&', '<', '>', '\r']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\r' => escaped.push_str("&#13;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    if !value.contains(['&', '<', '>', '"', '\t', '\n', '\r']) {
        return Cow::Borrowed(value);
    }

    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\t' => escaped.push_str("&#9;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_xml() {
        let element = Element::new("root");

        let builder = Builder::new(None, element);
        let xml_string = builder.to_xml_string().unwrap();
        assert_eq!(xml_string, "<root/>");
    }

    #[test]
    fn test_xml_with_attributes() {
        let element = Element::new("root").add_attribute(Attribute::new("attr1", "value1"));

        let xml_string = element.to_xml_string().unwrap();
        assert_eq!(xml_string, r#"<root attr1="value1"/>"#);
    }

    #[test]
    fn test_line_breaks_survive_a_reparse() {
        let element = Element::new("root")
            .add_attribute(Attribute::new("note", "a\tb\r\nc"))
            .set_text("one\r\ntwo\rthree");

        let xml_string = element.to_xml_string().unwrap();
        assert_eq!(
            xml_string,
            r#"<root note="a&#9;b&#13;&#10;c">one&#13;
two&#13;three</root>"#
        );

        let doc = crate::parser::parse(&xml_string).unwrap();
        let root = doc.root_element();
        assert_eq!(root.attribute("note"), Some("a\tb\r\nc"));
        assert_eq!(crate::parser::text_of(root), "one\r\ntwo\rthree");
    }

    #[test]
    fn test_xml_with_declared_namespace() {
        let element = Element::new("root")
            .set_namespace(Namespace::new("http://example.com/ns1"))
            .add_namespace_declaration("http://example.com/ns1", Some("ns1"));

        let xml_string = element.to_xml_string().unwrap();
        assert_eq!(
            xml_string,
            r#"<ns1:root xmlns:ns1="http://example.com/ns1"/>"#
        );
    }

    #[test]
    fn test_child_inherits_parent_prefix() {
        let child = Element::new("child").set_namespace("http://example.com/ns1");
        let element = Element::new("root")
            .set_namespace("http://example.com/ns1")
            .add_namespace_declaration("http://example.com/ns1", Some("a"))
            .add_child(child);

        let xml_string = element.to_xml_string().unwrap();
        assert_eq!(
            xml_string,
            r#"<a:root xmlns:a="http://example.com/ns1"><a:child/></a:root>"#
        );
    }

    #[test]
    fn test_undeclared_namespace_gets_generated_prefix() {
        let child = Element::new("child").set_namespace("urn:other");
        let element = Element::new("root").add_child(child);

        let xml_string = element.to_xml_string().unwrap();
        assert_eq!(
            xml_string,
            r#"<root><ns0:child xmlns:ns0="urn:other"/></root>"#
        );

        let doc = crate::parser::parse(&xml_string).unwrap();
        let child = doc.root_element().first_element_child().unwrap();
        assert_eq!(child.tag_name().namespace(), Some("urn:other"));
    }

    #[test]
    fn test_unqualified_child_resets_default_namespace() {
        let element = Element::new("root")
            .set_namespace("urn:default")
            .add_namespace_declaration("urn:default", None::<String>)
            .add_child(Element::new("plain"));

        let xml_string = element.to_xml_string().unwrap();
        assert_eq!(
            xml_string,
            r#"<root xmlns="urn:default"><plain xmlns=""/></root>"#
        );
    }

    #[test]
    fn test_full_xml_document() {
        let declaration = Declaration::new("1.0", "UTF-8").with_standalone(true);
        let child = Element::new("child")
            .set_namespace(Namespace::new("http://example.com/ns2"))
            .add_attribute(Attribute::new("attr2", "value2"));
        let element = Element::new("root")
            .set_namespace(Namespace::new("http://example.com/ns1"))
            .add_namespace_declaration("http://example.com/ns1", Some("ns1"))
            .add_namespace_declaration("http://example.com/ns2", Some("ns2"))
            .add_attribute(Attribute::new("attr1", "value1"))
            .add_child(child);

        let builder = Builder::new(Some(declaration), element);
        let xml_string = builder.to_xml_string().unwrap();
        assert!(xml_string.starts_with(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#));
        assert!(xml_string.contains(r#"xmlns:ns1="http://example.com/ns1""#));
        assert!(xml_string.contains(r#"xmlns:ns2="http://example.com/ns2""#));
        assert!(xml_string.contains(r#"<ns2:child attr2="value2"/>"#));
        assert!(xml_string.ends_with("</ns1:root>"));
    }

    #[test]
    fn test_text_and_attributes_are_escaped() {
        let element = Element::new("message")
            .add_attribute(Attribute::new("q", r#"a "b" & c"#))
            .set_text("1 < 2 & 3 > 2");

        let xml_string = element.to_xml_string().unwrap();
        assert_eq!(
            xml_string,
            r#"<message q="a &quot;b&quot; &amp; c">1 &lt; 2 &amp; 3 &gt; 2</message>"#
        );
    }

    #[test]
    fn test_setting_text_overwrites_children() {
        let element = Element::new("container")
            .add_child(Element::new("item"))
            .set_text("New text");

        assert_eq!(
            element.to_xml_string().unwrap(),
            "<container>New text</container>"
        );
    }

    #[test]
    fn test_namespaced_attribute() {
        let element = Element::new("Header")
            .set_namespace("urn:env")
            .add_namespace_declaration("urn:env", Some("env"))
            .add_attribute(Attribute::new("mustUnderstand", "1").set_namespace("urn:env"));

        assert_eq!(
            element.to_xml_string().unwrap(),
            r#"<env:Header xmlns:env="urn:env" env:mustUnderstand="1"/>"#
        );
    }
}
