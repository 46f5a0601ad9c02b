use core::fmt;

/// Represents a namespace in XML, identified by its URI only.
///
/// Prefixes are a serialization concern: they are assigned by the element
/// declaring the namespace, or generated while writing when nothing in scope
/// declares it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    pub url: String,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}

impl Namespace {
    /// Creates a new instance of `Namespace` with the given URI.
    ///
    /// # Example
    ///
    /// ```
    /// use soapcall_xml::builder::Namespace;
    /// let namespace = Namespace::new("http://example.com");
    /// assert_eq!(namespace.url, "http://example.com");
    /// ```
    pub fn new(uri: impl Into<String>) -> Self {
        Namespace { url: uri.into() }
    }
}

impl From<&str> for Namespace {
    fn from(value: &str) -> Self {
        Namespace::new(value)
    }
}

impl From<String> for Namespace {
    fn from(value: String) -> Self {
        Namespace::new(value)
    }
}
