use std::fmt;

use soapcall_xml::parser::Node;

/// An element (or type) identity: namespace URI plus local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QName {
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }

    pub fn unqualified(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local(&self) -> &str {
        &self.local
    }

    /// Resolves a `prefix:local` attribute value against the in-scope
    /// namespace declarations of `node`.
    pub fn from_prefixed(node: Node<'_, '_>, value: &str) -> Option<Self> {
        match value.split_once(':') {
            Some((prefix, local)) => node
                .lookup_namespace_uri(Some(prefix))
                .map(|ns| QName::new(ns, local)),
            None => Some(QName {
                namespace: node.lookup_namespace_uri(None).map(str::to_owned),
                local: value.to_owned(),
            }),
        }
    }

    /// Whether `node` is an element carrying this name.
    pub fn matches(&self, node: Node<'_, '_>) -> bool {
        node.is_element()
            && node.tag_name().name() == self.local
            && node.tag_name().namespace() == self.namespace.as_deref()
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}
