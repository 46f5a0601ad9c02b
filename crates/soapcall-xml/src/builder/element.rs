use crate::builder::{AliasMap, Attribute, Namespace, NamespaceWrite, XmlBuilderError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Represents a text content within an XML element.
    Text(String),
    /// Represents child elements within an XML element.
    Elements(Vec<Element>),

    None,
}

/// Represents an XML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// The local name of the element.
    name: String,
    /// The namespace the element belongs to.
    namespace: Option<Namespace>,
    /// Namespace declarations (`xmlns:alias="url"`) made on this element.
    declarations: Vec<(Namespace, Option<String>)>,
    /// The attributes of the element.
    attributes: Vec<Attribute>,
    /// The content of the element.
    content: Content,
}

impl Element {
    /// Creates a new instance of `Element` with the given name.
    ///
    /// # Example
    ///
    /// ```
    /// use soapcall_xml::builder::Element;
    /// let element = Element::new("root");
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            namespace: None,
            declarations: Vec::new(),
            attributes: Vec::new(),
            content: Content::None,
        }
    }

    /// Puts the element in a namespace and returns the modified `Element`.
    ///
    /// # Example
    ///
    /// ```
    /// use soapcall_xml::builder::{Element, Namespace};
    /// let element = Element::new("root")
    ///     .set_namespace(Namespace::new("http://example.com"));
    /// ```
    pub fn set_namespace(mut self, namespace: impl Into<Namespace>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn set_namespace_optional(mut self, namespace: Option<impl Into<Namespace>>) -> Self {
        self.namespace = namespace.map(Into::into);
        self
    }

    /// Declares `url` under `alias` on this element. `None` declares the default namespace.
    pub fn add_namespace_declaration(
        mut self,
        url: impl Into<String>,
        alias: Option<impl Into<String>>,
    ) -> Self {
        self.declarations
            .push((Namespace::new(url), alias.map(Into::into)));
        self
    }

    /// Adds an attribute to the element and returns a modified `Element`.
    ///
    /// # Example
    ///
    /// ```
    /// use soapcall_xml::builder::{Element, Attribute};
    /// let element = Element::new("root")
    ///     .add_attribute(Attribute::new("attr1", "value1"));
    /// ```
    pub fn add_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds a child element. Any text content previously set is replaced.
    pub fn add_child(mut self, child: Element) -> Self {
        match self.content {
            Content::None | Content::Text(_) => {
                self.content = Content::Elements(vec![child]);
            }
            Content::Elements(ref mut children) => {
                children.push(child);
            }
        }
        self
    }

    pub fn add_children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        for child in children {
            self = self.add_child(child);
        }
        self
    }

    /// Sets the text content of the element, replacing any children.
    pub fn set_text(mut self, text: impl Into<String>) -> Self {
        self.content = Content::Text(text.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        self.namespace.as_ref()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name() == name)
            .map(Attribute::value)
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn children(&self) -> &[Element] {
        match &self.content {
            Content::Elements(children) => children,
            _ => &[],
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn to_xml_string(&self) -> Result<String, XmlBuilderError> {
        crate::builder::Builder::new(None, self.clone()).to_xml_string()
    }
}

/// Finds the prefix bound to `ns` in `scope`, declaring a fresh one on the
/// element being written when the namespace is not yet in scope.
fn resolve_prefix(
    scope: &mut AliasMap,
    extra: &mut Vec<(Namespace, Option<String>)>,
    ns: &Namespace,
    allow_default: bool,
) -> Option<String> {
    match scope.get(ns) {
        Some(Some(alias)) => return Some(alias.clone()),
        Some(None) if allow_default => return None,
        _ => {}
    }

    let mut counter = scope.len();
    let alias = loop {
        let candidate = format!("ns{counter}");
        if !scope.values().any(|a| a.as_deref() == Some(candidate.as_str())) {
            break candidate;
        }
        counter += 1;
    };

    scope.insert(ns.clone(), Some(alias.clone()));
    extra.push((ns.clone(), Some(alias.clone())));
    Some(alias)
}

impl NamespaceWrite for Element {
    fn ns_write<W: std::io::Write>(
        &self,
        w: &mut W,
        aliases: &AliasMap,
    ) -> Result<(), XmlBuilderError> {
        let mut scope = aliases.clone();
        let mut declarations = Vec::with_capacity(self.declarations.len());

        for (ns, alias) in &self.declarations {
            // Another prefix for the same URI shadows the inherited one.
            scope.retain(|url, a| url != ns && a != alias);
            scope.insert(ns.clone(), alias.clone());
            declarations.push((ns.clone(), alias.clone()));
        }

        // An unqualified element must not inherit a default namespace.
        let mut reset_default = false;
        if self.namespace.is_none() && scope.values().any(Option::is_none) {
            scope.retain(|_, alias| alias.is_some());
            reset_default = true;
        }

        let prefix = self
            .namespace
            .as_ref()
            .and_then(|ns| resolve_prefix(&mut scope, &mut declarations, ns, true));

        let attribute_prefixes = self
            .attributes
            .iter()
            .map(|attr| {
                attr.namespace()
                    .and_then(|ns| resolve_prefix(&mut scope, &mut declarations, ns, false))
            })
            .collect::<Vec<_>>();

        let name = match &prefix {
            Some(prefix) => format!("{prefix}:{}", self.name),
            None => self.name.clone(),
        };

        write!(w, "<{name}")?;

        if reset_default {
            write!(w, " xmlns=\"\"")?;
        }

        for (ns, alias) in &declarations {
            let url = crate::builder::escape_attribute(&ns.url);
            match alias {
                Some(alias) => write!(w, " xmlns:{alias}=\"{url}\"")?,
                None => write!(w, " xmlns=\"{url}\"")?,
            }
        }

        for (attribute, prefix) in self.attributes.iter().zip(&attribute_prefixes) {
            attribute.write_with_prefix(w, prefix.as_deref())?;
        }

        match &self.content {
            Content::None => write!(w, "/>")?,
            Content::Text(value) => {
                write!(w, ">{}</{name}>", crate::builder::escape_text(value))?;
            }
            Content::Elements(children) => {
                write!(w, ">")?;
                for child in children {
                    child.ns_write(w, &scope)?;
                }
                write!(w, "</{name}>")?;
            }
        }

        Ok(())
    }
}
