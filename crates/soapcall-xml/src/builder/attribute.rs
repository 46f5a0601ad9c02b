/// Represents an XML attribute with a name and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The local name of the attribute.
    name: String,
    /// The value of the attribute, unescaped.
    value: String,

    namespace: Option<crate::builder::Namespace>,
}

impl Attribute {
    /// Creates a new instance of `Attribute`.
    ///
    /// # Example
    ///
    /// ```
    /// use soapcall_xml::builder::Attribute;
    /// let attribute = Attribute::new("name", "value");
    /// ```
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
            namespace: None,
        }
    }

    pub fn new_with_namespace(
        name: impl Into<String>,
        value: impl Into<String>,
        namespace: Option<impl Into<crate::builder::Namespace>>,
    ) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
            namespace: namespace.map(Into::into),
        }
    }

    pub fn set_namespace(mut self, namespace: impl Into<crate::builder::Namespace>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn namespace(&self) -> Option<&crate::builder::Namespace> {
        self.namespace.as_ref()
    }

    pub(crate) fn write_with_prefix<W: std::io::Write>(
        &self,
        w: &mut W,
        prefix: Option<&str>,
    ) -> Result<(), crate::builder::XmlBuilderError> {
        let value = crate::builder::escape_attribute(&self.value);
        match prefix {
            Some(prefix) => write!(w, " {prefix}:{}=\"{value}\"", self.name)?,
            None => write!(w, " {}=\"{value}\"", self.name)?,
        }
        Ok(())
    }
}
