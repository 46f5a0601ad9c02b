use crate::builder::{AliasMap, Declaration, Element, NamespaceWrite, XmlBuilderError};

/// A whole document: optional prologue plus the root element.
pub struct Builder {
    declaration: Option<Declaration>,
    element: Element,
}

impl Builder {
    /// ```
    /// use soapcall_xml::builder::{Builder, Declaration, Element};
    /// let builder = Builder::new(Some(Declaration::new("1.0", "UTF-8")), Element::new("root"));
    /// assert_eq!(
    ///     builder.to_xml_string().unwrap(),
    ///     r#"<?xml version="1.0" encoding="UTF-8"?><root/>"#
    /// );
    /// ```
    pub fn new(declaration: Option<Declaration>, element: Element) -> Self {
        Builder {
            declaration,
            element,
        }
    }

    pub fn write_to<W: std::io::Write>(&self, mut w: W) -> Result<(), XmlBuilderError> {
        if let Some(decl) = &self.declaration {
            decl.write(&mut w)?;
        }
        self.element.ns_write(&mut w, &AliasMap::new())
    }

    pub fn to_xml_string(&self) -> Result<String, XmlBuilderError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
