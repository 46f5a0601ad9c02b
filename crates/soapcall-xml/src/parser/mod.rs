pub use roxmltree::*;

use crate::XmlError;

pub fn parse(xml: &str) -> Result<Document<'_>, XmlError> {
    Ok(roxmltree::Document::parse(xml)?)
}

/// Visits a node (or a run of sibling nodes) and accumulates a value.
pub trait XmlVisitor<'a> {
    type Value;

    fn visit_node(&mut self, node: Node<'a, 'a>) -> Result<(), XmlError>;

    fn visit_children(
        &mut self,
        children: impl Iterator<Item = Node<'a, 'a>>,
    ) -> Result<(), XmlError> {
        for child in children {
            self.visit_node(child)?;
        }
        Ok(())
    }

    fn finish(self) -> Result<Self::Value, XmlError>;
}

pub struct NodeDeserializer<'a> {
    root: Node<'a, 'a>,
}

impl<'a> NodeDeserializer<'a> {
    pub fn new(root: Node<'a, 'a>) -> Self {
        Self { root }
    }

    /// Drive any visitor over the subtree rooted at `self.root`
    pub fn deserialize<V>(self, mut visitor: V) -> Result<V::Value, XmlError>
    where
        V: XmlVisitor<'a>,
    {
        visitor.visit_node(self.root)?;
        visitor.finish()
    }
}

/// Concatenated text of the direct text children of `node`.
pub fn text_of(node: Node<'_, '_>) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect()
}

/// Element children only, skipping whitespace, comments and processing instructions.
pub fn element_children<'a, 'input>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(Node::is_element)
}

pub fn is_named(node: Node<'_, '_>, namespace: Option<&str>, local: &str) -> bool {
    node.is_element() && node.tag_name().name() == local && node.tag_name().namespace() == namespace
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NameCollector {
        names: Vec<String>,
    }

    impl<'a> XmlVisitor<'a> for NameCollector {
        type Value = Vec<String>;

        fn visit_node(&mut self, node: Node<'a, 'a>) -> Result<(), XmlError> {
            if node.is_element() {
                self.names.push(node.tag_name().name().to_owned());
            }
            Ok(())
        }

        fn finish(self) -> Result<Self::Value, XmlError> {
            Ok(self.names)
        }
    }

    #[test]
    fn test_visitor_over_children() {
        let doc = parse("<r><a/>text<b/><!-- c --><c/></r>").unwrap();
        let mut visitor = NameCollector { names: vec![] };
        visitor.visit_children(doc.root_element().children()).unwrap();
        assert_eq!(visitor.finish().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(matches!(
            parse("<open>"),
            Err(XmlError::ParserError(_))
        ));
    }
}
