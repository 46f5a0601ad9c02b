use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tracing::{debug, trace};

use crate::{QName, WsdlError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDecl {
    pub name: QName,
    pub type_name: Option<QName>,
    /// Created from a message part which only declared a `type`.
    pub synthesized: bool,
}

/// Registry of element declarations visible to the element codecs.
///
/// Shared between the operations compiled from one description. Registration
/// is idempotent so that compiling the same operation twice is harmless.
#[derive(Debug, Default)]
pub struct SchemaSpace {
    elements: RwLock<HashMap<QName, ElementDecl>>,
}

impl SchemaSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an element. Repeating an identical declaration is a no-op;
    /// declaring the same name with another type is an error.
    pub fn declare(&self, decl: ElementDecl) -> Result<(), WsdlError> {
        let mut elements = self.elements.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = elements.get(&decl.name) {
            if existing.type_name == decl.type_name {
                trace!(element = %decl.name, "element already declared");
                return Ok(());
            }
            return Err(WsdlError::ConflictingElement {
                element: decl.name.to_string(),
                existing: describe(existing.type_name.as_ref()),
                requested: describe(decl.type_name.as_ref()),
            });
        }

        debug!(element = %decl.name, synthesized = decl.synthesized, "declaring element");
        elements.insert(decl.name.clone(), decl);
        Ok(())
    }

    pub fn get(&self, name: &QName) -> Option<ElementDecl> {
        self.elements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.elements
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn describe(type_name: Option<&QName>) -> String {
    type_name.map_or_else(|| "(anonymous)".to_owned(), ToString::to_string)
}
