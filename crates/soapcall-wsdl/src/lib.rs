//! WSDL 1.1 operation model for SOAP clients.
//!
//! Resolves, for one named operation, the SOAP version, transport, style and
//! kind that apply, and which message parts travel in the body, the header,
//! header faults and faults.

pub mod binding;
pub mod definitions;
pub mod operation;
pub mod parts;
pub mod qname;
pub mod schema;
pub mod version;

pub use binding::{BindingEntry, BindingTable};
pub use definitions::*;
pub use operation::{Operation, OperationOptions};
pub use parts::{MessagePartSet, PartRef, select_parts};
pub use qname::QName;
pub use schema::{ElementDecl, SchemaSpace};
pub use version::*;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Static mismatches between a WSDL description and what the compiler needs.
///
/// Every variant is a configuration error: the same input always fails the
/// same way, so none of them is worth retrying.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WsdlError {
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    #[error("operation '{operation}' is offered by several ports, pick one of: {candidates}")]
    AmbiguousOperation {
        operation: String,
        candidates: String,
    },

    #[error("binding {binding} for operation '{operation}' has no binding element in {namespace}")]
    NoSoapBinding {
        operation: String,
        binding: String,
        namespace: String,
    },

    #[error("binding {binding} uses unsupported SOAP namespace '{namespace}'")]
    UnsupportedSoapNamespace { binding: String, namespace: String },

    #[error("message {message} has no part named '{part}'")]
    MissingPart { message: String, part: String },

    #[error("part '{part}' of message {message} declares neither element nor type")]
    UntypedPart { message: String, part: String },

    #[error("soap:header in {message} lacks the required '{attribute}' attribute")]
    MissingHeaderAttribute {
        message: String,
        attribute: &'static str,
    },

    #[error("element {element} is declared with type {existing}, cannot redeclare it with {requested}")]
    ConflictingElement {
        element: String,
        existing: String,
        requested: String,
    },

    #[error("operation '{operation}' uses '{use_}' encoding, only literal is supported")]
    UnsupportedUse { operation: String, use_: String },

    #[error("operation '{operation}' declares neither input nor output")]
    NoMessages { operation: String },

    #[error("malformed extension fragment in {context}: {reason}")]
    MalformedFragment { context: String, reason: String },
}

impl WsdlError {
    pub(crate) fn not_found(kind: &'static str, name: impl std::fmt::Display) -> Self {
        Self::NotFound {
            kind,
            name: name.to_string(),
        }
    }
}
