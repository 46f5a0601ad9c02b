//! XML plumbing shared by the WSDL and SOAP crates: an owned element builder
//! for writing envelopes and roxmltree visitors for reading them.

pub mod builder;
pub mod parser;

#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("invalid XML: {0}")]
    ParserError(#[from] crate::parser::Error),

    #[error("XML builder error: {0}")]
    BuilderError(#[from] crate::builder::XmlBuilderError),

    /// Well-formed XML that lacks something the reader requires.
    #[error("malformed document: {0}")]
    InvalidXml(String),
}
