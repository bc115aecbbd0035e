//! Document parsing error types

use thiserror::Error;

/// Errors that can occur while turning a raw contract page into a document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The `#page` root element carrying the contract attributes is absent
    #[error("Invalid Ricardian contract: missing root element")]
    MissingRoot,

    /// The `#contract-display` element holding the legal text is absent
    #[error("Invalid Ricardian contract: missing display element")]
    MissingDisplay,

    /// A required data attribute is absent from the root element
    #[error("Invalid Ricardian contract: missing field '{0}'")]
    MissingField(&'static str),

    /// A data attribute is present but could not be decoded
    #[error("Invalid Ricardian contract: malformed field '{0}'")]
    MalformedField(&'static str),
}

/// Result type for document parsing
pub type ParseResult<T> = Result<T, ParseError>;
