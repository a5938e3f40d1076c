//! XML error types

use thiserror::Error;

use crate::name::QName;

/// Result type for XML operations
pub type XmlResult<T> = std::result::Result<T, XmlError>;

/// Errors that can occur while parsing, querying or writing XML
#[derive(Debug, Error)]
pub enum XmlError {
    /// The document is not well-formed, or declares a DTD
    #[error("Malformed XML document: {0}")]
    Malformed(String),

    /// Singular child lookup found nothing
    #[error("No child element named {0}")]
    NoSuchChild(QName),

    /// Attribute lookup found nothing
    #[error("No attribute named {0}")]
    NoSuchAttribute(QName),

    /// `end_element` called with no open element
    #[error("No open element to close")]
    UnbalancedEnd,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl XmlError {
    pub(crate) fn malformed<S: Into<String>>(msg: S) -> Self {
        XmlError::Malformed(msg.into())
    }
}
