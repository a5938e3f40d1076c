//! Marshalling error types

use sforce_xml::XmlError;
use thiserror::Error;

/// Result type for marshalling operations
pub type MarshalResult<T> = std::result::Result<T, MarshalError>;

/// Errors raised while decoding typed values or schemas.
///
/// Leaf values that fail to parse are not errors; they decode to
/// [`FieldValue::Null`](crate::FieldValue::Null).
#[derive(Debug, Error)]
pub enum MarshalError {
    /// No converter registered for this field type tag
    #[error("Unknown field type: {0}")]
    UnknownFieldType(String),

    /// Field element missing or another tree lookup failed
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    /// `fieldsToNull` is filled in by the client, never by the caller
    #[error("Field '{0}' is reserved and cannot be set by the caller")]
    ReservedField(String),

    /// Numeric attribute of a describe result did not parse
    #[error("Invalid number in '{field}': {value}")]
    InvalidNumber { field: String, value: String },
}
