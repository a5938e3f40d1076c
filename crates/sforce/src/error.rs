//! Error types for sforce

use sforce_marshal::MarshalError;
use sforce_soap::SoapError;
use sforce_xml::XmlError;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the typed client
#[derive(Debug, Error)]
pub enum Error {
    /// Transport, fault or envelope failure
    #[error(transparent)]
    Soap(#[from] SoapError),

    /// Typed decoding failure
    #[error(transparent)]
    Marshal(#[from] MarshalError),

    /// Expected element missing from a result
    #[error(transparent)]
    Xml(#[from] XmlError),
}

impl Error {
    /// The session is no longer valid and a new login is needed
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::Soap(e) if e.is_session_expired())
    }
}
