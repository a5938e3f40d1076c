//! Error types for the SOAP protocol layer.

use sforce_xml::XmlError;
use thiserror::Error;

/// Failure of a single transport attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    /// DNS failure, refused or reset connection, connect timeout
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The request was sent but no complete reply arrived in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Only connection-level failures are retried
    pub fn is_connect(&self) -> bool {
        matches!(self, TransportError::Connect(_))
    }
}

/// Errors that can occur during a SOAP call.
#[derive(Debug, Error)]
pub enum SoapError {
    /// Response (or request tree) is not well-formed XML
    #[error("Malformed document: {0}")]
    Xml(#[from] XmlError),

    /// Every attempt failed at the connection level
    #[error("No response after {attempts} attempts")]
    NoResponse {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    /// `INVALID_SESSION_ID` fault: log in again and retry the call
    #[error("Session expired ({code}): {message}")]
    SessionExpired { code: String, message: String },

    /// Any other SOAP fault
    #[error("Remote fault ({code}): {message}")]
    RemoteFault { code: String, message: String },

    /// Non-2xx reply that is not a SOAP fault
    #[error("HTTP status {status}")]
    HttpStatus { status: u16, body: String },

    /// Non-connection transport failure
    #[error(transparent)]
    Transport(TransportError),

    #[error("Not logged in: call login or use_session first")]
    NotLoggedIn,

    #[error("Response body has no result element")]
    MissingResult,
}

impl SoapError {
    /// True for the recoverable re-authenticate case
    pub fn is_session_expired(&self) -> bool {
        matches!(self, SoapError::SessionExpired { .. })
    }
}

/// Result type for SOAP operations
pub type SoapResult<T> = std::result::Result<T, SoapError>;
