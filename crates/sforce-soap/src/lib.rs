//! # sforce-soap
//!
//! SOAP envelope protocol for the Salesforce partner API.
//!
//! A call goes through four steps:
//! 1. **Build** an [`Envelope`] (client id, optional session and query
//!    options headers, then the operation element)
//! 2. **Transmit** it with [`Transport::send`], retrying connection-level
//!    failures up to [`MAX_ATTEMPTS`] times with no delay
//! 3. **Classify** the reply: a `Body/Fault` becomes
//!    [`SoapError::SessionExpired`] or [`SoapError::RemoteFault`]
//! 4. **Normalize** the response wrapper into a [`CallResult`]
//!
//! [`Client`] wraps every partner operation on top of these steps.
//!
//! ```rust,no_run
//! use sforce_soap::{Client, ClientConfig};
//!
//! # fn main() -> sforce_soap::SoapResult<()> {
//! let mut client = Client::new(ClientConfig::from_env())?;
//! client.login("user@example.com", "passwordTOKEN")?;
//! println!("{}", client.get_server_timestamp()?);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::{Client, Session};
pub use config::{ClientConfig, DEFAULT_SERVER_URL, MAX_ATTEMPTS};
pub use envelope::{BodyPart, Envelope};
pub use error::{SoapError, SoapResult, TransportError};
pub use protocol::{normalize, parse_response, post, CallResult, Fault, Response, INVALID_SESSION_ID};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Transport};
