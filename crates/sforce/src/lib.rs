//! # sforce
//!
//! A client for the Salesforce partner SOAP API.
//!
//! Results come back as typed values: query records are decoded with the
//! field types of their sObject, write calls report a [`SaveResult`] per
//! record, and describe calls return structured schemas.
//!
//! ## Layers
//!
//! - [`sforce_xml`]: element trees, parser and writer
//! - [`sforce_soap`]: envelopes, transport, retries and fault handling
//! - [`sforce_marshal`]: field converters, schemas and record preparation
//! - this crate: [`SforceClient`], which ties them together
//!
//! ## Example
//!
//! ```rust,no_run
//! use sforce::prelude::*;
//!
//! # fn main() -> sforce::Result<()> {
//! let mut client = SforceClient::new(ClientConfig::from_env())?;
//! client.login("user@example.com", "passwordTOKEN")?;
//!
//! let contacts = client.query("SELECT Id, LastName FROM Contact LIMIT 10")?;
//! for contact in &contacts {
//!     println!("{:?} {:?}", contact.id(), contact.field("LastName"));
//! }
//!
//! let saved = client.create(&[Record::with_type("Contact").with("LastName", "Doe")])?;
//! assert!(saved[0].success);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod prelude;
pub mod records;
pub mod results;

pub use client::SforceClient;
pub use error::{Error, Result};
pub use records::{QueryRecord, QueryRecordSet, RecordValue};
pub use results::{
    DeletedRecord, DescribeGlobal, LeadConvertResult, LoginResult, SObjectSummary, SaveError, SaveResult,
    SendEmailResult, Tab, TabSet, UserInfo,
};

// Re-export the lower layers
pub use sforce_marshal::{
    FieldSchema, FieldValue, MarshalError, PicklistEntry, Registry, SObjectDescription, SchemaCache, TypeSchema,
};
pub use sforce_soap::{ClientConfig, HttpTransport, SoapError, Transport, TransportError};
pub use sforce_xml::{Element, Record, Value, XmlError};

pub use sforce_marshal;
pub use sforce_soap;
pub use sforce_xml;
