//! # sforce-xml
//!
//! Namespace-aware XML element tree and writer used by the sforce SOAP client.
//!
//! This crate provides the two XML layers the protocol is built on:
//! - [`Element`] - a mutable, queryable tree parsed from any namespace-qualified
//!   document ([`parse`], [`parse_str`])
//! - [`XmlWriter`] - a streaming writer that restores readable namespace
//!   prefixes and serializes request [`Value`]s, optionally gzip-compressed
//!
//! Every qualified name is built through a [`Namespace`] factory, never from
//! raw strings, so names from the envelope, partner, sObject and
//! schema-instance namespaces cannot collide.
//!
//! ## Example
//!
//! ```rust
//! use sforce_xml::{ns, parse_str};
//!
//! let doc = parse_str(
//!     r#"<r xmlns="urn:partner.soap.sforce.com"><id>001</id><id>002</id></r>"#,
//! ).unwrap();
//!
//! assert_eq!(doc.child(&ns::PARTNER.name("id")).unwrap().text(), "001");
//! assert_eq!(doc.children_local("id").len(), 2);
//! ```

pub mod element;
pub mod error;
pub mod name;
pub mod reader;
pub mod value;
pub mod writer;

pub use element::{Element, Node};
pub use error::{XmlError, XmlResult};
pub use name::{ns, Namespace, QName};
pub use reader::{parse, parse_reader, parse_str};
pub use value::{Record, Value};
pub use writer::XmlWriter;
