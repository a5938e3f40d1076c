//! # sforce-marshal
//!
//! Schema-driven decoding of record fields, sObject schemas, and the
//! preparation step applied to records before they are sent.
//!
//! ```rust
//! use sforce_marshal::{marshall, FieldValue};
//! use sforce_xml::parse_str;
//!
//! let record = parse_str(
//!     r#"<records xmlns="urn:sobject.partner.soap.sforce.com"><Fruit>Apple;Pear</Fruit></records>"#,
//! ).unwrap();
//!
//! assert_eq!(
//!     marshall("multipicklist", "Fruit", &record).unwrap(),
//!     FieldValue::List(vec!["Apple".into(), "Pear".into()]),
//! );
//! ```

pub mod cache;
pub mod error;
pub mod prepare;
pub mod registry;
pub mod schema;
pub mod value;

pub use cache::SchemaCache;
pub use error::{MarshalError, MarshalResult};
pub use prepare::{prepare_sobject, prepare_sobject_without_nulls, prepare_sobjects, FIELDS_TO_NULL};
pub use registry::{marshall, parse_date, parse_datetime, Converter, Registry, DEFAULT_REGISTRY};
pub use schema::{
    ChildRelationship, FieldSchema, PicklistEntry, RecordTypeInfo, SObjectDescription, TypeSchema,
    DEFAULT_FIELD_TYPE,
};
pub use value::FieldValue;
