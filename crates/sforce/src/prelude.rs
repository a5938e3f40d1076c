//! Prelude module - common imports for sforce users
//!
//! ```rust
//! use sforce::prelude::*;
//! ```

pub use crate::{
    ClientConfig,
    // Error types
    Error,
    FieldValue,
    // Results
    QueryRecord,
    QueryRecordSet,
    // Requests
    Record,
    RecordValue,
    Result,
    SaveResult,
    // Main types
    SforceClient,
    Value,
};
