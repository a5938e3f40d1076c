//! Query records decoded with type schemas.
//!
//! A record element lists its fields in the sObject namespace, starting with
//! `type`. A child typed `sf:sObject` is a related record and a child typed
//! `QueryResult` is a nested record set (a subquery); every other child is a
//! field decoded through the schema of the record's type.

use std::collections::BTreeSet;
use std::sync::Arc;

use sforce_marshal::{FieldValue, Registry, SchemaCache, TypeSchema};
use sforce_xml::{ns, Element};

use crate::error::Result;
use crate::results::{flag, number, optional_text};

const SOBJECT_XSI_TYPE: &str = "sf:sObject";
const QUERY_RESULT_XSI_TYPE: &str = "QueryResult";

/// Value of one field of a [`QueryRecord`]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(untagged))]
pub enum RecordValue {
    Field(FieldValue),
    Record(QueryRecord),
    Records(QueryRecordSet),
}

impl RecordValue {
    pub fn as_field(&self) -> Option<&FieldValue> {
        match self {
            RecordValue::Field(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&QueryRecord> {
        match self {
            RecordValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_records(&self) -> Option<&QueryRecordSet> {
        match self {
            RecordValue::Records(r) => Some(r),
            _ => None,
        }
    }
}

impl From<FieldValue> for RecordValue {
    fn from(v: FieldValue) -> Self {
        RecordValue::Field(v)
    }
}

/// A decoded record; fields keep response order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRecord {
    fields: Vec<(String, RecordValue)>,
}

impl QueryRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing an earlier value in place
    pub fn insert<K: Into<String>, V: Into<RecordValue>>(&mut self, key: K, value: V) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&RecordValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Shortcut for a plain field value
    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.get(key).and_then(RecordValue::as_field)
    }

    pub fn sobject_type(&self) -> Option<&str> {
        self.field("type").and_then(FieldValue::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.field("Id").and_then(FieldValue::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RecordValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for QueryRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Records of a query, plus paging state
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QueryRecordSet {
    pub records: Vec<QueryRecord>,
    pub done: bool,
    /// Total number of matching records, not just this batch
    pub size: i64,
    /// Pass to `query_more` while `done` is false
    pub query_locator: Option<String>,
}

impl QueryRecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, QueryRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a QueryRecordSet {
    type Item = &'a QueryRecord;
    type IntoIter = std::slice::Iter<'a, QueryRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

// ============================================================================
// Extraction
// ============================================================================

fn xsi_type(e: &Element) -> Option<&str> {
    e.find_attribute(ns::XSI.name("type"))
}

pub(crate) fn is_sobject(e: &Element) -> bool {
    xsi_type(e) == Some(SOBJECT_XSI_TYPE)
}

pub(crate) fn is_query_result(e: &Element) -> bool {
    xsi_type(e) == Some(QUERY_RESULT_XSI_TYPE)
}

fn nested_records(query_result: &Element) -> Vec<&Element> {
    query_result.children(&ns::PARTNER.name("records"))
}

/// Every sObject type named in `records`, nested records included
pub(crate) fn record_types<'a, I>(records: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Element>,
{
    let mut types = BTreeSet::new();
    for r in records {
        collect_types(r, &mut types);
    }
    types
}

fn collect_types(record: &Element, types: &mut BTreeSet<String>) {
    if record.element_count() == 0 {
        return;
    }
    if let Some(t) = record.find_child(&ns::SOBJECT.name("type")) {
        types.insert(t.text());
    }
    for field in record.elements() {
        if is_sobject(field) {
            collect_types(field, types);
        } else if is_query_result(field) {
            for r in nested_records(field) {
                collect_types(r, types);
            }
        }
    }
}

/// Decodes record elements against described types
pub(crate) struct Extractor<'a> {
    pub registry: &'a Registry,
    pub schemas: &'a SchemaCache,
}

impl Extractor<'_> {
    fn schema_for(&self, record: &Element) -> Arc<TypeSchema> {
        let type_name = record
            .find_child(&ns::SOBJECT.name("type"))
            .map(Element::text)
            .unwrap_or_default();
        tracing::trace!("row type: {type_name}");
        self.schemas.get(&type_name).unwrap_or_else(|| {
            tracing::warn!("no schema for type '{type_name}', decoding its fields as strings");
            Arc::new(TypeSchema::new(type_name))
        })
    }

    pub fn record(&self, record: &Element) -> Result<QueryRecord> {
        let mut out = QueryRecord::new();
        if record.element_count() == 0 {
            return Ok(out);
        }

        let schema = self.schema_for(record);
        for field in record.elements() {
            let name = field.name().local_name();
            if is_sobject(field) {
                out.insert(name, RecordValue::Record(self.record(field)?));
            } else if is_query_result(field) {
                out.insert(name, RecordValue::Records(self.record_set(field)?));
            } else {
                out.insert(name, schema.marshall(self.registry, name, record)?);
            }
        }
        Ok(out)
    }

    /// A `QueryResult` element: top-level query result or a subquery field
    pub fn record_set(&self, query_result: &Element) -> Result<QueryRecordSet> {
        let records = nested_records(query_result)
            .into_iter()
            .map(|r| self.record(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(QueryRecordSet {
            records,
            done: flag(query_result, "done"),
            size: number(query_result, "size")?,
            query_locator: optional_text(query_result, "queryLocator"),
        })
    }

    /// Only the listed fields of a `retrieve` result
    pub fn fields(&self, schema: &TypeSchema, field_names: &[&str], record: &Element) -> Result<QueryRecord> {
        let mut out = QueryRecord::new();
        for name in field_names {
            out.insert(*name, schema.marshall(self.registry, name, record)?);
        }
        Ok(out)
    }
}
