//! Outgoing sObject preparation.
//!
//! Before a record is written, null and empty-list fields are listed in
//! `fieldsToNull` so the server clears them, multi-value lists are joined
//! with `;`, and nested records are prepared the same way.

use sforce_xml::{Record, Value};

use crate::error::{MarshalError, MarshalResult};

/// Name of the field the client fills with cleared field names
pub const FIELDS_TO_NULL: &str = "fieldsToNull";

/// Prepare one record, appending `fieldsToNull` as its last field
pub fn prepare_sobject(record: &Record) -> MarshalResult<Record> {
    if record.contains_key(FIELDS_TO_NULL) {
        return Err(MarshalError::ReservedField(FIELDS_TO_NULL.to_string()));
    }

    let mut prepared = Record::new();
    let mut fields_to_null: Vec<Value> = Vec::new();

    for (key, value) in record.iter() {
        let value = match value {
            Value::Null => {
                fields_to_null.push(Value::from(key));
                Value::List(Vec::new())
            }
            Value::List(items) if items.is_empty() => {
                fields_to_null.push(Value::from(key));
                Value::List(Vec::new())
            }
            Value::List(items) => Value::Str(join_values(items)),
            Value::Record(nested) => {
                if nested.is_empty() {
                    fields_to_null.push(Value::from(key));
                }
                Value::Record(prepare_sobject(nested)?)
            }
            scalar => scalar.clone(),
        };
        prepared.insert(key, value);
    }

    prepared.insert(FIELDS_TO_NULL, Value::List(fields_to_null));
    Ok(prepared)
}

/// Prepare a batch of records
pub fn prepare_sobjects(records: &[Record]) -> MarshalResult<Vec<Record>> {
    records.iter().map(prepare_sobject).collect()
}

/// Prepare without the top-level `fieldsToNull`, for structures that are not
/// sObjects (lead conversions, email messages)
pub fn prepare_sobject_without_nulls(record: &Record) -> MarshalResult<Record> {
    let mut prepared = prepare_sobject(record)?;
    prepared.remove(FIELDS_TO_NULL);
    Ok(prepared)
}

fn join_values(items: &[Value]) -> String {
    items
        .iter()
        .map(|v| v.scalar_text().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_null_becomes_empty_list_and_fields_to_null() {
        let record = Record::new().with("val", Value::Null);
        let prepared = prepare_sobject(&record).unwrap();
        let expected = Record::new()
            .with("val", Value::List(vec![]))
            .with(FIELDS_TO_NULL, vec!["val"]);
        assert_eq!(prepared, expected);
    }

    #[test]
    fn test_lists_are_joined_and_empty_lists_nulled() {
        let record = Record::with_type("Contact")
            .with("Fruit__c", vec!["Apple", "Pear"])
            .with("Tags__c", Vec::<Value>::new())
            .with("LastName", "Doe");
        let prepared = prepare_sobject(&record).unwrap();

        assert_eq!(prepared.get("Fruit__c"), Some(&Value::from("Apple;Pear")));
        assert_eq!(prepared.get("Tags__c"), Some(&Value::List(vec![])));
        assert_eq!(prepared.get(FIELDS_TO_NULL), Some(&Value::from(vec!["Tags__c"])));
        assert_eq!(prepared.keys().last(), Some(FIELDS_TO_NULL));
        assert_eq!(prepared.sobject_type(), Some("Contact"));
    }

    #[test]
    fn test_no_nulls_gives_empty_fields_to_null() {
        let prepared = prepare_sobject(&Record::new().with("Name", "Acme")).unwrap();
        assert_eq!(prepared.get(FIELDS_TO_NULL), Some(&Value::List(vec![])));
    }

    #[test]
    fn test_nested_records_are_prepared() {
        let record = Record::with_type("Contact").with(
            "Account",
            Record::with_type("Account").with("Ext__c", "42").with("Phone", Value::Null),
        );
        let prepared = prepare_sobject(&record).unwrap();
        let nested = prepared.get("Account").and_then(Value::as_record).unwrap();
        assert_eq!(nested.get(FIELDS_TO_NULL), Some(&Value::from(vec!["Phone"])));
        assert_eq!(prepared.get(FIELDS_TO_NULL), Some(&Value::List(vec![])));
    }

    #[test]
    fn test_caller_supplied_fields_to_null_is_rejected() {
        let record = Record::new().with(FIELDS_TO_NULL, vec!["Name"]);
        assert!(matches!(
            prepare_sobject(&record),
            Err(MarshalError::ReservedField(f)) if f == FIELDS_TO_NULL
        ));
    }

    #[test]
    fn test_input_record_is_untouched() {
        let record = Record::new().with("val", Value::Null);
        let _ = prepare_sobject(&record).unwrap();
        assert_eq!(record.get("val"), Some(&Value::Null));
    }

    #[test]
    fn test_without_nulls() {
        let record = Record::new().with("leadId", "00Q1").with("opportunityName", Value::Null);
        let prepared = prepare_sobject_without_nulls(&record).unwrap();
        assert!(!prepared.contains_key(FIELDS_TO_NULL));
        assert_eq!(prepared.get("opportunityName"), Some(&Value::List(vec![])));
    }

    #[test]
    fn test_batch() {
        let records = vec![Record::new().with("a", 1), Record::new().with("b", Value::Null)];
        let prepared = prepare_sobjects(&records).unwrap();
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared[1].get(FIELDS_TO_NULL), Some(&Value::from(vec!["b"])));
    }
}
