//! Field type tag -> converter dispatch.
//!
//! Converters find the named child of a record element and decode its text.
//! Text that does not fit the declared type decodes to [`FieldValue::Null`]
//! instead of failing, since the declared schema and the payload do not
//! always agree.

use std::sync::Arc;

use ahash::AHashMap;
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use sforce_xml::{ns, Element, Namespace};

use crate::error::{MarshalError, MarshalResult};
use crate::value::FieldValue;

/// Decodes field `name` of `record`, looking it up in namespace `ns`
pub type Converter =
    Arc<dyn Fn(&str, &Element, &Namespace) -> MarshalResult<FieldValue> + Send + Sync>;

pub const STRING_TYPES: &[&str] = &[
    "string",
    "id",
    "phone",
    "url",
    "email",
    "anyType",
    "picklist",
    "reference",
    "encryptedstring",
];
pub const TEXT_TYPES: &[&str] = &["textarea"];
pub const MULTI_TYPES: &[&str] = &["multipicklist", "combobox"];
pub const BOOLEAN_TYPES: &[&str] = &["boolean"];
pub const INTEGER_TYPES: &[&str] = &["int"];
pub const DOUBLE_TYPES: &[&str] = &["double", "currency", "percent"];
pub const DATE_TYPES: &[&str] = &["date"];
pub const DATETIME_TYPES: &[&str] = &["datetime"];
pub const BASE64_TYPES: &[&str] = &["base64"];

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").unwrap());

static DATETIME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})T(\d{2}):(\d{2}):(\d{2})\.(\d+)(.*)").unwrap());

/// The registry with every built-in converter installed
pub static DEFAULT_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// A table of converters keyed by field type tag
#[derive(Clone)]
pub struct Registry {
    converters: AHashMap<String, Converter>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut tags: Vec<_> = self.converters.keys().collect();
        tags.sort();
        f.debug_struct("Registry").field("tags", &tags).finish()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Registry with the built-in converters
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(STRING_TYPES, string_value);
        registry.register(TEXT_TYPES, text_value);
        registry.register(MULTI_TYPES, multi_value);
        registry.register(BOOLEAN_TYPES, boolean_value);
        registry.register(INTEGER_TYPES, integer_value);
        registry.register(DOUBLE_TYPES, double_value);
        registry.register(DATE_TYPES, date_value);
        registry.register(DATETIME_TYPES, datetime_value);
        registry.register(BASE64_TYPES, base64_value);
        registry
    }

    /// Registry with no converters
    pub fn empty() -> Self {
        Self {
            converters: AHashMap::new(),
        }
    }

    /// Install `converter` for every tag in `tags`; the last registration wins
    pub fn register<F>(&mut self, tags: &[&str], converter: F)
    where
        F: Fn(&str, &Element, &Namespace) -> MarshalResult<FieldValue> + Send + Sync + 'static,
    {
        let converter: Converter = Arc::new(converter);
        for tag in tags {
            self.converters.insert((*tag).to_string(), Arc::clone(&converter));
        }
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.converters.contains_key(tag)
    }

    /// Decode `field_name` of `record` as `field_type`, in the sObject namespace
    pub fn marshall(&self, field_type: &str, field_name: &str, record: &Element) -> MarshalResult<FieldValue> {
        self.marshall_in(&ns::SOBJECT, field_type, field_name, record)
    }

    /// Like [`marshall`](Self::marshall), looking the field up in `namespace`
    pub fn marshall_in(
        &self,
        namespace: &Namespace,
        field_type: &str,
        field_name: &str,
        record: &Element,
    ) -> MarshalResult<FieldValue> {
        let converter = self
            .converters
            .get(field_type)
            .ok_or_else(|| MarshalError::UnknownFieldType(field_type.to_string()))?;
        converter(field_name, record, namespace)
    }
}

/// Decode with [`DEFAULT_REGISTRY`]
pub fn marshall(field_type: &str, field_name: &str, record: &Element) -> MarshalResult<FieldValue> {
    DEFAULT_REGISTRY.marshall(field_type, field_name, record)
}

// ============================================================================
// Built-in converters
// ============================================================================

fn field<'a>(record: &'a Element, namespace: &Namespace, name: &str) -> MarshalResult<&'a Element> {
    Ok(record.child(&namespace.name(name))?)
}

fn string_value(name: &str, record: &Element, namespace: &Namespace) -> MarshalResult<FieldValue> {
    Ok(FieldValue::Str(field(record, namespace, name)?.text()))
}

/// Long text keeps its newlines
fn text_value(name: &str, record: &Element, namespace: &Namespace) -> MarshalResult<FieldValue> {
    Ok(FieldValue::Str(field(record, namespace, name)?.raw_text()))
}

fn multi_value(name: &str, record: &Element, namespace: &Namespace) -> MarshalResult<FieldValue> {
    let text = field(record, namespace, name)?.text();
    if text.is_empty() {
        return Ok(FieldValue::List(Vec::new()));
    }
    Ok(FieldValue::List(text.split(';').map(str::to_string).collect()))
}

fn boolean_value(name: &str, record: &Element, namespace: &Namespace) -> MarshalResult<FieldValue> {
    Ok(FieldValue::Bool(field(record, namespace, name)?.text() == "true"))
}

fn integer_value(name: &str, record: &Element, namespace: &Namespace) -> MarshalResult<FieldValue> {
    let text = field(record, namespace, name)?.text();
    Ok(match text.parse::<i64>() {
        Ok(i) => FieldValue::Int(i),
        Err(_) => degrade(name, "int", &text),
    })
}

fn double_value(name: &str, record: &Element, namespace: &Namespace) -> MarshalResult<FieldValue> {
    let text = field(record, namespace, name)?.text();
    Ok(match text.parse::<f64>() {
        Ok(f) => FieldValue::Double(f),
        Err(_) => degrade(name, "double", &text),
    })
}

fn date_value(name: &str, record: &Element, namespace: &Namespace) -> MarshalResult<FieldValue> {
    let text = field(record, namespace, name)?.text();
    Ok(parse_date(&text)
        .map(FieldValue::Date)
        .unwrap_or_else(|| degrade(name, "date", &text)))
}

fn datetime_value(name: &str, record: &Element, namespace: &Namespace) -> MarshalResult<FieldValue> {
    let text = field(record, namespace, name)?.text();
    Ok(parse_datetime(&text)
        .map(FieldValue::DateTime)
        .unwrap_or_else(|| degrade(name, "datetime", &text)))
}

/// Left encoded; decoding is up to the caller
fn base64_value(name: &str, record: &Element, namespace: &Namespace) -> MarshalResult<FieldValue> {
    Ok(FieldValue::Str(field(record, namespace, name)?.text()))
}

fn degrade(name: &str, field_type: &str, text: &str) -> FieldValue {
    log::debug!("field {name}: {text:?} is not a valid {field_type}, using null");
    FieldValue::Null
}

/// `YYYY-MM-DD` prefix; `None` when absent or not a real date
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let caps = DATE_RE.captures(text)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// `YYYY-MM-DDTHH:MM:SS.fff...` with any trailing zone ignored. The fraction
/// is truncated to microseconds.
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let caps = DATETIME_RE.captures(text)?;
    let date = NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )?;
    let fraction = &caps[7];
    let micros: u32 = format!("{:0<6}", &fraction[..fraction.len().min(6)]).parse().ok()?;
    date.and_hms_micro_opt(
        caps[4].parse().ok()?,
        caps[5].parse().ok()?,
        caps[6].parse().ok()?,
        micros,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sforce_xml::parse_str;

    fn record(fields: &str) -> Element {
        parse_str(&format!(
            r#"<records xmlns="urn:sobject.partner.soap.sforce.com">{fields}</records>"#
        ))
        .unwrap()
    }

    #[test]
    fn test_date() {
        let r = record("<Birthdate>1970-01-04</Birthdate>");
        assert_eq!(
            marshall("date", "Birthdate", &r).unwrap(),
            FieldValue::Date(NaiveDate::from_ymd_opt(1970, 1, 4).unwrap())
        );
    }

    #[test]
    fn test_garbage_date_is_null() {
        let r = record("<Birthdate>garbage</Birthdate>");
        assert_eq!(marshall("date", "Birthdate", &r).unwrap(), FieldValue::Null);
    }

    #[test]
    fn test_impossible_date_is_null() {
        let r = record("<Birthdate>2010-02-30</Birthdate>");
        assert_eq!(marshall("date", "Birthdate", &r).unwrap(), FieldValue::Null);
    }

    #[test]
    fn test_datetime_truncates_to_micros_and_ignores_zone() {
        let r = record("<CreatedDate>2010-03-22T12:30:05.1234567+00:00</CreatedDate>");
        let expected = NaiveDate::from_ymd_opt(2010, 3, 22)
            .and_then(|d| d.and_hms_micro_opt(12, 30, 5, 123_456))
            .unwrap();
        assert_eq!(
            marshall("datetime", "CreatedDate", &r).unwrap(),
            FieldValue::DateTime(expected)
        );

        let r = record("<CreatedDate>2010-03-22T12:30:05.5Z</CreatedDate>");
        assert_eq!(
            marshall("datetime", "CreatedDate", &r)
                .unwrap()
                .as_datetime()
                .map(|dt| dt.and_utc().timestamp_subsec_micros()),
            Some(500_000)
        );
    }

    #[test]
    fn test_datetime_without_fraction_is_null() {
        let r = record("<CreatedDate>2010-03-22T12:30:05Z</CreatedDate>");
        assert_eq!(marshall("datetime", "CreatedDate", &r).unwrap(), FieldValue::Null);
    }

    #[test]
    fn test_multipicklist() {
        let r = record("<Fruit>Apple;Pear</Fruit><Empty></Empty>");
        assert_eq!(
            marshall("multipicklist", "Fruit", &r).unwrap(),
            FieldValue::List(vec!["Apple".to_string(), "Pear".to_string()])
        );
        assert_eq!(
            marshall("multipicklist", "Empty", &r).unwrap(),
            FieldValue::List(Vec::new())
        );
        assert_eq!(
            marshall("combobox", "Fruit", &r).unwrap().as_list().map(<[String]>::len),
            Some(2)
        );
    }

    #[test]
    fn test_boolean_has_no_third_state() {
        let r = record("<A>true</A><B>false</B><C>TRUE</C><D/>");
        assert_eq!(marshall("boolean", "A", &r).unwrap(), FieldValue::Bool(true));
        for name in ["B", "C", "D"] {
            assert_eq!(marshall("boolean", name, &r).unwrap(), FieldValue::Bool(false));
        }
    }

    #[test]
    fn test_numbers_degrade_to_null() {
        let r = record("<N>42</N><D>3.5</D><Bad>n/a</Bad><Empty/>");
        assert_eq!(marshall("int", "N", &r).unwrap(), FieldValue::Int(42));
        assert_eq!(marshall("int", "Bad", &r).unwrap(), FieldValue::Null);
        assert_eq!(marshall("currency", "D", &r).unwrap(), FieldValue::Double(3.5));
        assert_eq!(marshall("percent", "Bad", &r).unwrap(), FieldValue::Null);
        assert_eq!(marshall("double", "Empty", &r).unwrap(), FieldValue::Null);
    }

    #[test]
    fn test_textarea_keeps_newlines() {
        let r = record("<Description>line one\n  line two\n</Description>");
        assert_eq!(
            marshall("textarea", "Description", &r).unwrap(),
            FieldValue::Str("line one\n  line two\n".to_string())
        );
        assert_eq!(
            marshall("string", "Description", &r).unwrap(),
            FieldValue::Str("line one line two".to_string())
        );
    }

    #[test]
    fn test_base64_is_passed_through() {
        let r = record("<Body>aGVsbG8=</Body>");
        assert_eq!(marshall("base64", "Body", &r).unwrap(), FieldValue::Str("aGVsbG8=".into()));
    }

    #[test]
    fn test_unknown_type_and_missing_field() {
        let r = record("<Name>x</Name>");
        assert!(matches!(
            marshall("geolocation", "Name", &r),
            Err(MarshalError::UnknownFieldType(t)) if t == "geolocation"
        ));
        assert!(matches!(marshall("string", "Missing", &r), Err(MarshalError::Xml(_))));
    }

    #[test]
    fn test_field_must_be_in_requested_namespace() {
        let r = parse_str(r#"<r xmlns="urn:partner.soap.sforce.com"><deletedDate>2010-03-22T00:00:00.000Z</deletedDate></r>"#).unwrap();
        assert!(marshall("datetime", "deletedDate", &r).is_err());
        assert!(DEFAULT_REGISTRY
            .marshall_in(&ns::PARTNER, "datetime", "deletedDate", &r)
            .unwrap()
            .as_datetime()
            .is_some());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = Registry::new();
        registry.register(&["string"], |_, _, _| Ok(FieldValue::Str("override".into())));
        let r = record("<Name>x</Name>");
        assert_eq!(registry.marshall("string", "Name", &r).unwrap(), FieldValue::Str("override".into()));
        // other string-like tags keep the built-in converter
        assert_eq!(registry.marshall("id", "Name", &r).unwrap(), FieldValue::Str("x".into()));
        assert!(!Registry::empty().is_registered("string"));
    }
}
