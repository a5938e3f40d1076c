//! Field and sObject schemas extracted from describe results.
//!
//! Describe results live in the partner namespace. Only `name` and `type`
//! are required on a field; other attributes default to `false`, `0` or an
//! empty string when the server leaves them out.

use ahash::AHashMap;
use sforce_xml::{ns, Element};

use crate::error::{MarshalError, MarshalResult};
use crate::registry::Registry;
use crate::value::FieldValue;

/// Type tag used for fields the schema does not know about
pub const DEFAULT_FIELD_TYPE: &str = "string";

// ============================================================================
// Element helpers
// ============================================================================

fn required_text(e: &Element, local: &str) -> MarshalResult<String> {
    Ok(e.child(&ns::PARTNER.name(local))?.text())
}

fn text(e: &Element, local: &str) -> String {
    e.find_child(&ns::PARTNER.name(local))
        .map(Element::text)
        .unwrap_or_default()
}

fn optional_text(e: &Element, local: &str) -> Option<String> {
    e.find_child(&ns::PARTNER.name(local)).map(Element::text)
}

fn flag(e: &Element, local: &str) -> bool {
    optional_flag(e, local).unwrap_or(false)
}

fn optional_flag(e: &Element, local: &str) -> Option<bool> {
    e.find_child(&ns::PARTNER.name(local))
        .map(|c| c.text() == "true")
}

fn number(e: &Element, local: &str) -> MarshalResult<i64> {
    match e.find_child(&ns::PARTNER.name(local)) {
        None => Ok(0),
        Some(c) => {
            let value = c.text();
            value.parse().map_err(|_| MarshalError::InvalidNumber {
                field: local.to_string(),
                value,
            })
        }
    }
}

fn texts(e: &Element, local: &str) -> Vec<String> {
    e.children(&ns::PARTNER.name(local))
        .into_iter()
        .map(Element::text)
        .collect()
}

// ============================================================================
// Fields
// ============================================================================

/// One allowed value of a picklist field
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PicklistEntry {
    pub active: bool,
    pub default_value: bool,
    pub label: String,
    pub value: String,
    pub valid_for: Vec<String>,
}

impl PicklistEntry {
    pub fn from_element(e: &Element) -> Self {
        Self {
            active: flag(e, "active"),
            default_value: flag(e, "defaultValue"),
            label: text(e, "label"),
            value: text(e, "value"),
            valid_for: texts(e, "validFor"),
        }
    }
}

/// Schema of one field of an sObject
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldSchema {
    pub name: String,
    /// Field type tag, the key into the marshalling registry
    pub field_type: String,
    pub soap_type: String,
    pub label: String,
    pub nillable: bool,
    pub createable: bool,
    pub updateable: bool,
    pub custom: bool,
    pub calculated: bool,
    pub auto_number: bool,
    pub defaulted_on_create: bool,
    pub filterable: bool,
    pub name_field: bool,
    pub html_formatted: bool,
    pub restricted_picklist: bool,
    pub dependent_picklist: bool,
    pub controller_name: Option<String>,
    pub length: i64,
    pub byte_length: i64,
    pub digits: i64,
    pub precision: i64,
    pub scale: i64,
    pub reference_to: Vec<String>,
    pub picklist_values: Vec<PicklistEntry>,
}

impl FieldSchema {
    /// A bare schema with only a name and a type tag
    pub fn new<N: Into<String>, T: Into<String>>(name: N, field_type: T) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            soap_type: String::new(),
            label: String::new(),
            nillable: false,
            createable: false,
            updateable: false,
            custom: false,
            calculated: false,
            auto_number: false,
            defaulted_on_create: false,
            filterable: false,
            name_field: false,
            html_formatted: false,
            restricted_picklist: false,
            dependent_picklist: false,
            controller_name: None,
            length: 0,
            byte_length: 0,
            digits: 0,
            precision: 0,
            scale: 0,
            reference_to: Vec::new(),
            picklist_values: Vec::new(),
        }
    }

    /// Read a describe `fields` element
    pub fn from_element(e: &Element) -> MarshalResult<Self> {
        Ok(Self {
            name: required_text(e, "name")?,
            field_type: required_text(e, "type")?,
            soap_type: text(e, "soapType"),
            label: text(e, "label"),
            nillable: flag(e, "nillable"),
            createable: flag(e, "createable"),
            updateable: flag(e, "updateable"),
            custom: flag(e, "custom"),
            calculated: flag(e, "calculated"),
            auto_number: flag(e, "autoNumber"),
            defaulted_on_create: flag(e, "defaultedOnCreate"),
            filterable: flag(e, "filterable"),
            name_field: flag(e, "nameField"),
            html_formatted: flag(e, "htmlFormatted"),
            restricted_picklist: flag(e, "restrictedPicklist"),
            dependent_picklist: flag(e, "dependentPicklist"),
            controller_name: optional_text(e, "controllerName"),
            length: number(e, "length")?,
            byte_length: number(e, "byteLength")?,
            digits: number(e, "digits")?,
            precision: number(e, "precision")?,
            scale: number(e, "scale")?,
            reference_to: texts(e, "referenceTo"),
            picklist_values: e
                .children(&ns::PARTNER.name("picklistValues"))
                .into_iter()
                .map(PicklistEntry::from_element)
                .collect(),
        })
    }
}

// ============================================================================
// Types
// ============================================================================

/// Field schemas of one sObject type, in describe order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TypeSchema {
    pub name: String,
    fields: Vec<FieldSchema>,
    #[cfg_attr(feature = "serde", serde(skip))]
    index: AHashMap<String, usize>,
}

impl TypeSchema {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            index: AHashMap::new(),
        }
    }

    /// Builder: add a field
    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.insert(field);
        self
    }

    /// Add or replace a field
    pub fn insert(&mut self, field: FieldSchema) {
        match self.index.get(&field.name) {
            Some(&i) => self.fields[i] = field,
            None => {
                self.index.insert(field.name.clone(), self.fields.len());
                self.fields.push(field);
            }
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Type tag of `field_name`, falling back to [`DEFAULT_FIELD_TYPE`]
    pub fn field_type(&self, field_name: &str) -> &str {
        self.field(field_name)
            .map(|f| f.field_type.as_str())
            .unwrap_or(DEFAULT_FIELD_TYPE)
    }

    /// Decode `field_name` of `record` using its declared type
    pub fn marshall(&self, registry: &Registry, field_name: &str, record: &Element) -> MarshalResult<FieldValue> {
        registry.marshall(self.field_type(field_name), field_name, record)
    }
}

/// A child relationship of an sObject
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ChildRelationship {
    pub cascade_delete: bool,
    pub child_sobject: String,
    pub field: String,
    pub relationship_name: Option<String>,
}

impl ChildRelationship {
    pub fn from_element(e: &Element) -> Self {
        Self {
            cascade_delete: flag(e, "cascadeDelete"),
            child_sobject: text(e, "childSObject"),
            field: text(e, "field"),
            relationship_name: optional_text(e, "relationshipName"),
        }
    }
}

/// A record type available on an sObject
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RecordTypeInfo {
    pub available: bool,
    pub default_record_type_mapping: bool,
    pub name: String,
    pub record_type_id: String,
}

impl RecordTypeInfo {
    pub fn from_element(e: &Element) -> Self {
        Self {
            available: flag(e, "available"),
            default_record_type_mapping: flag(e, "defaultRecordTypeMapping"),
            name: text(e, "name"),
            record_type_id: text(e, "recordTypeId"),
        }
    }
}

/// Result of `describeSObjects` for one type
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SObjectDescription {
    pub name: String,
    pub label: String,
    pub label_plural: String,
    pub key_prefix: String,
    pub activateable: bool,
    pub createable: bool,
    pub custom: bool,
    pub custom_setting: Option<bool>,
    pub deletable: bool,
    pub deprecated_and_hidden: bool,
    pub feed_enabled: Option<bool>,
    pub layoutable: bool,
    pub mergeable: bool,
    pub queryable: bool,
    pub replicateable: bool,
    pub retrieveable: bool,
    pub searchable: bool,
    pub triggerable: Option<bool>,
    pub undeletable: bool,
    pub updateable: bool,
    pub url_detail: String,
    pub url_edit: String,
    pub url_new: String,
    pub child_relationships: Vec<ChildRelationship>,
    pub record_type_infos: Vec<RecordTypeInfo>,
    pub schema: TypeSchema,
}

impl SObjectDescription {
    /// Read a `describeSObjects` result element
    pub fn from_element(e: &Element) -> MarshalResult<Self> {
        let name = required_text(e, "name")?;
        let mut schema = TypeSchema::new(name.clone());
        for f in e.children(&ns::PARTNER.name("fields")) {
            schema.insert(FieldSchema::from_element(f)?);
        }

        Ok(Self {
            label: text(e, "label"),
            label_plural: text(e, "labelPlural"),
            key_prefix: text(e, "keyPrefix"),
            activateable: flag(e, "activateable"),
            createable: flag(e, "createable"),
            custom: flag(e, "custom"),
            custom_setting: optional_flag(e, "customSetting"),
            deletable: flag(e, "deletable"),
            deprecated_and_hidden: flag(e, "deprecatedAndHidden"),
            feed_enabled: optional_flag(e, "feedEnabled"),
            layoutable: flag(e, "layoutable"),
            mergeable: flag(e, "mergeable"),
            queryable: flag(e, "queryable"),
            replicateable: flag(e, "replicateable"),
            retrieveable: flag(e, "retrieveable"),
            searchable: flag(e, "searchable"),
            triggerable: optional_flag(e, "triggerable"),
            undeletable: flag(e, "undeletable"),
            updateable: flag(e, "updateable"),
            url_detail: text(e, "urlDetail"),
            url_edit: text(e, "urlEdit"),
            url_new: text(e, "urlNew"),
            child_relationships: e
                .children(&ns::PARTNER.name("childRelationships"))
                .into_iter()
                .map(ChildRelationship::from_element)
                .collect(),
            record_type_infos: e
                .children(&ns::PARTNER.name("recordTypeInfos"))
                .into_iter()
                .map(RecordTypeInfo::from_element)
                .collect(),
            name,
            schema,
        })
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.schema.field(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DEFAULT_REGISTRY;
    use pretty_assertions::assert_eq;
    use sforce_xml::parse_str;

    const DESCRIBE: &str = r#"<result xmlns="urn:partner.soap.sforce.com">
  <activateable>false</activateable>
  <childRelationships>
    <cascadeDelete>true</cascadeDelete>
    <childSObject>Case</childSObject>
    <field>ContactId</field>
    <relationshipName>Cases</relationshipName>
  </childRelationships>
  <createable>true</createable>
  <custom>false</custom>
  <fields>
    <autoNumber>false</autoNumber>
    <byteLength>18</byteLength>
    <name>Id</name>
    <nillable>false</nillable>
    <type>id</type>
    <soapType>tns:ID</soapType>
  </fields>
  <fields>
    <length>40</length>
    <name>Fruit__c</name>
    <picklistValues><active>true</active><defaultValue>false</defaultValue><label>Apple</label><value>Apple</value></picklistValues>
    <picklistValues><active>true</active><defaultValue>false</defaultValue><label>Pear</label><value>Pear</value></picklistValues>
    <type>multipicklist</type>
  </fields>
  <fields>
    <name>Birthdate</name>
    <type>date</type>
  </fields>
  <keyPrefix>003</keyPrefix>
  <label>Contact</label>
  <labelPlural>Contacts</labelPlural>
  <name>Contact</name>
  <queryable>true</queryable>
  <recordTypeInfos>
    <available>true</available>
    <defaultRecordTypeMapping>true</defaultRecordTypeMapping>
    <name>Master</name>
    <recordTypeId>012000000000000AAA</recordTypeId>
  </recordTypeInfos>
  <urlDetail>https://na1.salesforce.com/{ID}</urlDetail>
</result>"#;

    #[test]
    fn test_describe_extraction() {
        let d = SObjectDescription::from_element(&parse_str(DESCRIBE).unwrap()).unwrap();
        assert_eq!(d.name, "Contact");
        assert_eq!(d.label_plural, "Contacts");
        assert!(d.createable && d.queryable && !d.activateable);
        assert_eq!(d.custom_setting, None);
        assert_eq!(d.child_relationships.len(), 1);
        assert_eq!(d.child_relationships[0].relationship_name.as_deref(), Some("Cases"));
        assert_eq!(d.record_type_infos[0].name, "Master");
        assert_eq!(d.url_detail, "https://na1.salesforce.com/{ID}");

        let names: Vec<_> = d.schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Fruit__c", "Birthdate"]);

        let id = d.field("Id").unwrap();
        assert_eq!(id.byte_length, 18);
        assert_eq!(id.soap_type, "tns:ID");
        assert!(!id.html_formatted);
        assert_eq!(id.controller_name, None);

        let fruit = d.field("Fruit__c").unwrap();
        assert_eq!(fruit.picklist_values.len(), 2);
        assert_eq!(fruit.picklist_values[1].value, "Pear");
    }

    #[test]
    fn test_type_schema_marshall_with_fallback() {
        let d = SObjectDescription::from_element(&parse_str(DESCRIBE).unwrap()).unwrap();
        let record = parse_str(
            r#"<records xmlns="urn:sobject.partner.soap.sforce.com"><Fruit__c>Apple;Pear</Fruit__c><Birthdate>1970-01-04</Birthdate><Unknown> x </Unknown></records>"#,
        )
        .unwrap();

        assert_eq!(
            d.schema.marshall(&DEFAULT_REGISTRY, "Fruit__c", &record).unwrap(),
            FieldValue::List(vec!["Apple".into(), "Pear".into()])
        );
        assert!(d.schema.marshall(&DEFAULT_REGISTRY, "Birthdate", &record).unwrap().as_date().is_some());
        assert_eq!(d.schema.field_type("Unknown"), DEFAULT_FIELD_TYPE);
        assert_eq!(
            d.schema.marshall(&DEFAULT_REGISTRY, "Unknown", &record).unwrap(),
            FieldValue::Str("x".into())
        );
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let f = parse_str(r#"<fields xmlns="urn:partner.soap.sforce.com"><name>X</name><type>int</type><digits>lots</digits></fields>"#).unwrap();
        assert!(matches!(
            FieldSchema::from_element(&f),
            Err(MarshalError::InvalidNumber { field, .. }) if field == "digits"
        ));
    }

    #[test]
    fn test_field_requires_name_and_type() {
        let f = parse_str(r#"<fields xmlns="urn:partner.soap.sforce.com"><name>X</name></fields>"#).unwrap();
        assert!(matches!(FieldSchema::from_element(&f), Err(MarshalError::Xml(_))));
    }

    #[test]
    fn test_insert_replaces_field() {
        let mut t = TypeSchema::new("Account").with_field(FieldSchema::new("Name", "string"));
        t.insert(FieldSchema::new("Name", "textarea"));
        assert_eq!(t.len(), 1);
        assert_eq!(t.field_type("Name"), "textarea");
    }
}
