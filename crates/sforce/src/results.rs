//! Typed views of partner API results.
//!
//! All result elements live in the partner namespace. Flags the server
//! leaves out read as `false` and strings as empty, except where a field is
//! an `Option`.

use sforce_marshal::{MarshalError, Registry};
use sforce_xml::{ns, Element};

use crate::error::Result;

// ============================================================================
// Element helpers
// ============================================================================

pub(crate) fn text(e: &Element, local: &str) -> String {
    e.find_child(&ns::PARTNER.name(local))
        .map(Element::text)
        .unwrap_or_default()
}

/// `None` when the child is absent, nil or empty
pub(crate) fn optional_text(e: &Element, local: &str) -> Option<String> {
    e.find_child(&ns::PARTNER.name(local))
        .filter(|c| !is_nil(c))
        .map(Element::text)
        .filter(|t| !t.is_empty())
}

pub(crate) fn flag(e: &Element, local: &str) -> bool {
    optional_flag(e, local).unwrap_or(false)
}

pub(crate) fn optional_flag(e: &Element, local: &str) -> Option<bool> {
    e.find_child(&ns::PARTNER.name(local)).map(|c| c.text() == "true")
}

pub(crate) fn number(e: &Element, local: &str) -> Result<i64> {
    match e.find_child(&ns::PARTNER.name(local)) {
        None => Ok(0),
        Some(c) => {
            let value = c.text();
            value.parse().map_err(|_| {
                MarshalError::InvalidNumber {
                    field: local.to_string(),
                    value,
                }
                .into()
            })
        }
    }
}

pub(crate) fn texts(e: &Element, local: &str) -> Vec<String> {
    e.children(&ns::PARTNER.name(local))
        .into_iter()
        .map(Element::text)
        .collect()
}

/// `xsi:nil="true"`
pub(crate) fn is_nil(e: &Element) -> bool {
    e.find_attribute(ns::XSI.name("nil")) == Some("true")
}

fn errors(e: &Element) -> Vec<SaveError> {
    e.children(&ns::PARTNER.name("errors"))
        .into_iter()
        .map(SaveError::from_element)
        .collect()
}

// ============================================================================
// Session
// ============================================================================

/// The logged-in user and their organization
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct UserInfo {
    pub accessibility_mode: bool,
    pub currency_symbol: String,
    pub organization_id: String,
    pub organization_multi_currency: bool,
    pub organization_name: String,
    pub user_default_currency_iso_code: String,
    pub user_email: String,
    pub user_full_name: String,
    pub user_id: String,
    pub user_language: String,
    pub user_locale: String,
    pub user_time_zone: String,
    pub user_ui_skin: String,
}

impl UserInfo {
    pub fn from_element(e: &Element) -> Self {
        Self {
            accessibility_mode: flag(e, "accessibilityMode"),
            currency_symbol: text(e, "currencySymbol"),
            organization_id: text(e, "organizationId"),
            organization_multi_currency: flag(e, "organizationMultiCurrency"),
            organization_name: text(e, "organizationName"),
            user_default_currency_iso_code: text(e, "userDefaultCurrencyIsoCode"),
            user_email: text(e, "userEmail"),
            user_full_name: text(e, "userFullName"),
            user_id: text(e, "userId"),
            user_language: text(e, "userLanguage"),
            user_locale: text(e, "userLocale"),
            user_time_zone: text(e, "userTimeZone"),
            user_ui_skin: text(e, "userUiSkin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LoginResult {
    pub password_expired: bool,
    pub server_url: String,
    pub session_id: String,
    pub user_id: String,
    pub user_info: UserInfo,
}

impl LoginResult {
    pub fn from_element(e: &Element) -> Self {
        Self {
            password_expired: flag(e, "passwordExpired"),
            server_url: text(e, "serverUrl"),
            session_id: text(e, "sessionId"),
            user_id: text(e, "userId"),
            user_info: e
                .find_child(&ns::PARTNER.name("userInfo"))
                .map(UserInfo::from_element)
                .unwrap_or_default(),
        }
    }
}

// ============================================================================
// Writes
// ============================================================================

/// One error reported for a failed record
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SaveError {
    pub status_code: String,
    pub message: String,
    pub fields: Vec<String>,
}

impl SaveError {
    pub fn from_element(e: &Element) -> Self {
        Self {
            status_code: text(e, "statusCode"),
            message: text(e, "message"),
            fields: texts(e, "fields"),
        }
    }
}

/// Outcome of `create`, `update`, `upsert` or `delete` for one record
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SaveResult {
    /// `None` when the record was not saved
    pub id: Option<String>,
    pub success: bool,
    /// Empty on success
    pub errors: Vec<SaveError>,
    /// Only reported by `upsert`
    pub created: Option<bool>,
}

impl SaveResult {
    pub fn from_element(e: &Element) -> Self {
        let success = flag(e, "success");
        Self {
            id: optional_text(e, "id"),
            success,
            errors: if success { Vec::new() } else { errors(e) },
            created: optional_flag(e, "created"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LeadConvertResult {
    pub success: bool,
    pub errors: Vec<SaveError>,
    pub account_id: Option<String>,
    pub contact_id: Option<String>,
    pub lead_id: Option<String>,
    pub opportunity_id: Option<String>,
}

impl LeadConvertResult {
    pub fn from_element(e: &Element) -> Self {
        let success = flag(e, "success");
        Self {
            success,
            errors: if success { Vec::new() } else { errors(e) },
            account_id: optional_text(e, "accountId"),
            contact_id: optional_text(e, "contactId"),
            lead_id: optional_text(e, "leadId"),
            opportunity_id: optional_text(e, "opportunityId"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SendEmailResult {
    pub success: bool,
    pub errors: Vec<SaveError>,
}

impl SendEmailResult {
    pub fn from_element(e: &Element) -> Self {
        let success = flag(e, "success");
        Self {
            success,
            errors: if success { Vec::new() } else { errors(e) },
        }
    }
}

// ============================================================================
// Replication
// ============================================================================

/// A record reported by `getDeleted`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DeletedRecord {
    pub id: String,
    /// `None` if the server sent a date that does not parse
    pub deleted_date: Option<chrono::NaiveDateTime>,
}

impl DeletedRecord {
    /// `deletedDate` is decoded with the registry's `datetime` converter
    pub fn from_element(registry: &Registry, e: &Element) -> Result<Self> {
        let deleted_date = registry
            .marshall_in(&ns::PARTNER, "datetime", "deletedDate", e)?
            .as_datetime();
        Ok(Self {
            id: text(e, "id"),
            deleted_date,
        })
    }
}

// ============================================================================
// Describe
// ============================================================================

/// Per-type entry of `describeGlobal`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SObjectSummary {
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
    pub triggerable: bool,
    pub undeletable: bool,
    pub updateable: bool,
}

impl SObjectSummary {
    pub fn from_element(e: &Element) -> Self {
        Self {
            name: text(e, "name"),
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
            triggerable: flag(e, "triggerable"),
            undeletable: flag(e, "undeletable"),
            updateable: flag(e, "updateable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DescribeGlobal {
    pub encoding: String,
    pub max_batch_size: i64,
    pub sobjects: Vec<SObjectSummary>,
    /// Type names; taken from `sobjects` when the server sends no `types`
    pub types: Vec<String>,
}

impl DescribeGlobal {
    pub fn from_element(e: &Element) -> Result<Self> {
        let sobjects: Vec<SObjectSummary> = e
            .children(&ns::PARTNER.name("sobjects"))
            .into_iter()
            .map(SObjectSummary::from_element)
            .collect();
        let mut types = texts(e, "types");
        if types.is_empty() {
            types = sobjects.iter().map(|s| s.name.clone()).collect();
        }
        Ok(Self {
            encoding: text(e, "encoding"),
            max_batch_size: number(e, "maxBatchSize")?,
            sobjects,
            types,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Tab {
    pub custom: bool,
    pub label: String,
    pub sobject_name: String,
    pub url: String,
}

impl Tab {
    pub fn from_element(e: &Element) -> Self {
        Self {
            custom: flag(e, "custom"),
            label: text(e, "label"),
            sobject_name: text(e, "sobjectName"),
            url: text(e, "url"),
        }
    }
}

/// An app and its tabs, from `describeTabs`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TabSet {
    pub label: String,
    pub logo_url: String,
    pub selected: bool,
    pub tabs: Vec<Tab>,
}

impl TabSet {
    pub fn from_element(e: &Element) -> Self {
        Self {
            label: text(e, "label"),
            logo_url: text(e, "logoUrl"),
            selected: flag(e, "selected"),
            tabs: e
                .children(&ns::PARTNER.name("tabs"))
                .into_iter()
                .map(Tab::from_element)
                .collect(),
        }
    }
}
