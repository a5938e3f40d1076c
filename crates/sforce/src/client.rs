//! Typed partner API client.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sforce_marshal::{
    prepare_sobject_without_nulls, prepare_sobjects, Registry, SObjectDescription, SchemaCache, TypeSchema,
};
use sforce_soap::{CallResult, Client, ClientConfig, HttpTransport, Session, SoapError, Transport};
use sforce_xml::{ns, Element, Record};

use crate::error::{Error, Result};
use crate::records::{record_types, Extractor, QueryRecord, QueryRecordSet};
use crate::results::{
    is_nil, text, texts, DeletedRecord, DescribeGlobal, LeadConvertResult, LoginResult, SaveResult,
    SendEmailResult, TabSet, UserInfo,
};

/// Typed client over the raw partner API client.
///
/// Query results are decoded with the schemas of the record types they
/// contain. Those types are described once per call, or once per client when
/// [`ClientConfig::cache_type_descriptions`] is set.
pub struct SforceClient<T: Transport = HttpTransport> {
    raw: Client<T>,
    registry: Registry,
    cache: SchemaCache,
}

impl SforceClient<HttpTransport> {
    /// Client over the blocking HTTP transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        Ok(Self::from_raw(Client::new(config)?))
    }
}

impl<T: Transport> SforceClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self::from_raw(Client::with_transport(config, transport))
    }

    pub fn from_raw(raw: Client<T>) -> Self {
        Self {
            raw,
            registry: Registry::new(),
            cache: SchemaCache::new(),
        }
    }

    /// Builder: decode field values with `registry` instead of the built-ins
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// The raw client, for operations without a typed wrapper
    pub fn raw(&self) -> &Client<T> {
        &self.raw
    }

    pub fn raw_mut(&mut self) -> &mut Client<T> {
        &mut self.raw
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn schema_cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Forget cached type descriptions
    pub fn flush_schema_cache(&mut self) {
        self.cache.flush();
    }

    pub fn session(&self) -> Option<&Session> {
        self.raw.session()
    }

    pub fn is_logged_in(&self) -> bool {
        self.raw.is_logged_in()
    }

    pub fn use_session<S: Into<String>, U: Into<String>>(&mut self, session_id: S, server_url: U) {
        self.raw.use_session(session_id, server_url);
    }

    // ========================================================================
    // Schemas
    // ========================================================================

    /// Schemas for `types`, describing the ones not known yet
    fn schemas_for(&mut self, types: &BTreeSet<String>) -> Result<SchemaCache> {
        let caching = self.raw.config().cache_type_descriptions;
        let mut scratch = SchemaCache::new();
        let cache = if caching { &mut self.cache } else { &mut scratch };

        let missing = cache.missing(types.iter().map(String::as_str));
        if !missing.is_empty() {
            tracing::debug!("Describing {} record type(s): {}", missing.len(), missing.join(", "));
            let names: Vec<&str> = missing.iter().map(String::as_str).collect();
            let described = describe(&self.raw, &names)?;
            if described.len() != names.len() {
                tracing::warn!("Asked to describe {} type(s), got {}", names.len(), described.len());
            }
            // results come back in request order; key them by the requested name
            for (name, d) in names.iter().zip(described) {
                cache.insert(*name, d.schema);
            }
        }

        Ok(if caching { self.cache.clone() } else { scratch })
    }

    fn extract_set(&mut self, result: &Element) -> Result<QueryRecordSet> {
        let types = record_types(result.children(&ns::PARTNER.name("records")));
        let schemas = self.schemas_for(&types)?;
        let set = Extractor {
            registry: &self.registry,
            schemas: &schemas,
        }
        .record_set(result)?;
        tracing::trace!("Extracted {} of {} record(s), done={}", set.len(), set.size, set.done);
        Ok(set)
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub fn login(&mut self, username: &str, password: &str) -> Result<LoginResult> {
        let result = self.raw.login(username, password)?;
        Ok(LoginResult::from_element(&result))
    }

    /// `true` when the server acknowledged the logout
    pub fn logout(&mut self) -> Result<bool> {
        Ok(match self.raw.logout()? {
            CallResult::Empty(wrapper) => wrapper.name() == &ns::PARTNER.name("logoutResponse"),
            _ => false,
        })
    }

    pub fn get_user_info(&self) -> Result<UserInfo> {
        let result = self.raw.get_user_info()?.into_one()?;
        Ok(UserInfo::from_element(&result))
    }

    pub fn get_server_timestamp(&self) -> Result<String> {
        Ok(self.raw.get_server_timestamp()?)
    }

    /// Reset a user's password; returns the generated password
    pub fn reset_password(&self, user_id: &str) -> Result<String> {
        let result = self.raw.reset_password(user_id)?.into_one()?;
        Ok(text(&result, "password"))
    }

    pub fn set_password(&self, user_id: &str, password: &str) -> Result<()> {
        self.raw.set_password(user_id, password)?;
        Ok(())
    }

    // ========================================================================
    // Describe
    // ========================================================================

    pub fn describe_sobjects(&self, sobject_types: &[&str]) -> Result<Vec<SObjectDescription>> {
        describe(&self.raw, sobject_types)
    }

    pub fn describe_sobject(&self, sobject_type: &str) -> Result<SObjectDescription> {
        self.describe_sobjects(&[sobject_type])?
            .into_iter()
            .next()
            .ok_or_else(|| SoapError::MissingResult.into())
    }

    pub fn describe_global(&self) -> Result<DescribeGlobal> {
        let result = self.raw.describe_global()?.into_one()?;
        DescribeGlobal::from_element(&result)
    }

    pub fn describe_tabs(&self) -> Result<Vec<TabSet>> {
        Ok(self
            .raw
            .describe_tabs()?
            .into_vec()
            .iter()
            .map(TabSet::from_element)
            .collect())
    }

    /// Layout descriptions are returned as parsed trees
    pub fn describe_layout(&self, sobject_type: &str) -> Result<Vec<Element>> {
        Ok(self.raw.describe_layout(sobject_type)?.into_vec())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn query(&mut self, soql: &str) -> Result<QueryRecordSet> {
        let result = self.raw.query(soql)?.into_one()?;
        self.extract_set(&result)
    }

    pub fn query_more(&mut self, query_locator: &str) -> Result<QueryRecordSet> {
        let result = self.raw.query_more(query_locator)?.into_one()?;
        self.extract_set(&result)
    }

    /// Records matched by a SOSL search, in relevance order
    pub fn search(&mut self, sosl: &str) -> Result<Vec<QueryRecord>> {
        let results = self.raw.search(sosl)?.into_vec();
        let hits: Vec<&Element> = results
            .iter()
            .flat_map(|r| r.children(&ns::PARTNER.name("searchRecords")))
            .filter_map(|s| s.find_child(&ns::PARTNER.name("record")))
            .collect();
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let schemas = self.schemas_for(&record_types(hits.iter().copied()))?;
        let extractor = Extractor {
            registry: &self.registry,
            schemas: &schemas,
        };
        hits.into_iter().map(|r| extractor.record(r)).collect()
    }

    /// `field_list` is comma separated; ids that match nothing are skipped
    pub fn retrieve(&mut self, field_list: &str, sobject_type: &str, ids: &[&str]) -> Result<Vec<QueryRecord>> {
        let results = self.raw.retrieve(field_list, sobject_type, ids)?.into_vec();

        let types = BTreeSet::from([sobject_type.to_string()]);
        let schemas = self.schemas_for(&types)?;
        let schema = schemas
            .get(sobject_type)
            .unwrap_or_else(|| Arc::new(TypeSchema::new(sobject_type)));
        let names: Vec<&str> = field_list
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .collect();

        let extractor = Extractor {
            registry: &self.registry,
            schemas: &schemas,
        };
        results
            .iter()
            .filter(|r| !is_nil(r))
            .map(|r| extractor.fields(&schema, &names, r))
            .collect()
    }

    /// Ids of records of `sobject_type` updated between `start` and `end`
    pub fn get_updated(&self, sobject_type: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<String>> {
        let result = self.raw.get_updated(sobject_type, start, end)?.into_one()?;
        Ok(texts(&result, "ids"))
    }

    pub fn get_deleted(
        &self,
        sobject_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DeletedRecord>> {
        let result = self.raw.get_deleted(sobject_type, start, end)?.into_one()?;
        result
            .children(&ns::PARTNER.name("deletedRecords"))
            .into_iter()
            .map(|r| DeletedRecord::from_element(&self.registry, r))
            .collect()
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub fn create(&self, records: &[Record]) -> Result<Vec<SaveResult>> {
        let prepared = prepare_sobjects(records)?;
        Ok(save_results(self.raw.create(&prepared)?))
    }

    pub fn update(&self, records: &[Record]) -> Result<Vec<SaveResult>> {
        let prepared = prepare_sobjects(records)?;
        Ok(save_results(self.raw.update(&prepared)?))
    }

    pub fn upsert(&self, external_id_field: &str, records: &[Record]) -> Result<Vec<SaveResult>> {
        let prepared = prepare_sobjects(records)?;
        Ok(save_results(self.raw.upsert(external_id_field, &prepared)?))
    }

    pub fn delete(&self, ids: &[&str]) -> Result<Vec<SaveResult>> {
        Ok(save_results(self.raw.delete(ids)?))
    }

    pub fn convert_leads(&self, lead_converts: &[Record]) -> Result<Vec<LeadConvertResult>> {
        let prepared = lead_converts
            .iter()
            .map(prepare_sobject_without_nulls)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(self
            .raw
            .convert_leads(&prepared)?
            .into_vec()
            .iter()
            .map(LeadConvertResult::from_element)
            .collect())
    }

    /// `mass_type` is `SingleEmailMessage` or `MassEmailMessage`
    pub fn send_email(&self, messages: &[Record], mass_type: &str) -> Result<Vec<SendEmailResult>> {
        let prepared = messages
            .iter()
            .map(prepare_sobject_without_nulls)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(self
            .raw
            .send_email(&prepared, mass_type)?
            .into_vec()
            .iter()
            .map(SendEmailResult::from_element)
            .collect())
    }
}

fn describe<T: Transport>(raw: &Client<T>, sobject_types: &[&str]) -> Result<Vec<SObjectDescription>> {
    raw.describe_sobjects(sobject_types)?
        .into_vec()
        .iter()
        .map(|e| SObjectDescription::from_element(e).map_err(Error::from))
        .collect()
}

fn save_results(result: CallResult) -> Vec<SaveResult> {
    result.into_vec().iter().map(SaveResult::from_element).collect()
}
