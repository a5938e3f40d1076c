//! Raw RPC client.
//!
//! Each method fixes its operation name and the order of its body elements,
//! and returns the normalized result tree. Turning those trees into typed
//! values is left to higher layers.

use chrono::{DateTime, Utc};
use sforce_xml::{ns, Element, Record, Value};

use crate::config::ClientConfig;
use crate::envelope::Envelope;
use crate::error::{SoapError, SoapResult};
use crate::protocol::{post, CallResult};
use crate::transport::{HttpTransport, Transport};

/// An authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub session_id: String,
    pub server_url: String,
}

/// Partner API client over a [`Transport`].
///
/// Not meant for concurrent use: calls on one client are made one after
/// another and share its transport.
pub struct Client<T: Transport = HttpTransport> {
    config: ClientConfig,
    transport: T,
    session: Option<Session>,
}

impl Client<HttpTransport> {
    /// Client over the blocking HTTP transport
    pub fn new(config: ClientConfig) -> SoapResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            session: None,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_some()
    }

    // ========================================================================
    // Plumbing
    // ========================================================================

    fn session_or_err(&self) -> SoapResult<&Session> {
        self.session.as_ref().ok_or(SoapError::NotLoggedIn)
    }

    /// Envelope for an authenticated operation
    fn authenticated(&self, operation: &str) -> SoapResult<Envelope> {
        let session = self.session_or_err()?;
        Ok(Envelope::new(operation).with_session(session.session_id.as_str()))
    }

    /// Envelope carrying the `QueryOptions` header
    fn with_query_options(&self, operation: &str) -> SoapResult<Envelope> {
        Ok(self.authenticated(operation)?.with_batch_size(self.config.batch_size))
    }

    fn call(&self, envelope: &Envelope, always_list: bool) -> SoapResult<CallResult> {
        let session = self.session_or_err()?;
        tracing::debug!("Calling {}", envelope.operation());
        post(&self.transport, &self.config, &session.server_url, envelope, always_list)
    }

    // ========================================================================
    // Session
    // ========================================================================

    /// Log in and keep the returned session for later calls
    pub fn login(&mut self, username: &str, password: &str) -> SoapResult<Element> {
        let envelope = Envelope::new("login")
            .element("username", username)
            .element("password", password);
        tracing::debug!("Logging in as {username} at {}", self.config.server_url);
        let result = post(&self.transport, &self.config, &self.config.server_url, &envelope, false)?
            .into_one()?;

        let session_id = result.child(&ns::PARTNER.name("sessionId"))?.text();
        let server_url = result.child(&ns::PARTNER.name("serverUrl"))?.text();
        self.use_session(session_id, server_url);
        Ok(result)
    }

    /// Adopt an existing session
    pub fn use_session<S: Into<String>, U: Into<String>>(&mut self, session_id: S, server_url: U) {
        let session = Session {
            session_id: session_id.into(),
            server_url: server_url.into(),
        };
        tracing::debug!("Using session at {}", session.server_url);
        self.session = Some(session);
    }

    /// End the session; the stored session is dropped on success
    pub fn logout(&mut self) -> SoapResult<CallResult> {
        let envelope = self.authenticated("logout")?;
        let result = self.call(&envelope, false)?;
        self.session = None;
        Ok(result)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn query(&self, soql: &str) -> SoapResult<CallResult> {
        let envelope = self.with_query_options("query")?.element("queryString", soql);
        self.call(&envelope, false)
    }

    pub fn query_more(&self, query_locator: &str) -> SoapResult<CallResult> {
        let envelope = self
            .with_query_options("queryMore")?
            .element("queryLocator", query_locator);
        self.call(&envelope, false)
    }

    pub fn search(&self, sosl: &str) -> SoapResult<CallResult> {
        let envelope = self.with_query_options("search")?.element("searchString", sosl);
        self.call(&envelope, false)
    }

    pub fn get_updated(
        &self,
        sobject_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SoapResult<CallResult> {
        self.changed_between("getUpdated", sobject_type, start, end)
    }

    pub fn get_deleted(
        &self,
        sobject_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SoapResult<CallResult> {
        self.changed_between("getDeleted", sobject_type, start, end)
    }

    fn changed_between(
        &self,
        operation: &str,
        sobject_type: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SoapResult<CallResult> {
        let envelope = self
            .authenticated(operation)?
            .element("sObjectType", sobject_type)
            .element("startDate", start)
            .element("endDate", end);
        self.call(&envelope, false)
    }

    /// `field_list` is a comma-separated field list
    pub fn retrieve(&self, field_list: &str, sobject_type: &str, ids: &[&str]) -> SoapResult<CallResult> {
        let envelope = self
            .authenticated("retrieve")?
            .element("fieldList", field_list)
            .element("sObjectType", sobject_type)
            .element("ids", ids.to_vec());
        self.call(&envelope, false)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub fn create(&self, records: &[Record]) -> SoapResult<CallResult> {
        let envelope = self.authenticated("create")?.sobjects("sObjects", records.to_vec());
        self.call(&envelope, false)
    }

    pub fn update(&self, records: &[Record]) -> SoapResult<CallResult> {
        let envelope = self.authenticated("update")?.sobjects("sObjects", records.to_vec());
        self.call(&envelope, false)
    }

    pub fn upsert(&self, external_id_field: &str, records: &[Record]) -> SoapResult<CallResult> {
        let envelope = self
            .authenticated("upsert")?
            .element("externalIDFieldName", external_id_field)
            .sobjects("sObjects", records.to_vec());
        self.call(&envelope, false)
    }

    pub fn delete(&self, ids: &[&str]) -> SoapResult<CallResult> {
        let envelope = self.authenticated("delete")?.element("ids", ids.to_vec());
        self.call(&envelope, false)
    }

    /// Lead conversions; fields live in the partner namespace
    pub fn convert_leads(&self, lead_converts: &[Record]) -> SoapResult<CallResult> {
        let converts: Vec<Value> = lead_converts.iter().cloned().map(Value::Record).collect();
        let envelope = self
            .authenticated("convertLead")?
            .element("leadConverts", converts);
        self.call(&envelope, false)
    }

    /// Send messages of `mass_type` (`SingleEmailMessage` or
    /// `MassEmailMessage`)
    pub fn send_email(&self, messages: &[Record], mass_type: &str) -> SoapResult<CallResult> {
        let messages: Vec<Value> = messages.iter().cloned().map(Value::Record).collect();
        let xsi_type = vec![(ns::XSI.name("type"), format!("p:{mass_type}"))];
        let envelope = self
            .authenticated("sendEmail")?
            .element_with_attrs("messages", messages, xsi_type);
        self.call(&envelope, false)
    }

    // ========================================================================
    // Describe
    // ========================================================================

    pub fn describe_sobjects(&self, sobject_types: &[&str]) -> SoapResult<CallResult> {
        let envelope = self
            .authenticated("describeSObjects")?
            .element("sObjectType", sobject_types.to_vec());
        self.call(&envelope, false)
    }

    pub fn describe_global(&self) -> SoapResult<CallResult> {
        let envelope = self.authenticated("describeGlobal")?;
        self.call(&envelope, false)
    }

    pub fn describe_layout(&self, sobject_type: &str) -> SoapResult<CallResult> {
        let envelope = self
            .authenticated("describeLayout")?
            .element("sObjectType", sobject_type);
        self.call(&envelope, false)
    }

    /// Always a list, even for a single tab set
    pub fn describe_tabs(&self) -> SoapResult<CallResult> {
        let envelope = self.authenticated("describeTabs")?;
        self.call(&envelope, true)
    }

    // ========================================================================
    // Utility
    // ========================================================================

    /// Server time as sent by the server (ISO-8601)
    pub fn get_server_timestamp(&self) -> SoapResult<String> {
        let envelope = self.authenticated("getServerTimestamp")?;
        let result = self.call(&envelope, false)?.into_one()?;
        Ok(result.child(&ns::PARTNER.name("timestamp"))?.text())
    }

    pub fn reset_password(&self, user_id: &str) -> SoapResult<CallResult> {
        let envelope = self.authenticated("resetPassword")?.element("userId", user_id);
        self.call(&envelope, false)
    }

    pub fn set_password(&self, user_id: &str, password: &str) -> SoapResult<CallResult> {
        let envelope = self
            .authenticated("setPassword")?
            .element("userId", user_id)
            .element("password", password);
        self.call(&envelope, false)
    }

    pub fn get_user_info(&self) -> SoapResult<CallResult> {
        let envelope = self.authenticated("getUserInfo")?;
        self.call(&envelope, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::{HttpRequest, HttpResponse};

    struct Unreachable;

    impl Transport for Unreachable {
        fn send(&self, _request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Other("should not be called".to_string()))
        }
    }

    #[test]
    fn test_authenticated_calls_require_session() {
        let client = Client::with_transport(ClientConfig::default(), Unreachable);
        assert!(matches!(client.query("SELECT Id FROM Account"), Err(SoapError::NotLoggedIn)));
        assert!(matches!(client.describe_global(), Err(SoapError::NotLoggedIn)));
        assert!(!client.is_logged_in());
    }

    #[test]
    fn test_use_session() {
        let mut client = Client::with_transport(ClientConfig::default(), Unreachable);
        client.use_session("SID", "https://na1.salesforce.com/services/Soap/u/20.0");
        assert_eq!(client.session().map(|s| s.session_id.as_str()), Some("SID"));
        // reaches the transport now
        assert!(matches!(client.describe_global(), Err(SoapError::Transport(_))));
    }
}
