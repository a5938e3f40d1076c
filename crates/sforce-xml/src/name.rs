//! Qualified names and namespace factories.

use std::borrow::Cow;
use std::fmt;

/// A `(namespace URI, local name)` pair.
///
/// Two names are equal only when both parts are equal, so `{urn:a}id` and
/// `{urn:b}id` never match each other, and neither matches a bare `id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QName {
    namespace: Option<String>,
    local: String,
}

impl QName {
    /// Create a namespace-qualified name
    pub fn new<N: Into<String>, L: Into<String>>(namespace: N, local: L) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local: local.into(),
        }
    }

    /// Create a name in no namespace
    pub fn unqualified<L: Into<String>>(local: L) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    /// Create a name from an optional namespace URI
    pub fn from_parts<L: Into<String>>(namespace: Option<&str>, local: L) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local: local.into(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn is_qualified(&self) -> bool {
        self.namespace.is_some()
    }

    /// A name with the same namespace and a different local part
    pub fn sibling<L: Into<String>>(&self, local: L) -> QName {
        Self {
            namespace: self.namespace.clone(),
            local: local.into(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

impl From<&str> for QName {
    fn from(local: &str) -> Self {
        QName::unqualified(local)
    }
}

impl From<&QName> for QName {
    fn from(name: &QName) -> Self {
        name.clone()
    }
}

/// Factory for names bound to one namespace URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    uri: Cow<'static, str>,
}

impl Namespace {
    pub const fn from_static(uri: &'static str) -> Self {
        Self {
            uri: Cow::Borrowed(uri),
        }
    }

    pub fn new<S: Into<String>>(uri: S) -> Self {
        Self {
            uri: Cow::Owned(uri.into()),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Build the qualified name `{uri}local`
    pub fn name<L: Into<String>>(&self, local: L) -> QName {
        QName::new(self.uri.to_string(), local)
    }
}

/// Namespaces spoken by the partner SOAP API.
pub mod ns {
    use super::Namespace;

    pub const SOAP_ENVELOPE_URI: &str = "http://schemas.xmlsoap.org/soap/envelope/";
    pub const PARTNER_URI: &str = "urn:partner.soap.sforce.com";
    pub const SOBJECT_URI: &str = "urn:sobject.partner.soap.sforce.com";
    pub const XSI_URI: &str = "http://www.w3.org/2001/XMLSchema-instance";
    pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";

    /// SOAP 1.1 envelope (`Envelope`, `Header`, `Body`, `Fault`)
    pub const SOAP_ENVELOPE: Namespace = Namespace::from_static(SOAP_ENVELOPE_URI);
    /// Partner API operations and result structures
    pub const PARTNER: Namespace = Namespace::from_static(PARTNER_URI);
    /// sObject record fields
    pub const SOBJECT: Namespace = Namespace::from_static(SOBJECT_URI);
    /// XML Schema instance (`xsi:type`, `xsi:nil`)
    pub const XSI: Namespace = Namespace::from_static(XSI_URI);
}
