//! Request envelope construction.
//!
//! ```text
//! <s:Envelope xmlns:s=.. xmlns:p=.. xmlns:o=.. xmlns:x=..>
//!   <s:Header>
//!     <p:CallOptions><p:client>..</p:client></p:CallOptions>
//!     [<p:SessionHeader><p:sessionId>..</p:sessionId></p:SessionHeader>]
//!     [<p:QueryOptions><p:batchSize>N</p:batchSize></p:QueryOptions>]
//!   </s:Header>
//!   <s:Body>
//!     <p:operation>..body parts, in order..</p:operation>
//!   </s:Body>
//! </s:Envelope>
//! ```

use sforce_xml::{ns, QName, Record, Value, XmlWriter};

use crate::error::SoapResult;

/// One child of the operation element
#[derive(Debug, Clone, PartialEq)]
pub enum BodyPart {
    /// A partner-namespace element (repeated for lists)
    Element {
        name: QName,
        value: Value,
        attrs: Vec<(QName, String)>,
    },
    /// Records written as partner-namespace containers whose fields are in
    /// the sObject namespace
    SObjects { name: QName, records: Vec<Record> },
}

/// A single SOAP request
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    operation: String,
    session_id: Option<String>,
    batch_size: Option<u32>,
    body: Vec<BodyPart>,
}

impl Envelope {
    pub fn new<S: Into<String>>(operation: S) -> Self {
        Self {
            operation: operation.into(),
            session_id: None,
            batch_size: None,
            body: Vec::new(),
        }
    }

    /// Add a `SessionHeader`
    pub fn with_session<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Add a `QueryOptions` header
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Append `<p:name>value</p:name>`
    pub fn element<V: Into<Value>>(mut self, name: &str, value: V) -> Self {
        self.body.push(BodyPart::Element {
            name: ns::PARTNER.name(name),
            value: value.into(),
            attrs: Vec::new(),
        });
        self
    }

    /// Append an element carrying attributes on each occurrence
    pub fn element_with_attrs<V: Into<Value>>(
        mut self,
        name: &str,
        value: V,
        attrs: Vec<(QName, String)>,
    ) -> Self {
        self.body.push(BodyPart::Element {
            name: ns::PARTNER.name(name),
            value: value.into(),
            attrs,
        });
        self
    }

    /// Append one `<p:name>` container per record
    pub fn sobjects(mut self, name: &str, records: Vec<Record>) -> Self {
        self.body.push(BodyPart::SObjects {
            name: ns::PARTNER.name(name),
            records,
        });
        self
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn body(&self) -> &[BodyPart] {
        &self.body
    }

    /// Serialize, gzip-compressed when `compress` is set
    pub fn to_bytes(&self, client_id: &str, compress: bool) -> SoapResult<Vec<u8>> {
        let mut w = XmlWriter::new(compress)?;
        w.declare_prefix("s", ns::SOAP_ENVELOPE_URI);
        w.declare_prefix("p", ns::PARTNER_URI);
        w.declare_prefix("o", ns::SOBJECT_URI);
        w.declare_prefix("x", ns::XSI_URI);
        w.start_element(&ns::SOAP_ENVELOPE.name("Envelope"), &[])?;

        w.start_element(&ns::SOAP_ENVELOPE.name("Header"), &[])?;
        w.characters("\n")?;
        w.start_element(&ns::PARTNER.name("CallOptions"), &[])?;
        w.write_value(&ns::PARTNER.name("client"), &Value::from(client_id), &[])?;
        w.end_element()?;
        w.characters("\n")?;
        if let Some(session_id) = &self.session_id {
            w.start_element(&ns::PARTNER.name("SessionHeader"), &[])?;
            w.write_value(&ns::PARTNER.name("sessionId"), &Value::from(session_id.as_str()), &[])?;
            w.end_element()?;
        }
        if let Some(batch_size) = self.batch_size {
            w.start_element(&ns::PARTNER.name("QueryOptions"), &[])?;
            w.write_value(&ns::PARTNER.name("batchSize"), &Value::Int(i64::from(batch_size)), &[])?;
            w.end_element()?;
        }
        w.end_element()?;

        w.start_element(&ns::SOAP_ENVELOPE.name("Body"), &[])?;
        w.characters("\n")?;
        w.start_element(&ns::PARTNER.name(self.operation.as_str()), &[])?;
        let field_ns = ns::SOBJECT.name("type");
        for part in &self.body {
            match part {
                BodyPart::Element { name, value, attrs } => w.write_value(name, value, attrs)?,
                BodyPart::SObjects { name, records } => {
                    for record in records {
                        w.write_record_in(name, &field_ns, record, &[])?;
                    }
                }
            }
        }
        w.end_element()?;
        w.end_element()?;
        w.end_element()?;

        Ok(w.end_document()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sforce_xml::parse;

    fn body_op(env: &Envelope) -> sforce_xml::Element {
        let root = parse(&env.to_bytes("test/1.0", false).unwrap()).unwrap();
        root.child(&ns::SOAP_ENVELOPE.name("Body"))
            .unwrap()
            .first_element()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_header_layout() {
        let env = Envelope::new("query")
            .with_session("SID")
            .with_batch_size(200)
            .element("queryString", "SELECT Id FROM Account");
        let xml = String::from_utf8(env.to_bytes("test/1.0", false).unwrap()).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains(
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" xmlns:p="urn:partner.soap.sforce.com" xmlns:o="urn:sobject.partner.soap.sforce.com" xmlns:x="http://www.w3.org/2001/XMLSchema-instance">"#
        ));
        assert!(xml.contains(
            "<s:Header>\n<p:CallOptions><p:client>test/1.0</p:client></p:CallOptions>\n\
             <p:SessionHeader><p:sessionId>SID</p:sessionId></p:SessionHeader>\
             <p:QueryOptions><p:batchSize>200</p:batchSize></p:QueryOptions></s:Header>"
        ));
        assert!(xml.contains(
            "<s:Body>\n<p:query><p:queryString>SELECT Id FROM Account</p:queryString></p:query></s:Body></s:Envelope>"
        ));
    }

    #[test]
    fn test_login_has_no_session_header() {
        let env = Envelope::new("login").element("username", "u").element("password", "p");
        let xml = String::from_utf8(env.to_bytes("c", false).unwrap()).unwrap();
        assert!(!xml.contains("SessionHeader"));
        assert!(!xml.contains("QueryOptions"));
    }

    #[test]
    fn test_body_order_is_preserved() {
        let env = Envelope::new("retrieve")
            .with_session("SID")
            .element("fieldList", "Id, Name")
            .element("sObjectType", "Account")
            .element("ids", vec!["001", "002"]);
        let op = body_op(&env);
        let names: Vec<_> = op.elements().map(|e| e.name().local_name().to_string()).collect();
        assert_eq!(names, vec!["fieldList", "sObjectType", "ids", "ids"]);
    }

    #[test]
    fn test_sobjects_fields_in_sobject_namespace_type_first() {
        let record = Record::new().with("LastName", "Doe").with("type", "Contact");
        let env = Envelope::new("create").with_session("SID").sobjects("sObjects", vec![record]);
        let op = body_op(&env);
        let container = op.child(&ns::PARTNER.name("sObjects")).unwrap();
        let names: Vec<_> = container.elements().map(|e| e.name().clone()).collect();
        assert_eq!(
            names,
            vec![ns::SOBJECT.name("type"), ns::SOBJECT.name("LastName")]
        );
    }

    #[test]
    fn test_compressed_envelope() {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let env = Envelope::new("getUserInfo").with_session("SID");
        let bytes = env.to_bytes("c", true).unwrap();
        let mut xml = String::new();
        GzDecoder::new(&bytes[..]).read_to_string(&mut xml).unwrap();
        assert!(xml.ends_with("<p:getUserInfo></p:getUserInfo></s:Body></s:Envelope>"));
    }
}
