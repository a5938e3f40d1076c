//! Protocol behavior against a scripted in-memory transport

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use pretty_assertions::assert_eq;
use sforce_soap::{
    CallResult, Client, ClientConfig, HttpRequest, HttpResponse, SoapError, Transport,
    TransportError,
};
use sforce_xml::{ns, parse, Record, XmlError};

/// Replays canned replies and records every request it sees
#[derive(Default)]
struct Scripted {
    replies: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl Scripted {
    fn new(replies: Vec<Result<HttpResponse, TransportError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    fn attempts(&self) -> usize {
        self.requests.borrow().len()
    }

    fn last_request(&self) -> HttpRequest {
        self.requests.borrow().last().cloned().unwrap()
    }
}

impl Transport for Scripted {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("script exhausted".to_string())))
    }
}

fn envelope(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns="urn:partner.soap.sforce.com" xmlns:sf="urn:sobject.partner.soap.sforce.com" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"><soapenv:Body>{body}</soapenv:Body></soapenv:Envelope>"#
    )
}

fn ok(body: &str) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(200, envelope(body)))
}

fn fault(code: &str, message: &str) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse::new(
        500,
        envelope(&format!(
            "<soapenv:Fault><faultcode>{code}</faultcode><faultstring>{message}</faultstring></soapenv:Fault>"
        )),
    ))
}

fn refused() -> Result<HttpResponse, TransportError> {
    Err(TransportError::Connect("connection refused".to_string()))
}

fn plain_config() -> ClientConfig {
    ClientConfig::default().with_gzip(false)
}

fn logged_in(transport: &Scripted) -> Client<&Scripted> {
    let mut client = Client::with_transport(plain_config(), transport);
    client.use_session("SID", "https://na1.salesforce.com/services/Soap/u/20.0");
    client
}

fn request_xml(request: &HttpRequest) -> sforce_xml::Element {
    parse(&request.body).unwrap()
}

// ============================================================================
// Retry
// ============================================================================

#[test]
fn test_three_connection_failures_give_no_response() {
    let transport = Scripted::new(vec![refused(), refused(), refused(), ok("<x/>")]);
    let client = logged_in(&transport);

    let err = client.get_user_info().unwrap_err();
    match err {
        SoapError::NoResponse { attempts, source } => {
            assert_eq!(attempts, 3);
            assert!(source.is_connect());
        }
        other => panic!("expected NoResponse, got {other:?}"),
    }
    assert_eq!(transport.attempts(), 3);
}

#[test]
fn test_recovers_on_third_attempt() {
    let transport = Scripted::new(vec![
        refused(),
        refused(),
        ok("<getUserInfoResponse><result><userId>005</userId></result></getUserInfoResponse>"),
    ]);
    let client = logged_in(&transport);

    let result = client.get_user_info().unwrap().into_one().unwrap();
    assert_eq!(result.child_local("userId").unwrap().text(), "005");
    assert_eq!(transport.attempts(), 3);
}

#[test]
fn test_non_connection_failure_is_not_retried() {
    let transport = Scripted::new(vec![
        Err(TransportError::Timeout("read timed out".to_string())),
        ok("<x/>"),
    ]);
    let client = logged_in(&transport);

    assert!(matches!(
        client.get_user_info(),
        Err(SoapError::Transport(TransportError::Timeout(_)))
    ));
    assert_eq!(transport.attempts(), 1);
}

#[test]
fn test_malformed_response_is_not_retried() {
    let transport = Scripted::new(vec![Ok(HttpResponse::new(200, "<not-closed>")), ok("<x/>")]);
    let client = logged_in(&transport);

    assert!(matches!(client.describe_global(), Err(SoapError::Xml(_))));
    assert_eq!(transport.attempts(), 1);
}

// ============================================================================
// Faults
// ============================================================================

#[test]
fn test_invalid_session_is_session_expired() {
    let transport = Scripted::new(vec![fault(
        "sf:INVALID_SESSION_ID",
        "Invalid Session ID found in SessionHeader",
    )]);
    let client = logged_in(&transport);

    match client.query("SELECT Id FROM Account").unwrap_err() {
        SoapError::SessionExpired { code, message } => {
            assert_eq!(code, "INVALID_SESSION_ID");
            assert_eq!(message, "Invalid Session ID found in SessionHeader");
        }
        other => panic!("expected SessionExpired, got {other:?}"),
    }
}

#[test]
fn test_other_fault_is_remote_fault() {
    let transport = Scripted::new(vec![fault(
        "sf:MALFORMED_QUERY",
        "unexpected token: FROMM",
    )]);
    let client = logged_in(&transport);

    let err = client.query("SELECT Id FROMM Account").unwrap_err();
    assert!(!err.is_session_expired());
    match err {
        SoapError::RemoteFault { code, message } => {
            assert_eq!(code, "MALFORMED_QUERY");
            assert_eq!(message, "unexpected token: FROMM");
        }
        other => panic!("expected RemoteFault, got {other:?}"),
    }
}

#[test]
fn test_fault_with_status_200_is_classified() {
    let transport = Scripted::new(vec![Ok(HttpResponse::new(
        200,
        envelope("<soapenv:Fault><faultcode>soapenv:Client</faultcode><faultstring>bad</faultstring></soapenv:Fault>"),
    ))]);
    let client = logged_in(&transport);
    assert!(matches!(
        client.describe_global(),
        Err(SoapError::RemoteFault { code, .. }) if code == "Client"
    ));
}

#[test]
fn test_http_error_without_fault() {
    let transport = Scripted::new(vec![Ok(HttpResponse::new(503, "Service Unavailable"))]);
    let client = logged_in(&transport);
    assert!(matches!(
        client.describe_global(),
        Err(SoapError::HttpStatus { status: 503, .. })
    ));
}

// ============================================================================
// Result shapes
// ============================================================================

#[test]
fn test_batch_results_in_document_order() {
    let transport = Scripted::new(vec![ok(
        "<createResponse><result><id>001A</id><success>true</success></result><result><id>001B</id><success>true</success></result></createResponse>",
    )]);
    let client = logged_in(&transport);

    let records = vec![
        Record::with_type("Account").with("Name", "A"),
        Record::with_type("Account").with("Name", "B"),
    ];
    match client.create(&records).unwrap() {
        CallResult::Many(results) => {
            let ids: Vec<_> = results.iter().map(|r| r.child_local("id").unwrap().text()).collect();
            assert_eq!(ids, vec!["001A", "001B"]);
        }
        other => panic!("expected Many, got {other:?}"),
    }
}

#[test]
fn test_describe_tabs_always_list_with_one_child() {
    let transport = Scripted::new(vec![ok(
        "<describeTabsResponse><result><label>Sales</label></result></describeTabsResponse>",
    )]);
    let client = logged_in(&transport);

    match client.describe_tabs().unwrap() {
        CallResult::Many(sets) => assert_eq!(sets.len(), 1),
        other => panic!("expected Many, got {other:?}"),
    }
}

#[test]
fn test_empty_wrapper_is_returned() {
    let transport = Scripted::new(vec![ok("<logoutResponse/>")]);
    let mut client = logged_in(&transport);

    match client.logout().unwrap() {
        CallResult::Empty(wrapper) => {
            assert_eq!(wrapper.name(), &ns::PARTNER.name("logoutResponse"))
        }
        other => panic!("expected Empty, got {other:?}"),
    }
    assert!(!client.is_logged_in());
}

// ============================================================================
// Requests
// ============================================================================

#[test]
fn test_login_stores_session() {
    let transport = Scripted::new(vec![ok(
        "<loginResponse><result><passwordExpired>false</passwordExpired><serverUrl>https://na5.salesforce.com/services/Soap/u/20.0/00D</serverUrl><sessionId>00D!SESSION</sessionId><userId>005X</userId></result></loginResponse>",
    )]);
    let mut client = Client::with_transport(plain_config(), &transport);

    client.login("user@example.com", "secret").unwrap();
    let session = client.session().unwrap();
    assert_eq!(session.session_id, "00D!SESSION");
    assert_eq!(session.server_url, "https://na5.salesforce.com/services/Soap/u/20.0/00D");

    let request = transport.last_request();
    assert_eq!(request.url, sforce_soap::DEFAULT_SERVER_URL);
    let doc = request_xml(&request);
    let header = doc.child(&ns::SOAP_ENVELOPE.name("Header")).unwrap();
    assert!(!header.has_child(&ns::PARTNER.name("SessionHeader")));
}

#[test]
fn test_request_headers() {
    let transport = Scripted::new(vec![ok("<getUserInfoResponse><result/></getUserInfoResponse>")]);
    let client = logged_in(&transport);
    client.get_user_info().unwrap();

    let request = transport.last_request();
    assert_eq!(request.header("Content-Type"), Some("text/xml; charset=utf-8"));
    assert_eq!(request.header("SOAPAction"), Some("\"\""));
    assert_eq!(request.header("content-encoding"), None);
    assert_eq!(request.header("accept-encoding"), None);
    assert_eq!(request.url, "https://na1.salesforce.com/services/Soap/u/20.0");
}

#[test]
fn test_query_sends_batch_size_and_session() {
    let transport = Scripted::new(vec![ok(
        "<queryResponse><result><done>true</done><size>0</size></result></queryResponse>",
    )]);
    let mut client = Client::with_transport(plain_config().with_batch_size(250), &transport);
    client.use_session("SID", "https://na1.salesforce.com/services/Soap/u/20.0");
    client.query("SELECT Id FROM Contact").unwrap();

    let doc = request_xml(&transport.last_request());
    let header = doc.child(&ns::SOAP_ENVELOPE.name("Header")).unwrap();
    let session_id = header
        .child(&ns::PARTNER.name("SessionHeader"))
        .and_then(|h| h.child(&ns::PARTNER.name("sessionId")))
        .unwrap();
    assert_eq!(session_id.text(), "SID");
    let batch = header
        .child(&ns::PARTNER.name("QueryOptions"))
        .and_then(|q| q.child(&ns::PARTNER.name("batchSize")))
        .unwrap();
    assert_eq!(batch.text(), "250");
}

#[test]
fn test_retrieve_body_order() {
    let transport = Scripted::new(vec![ok("<retrieveResponse/>")]);
    let client = logged_in(&transport);
    client.retrieve("Id, Name", "Account", &["001A", "001B"]).unwrap();

    let doc = request_xml(&transport.last_request());
    let op = doc
        .child(&ns::SOAP_ENVELOPE.name("Body"))
        .and_then(|b| b.child(&ns::PARTNER.name("retrieve")))
        .unwrap();
    let names: Vec<_> = op.elements().map(|e| e.name().local_name().to_string()).collect();
    assert_eq!(names, vec!["fieldList", "sObjectType", "ids", "ids"]);
}

#[test]
fn test_upsert_external_id_first() {
    let transport = Scripted::new(vec![ok("<upsertResponse/>")]);
    let client = logged_in(&transport);
    let record = Record::new().with("Ext__c", "42").with("type", "Account");
    client.upsert("Ext__c", &[record]).unwrap();

    let doc = request_xml(&transport.last_request());
    let op = doc
        .child(&ns::SOAP_ENVELOPE.name("Body"))
        .and_then(|b| b.child(&ns::PARTNER.name("upsert")))
        .unwrap();
    assert_eq!(
        op.first_element().map(|e| e.name().clone()),
        Some(ns::PARTNER.name("externalIDFieldName"))
    );
    let sobject = op.child(&ns::PARTNER.name("sObjects")).unwrap();
    assert_eq!(
        sobject.first_element().map(|e| e.name().clone()),
        Some(ns::SOBJECT.name("type"))
    );
}

#[test]
fn test_send_email_sets_xsi_type() {
    let transport = Scripted::new(vec![ok(
        "<sendEmailResponse><result><success>true</success></result></sendEmailResponse>",
    )]);
    let client = logged_in(&transport);
    let message = Record::new()
        .with("subject", "Hello")
        .with("toAddresses", vec!["a@example.com"]);
    client.send_email(&[message], "SingleEmailMessage").unwrap();

    let doc = request_xml(&transport.last_request());
    let messages = doc
        .child(&ns::SOAP_ENVELOPE.name("Body"))
        .and_then(|b| b.child(&ns::PARTNER.name("sendEmail")))
        .and_then(|op| op.child(&ns::PARTNER.name("messages")))
        .unwrap();
    assert_eq!(messages.attribute(ns::XSI.name("type")).unwrap(), "p:SingleEmailMessage");
    assert_eq!(messages.child(&ns::PARTNER.name("subject")).unwrap().text(), "Hello");
}

// ============================================================================
// Compression
// ============================================================================

#[test]
fn test_gzip_request_and_response() {
    let reply = envelope(
        "<getServerTimestampResponse><result><timestamp>2010-03-22T12:30:05.000Z</timestamp></result></getServerTimestampResponse>",
    );
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(reply.as_bytes()).unwrap();
    let compressed = enc.finish().unwrap();

    let transport = Scripted::new(vec![Ok(
        HttpResponse::new(200, compressed).with_header("Content-Encoding", "gzip"),
    )]);
    let mut client = Client::with_transport(ClientConfig::default(), &transport);
    client.use_session("SID", "https://na1.salesforce.com/services/Soap/u/20.0");

    assert_eq!(client.get_server_timestamp().unwrap(), "2010-03-22T12:30:05.000Z");

    let request = transport.last_request();
    assert_eq!(request.header("content-encoding"), Some("gzip"));
    assert_eq!(request.header("accept-encoding"), Some("gzip"));

    // the trailer was written: the whole envelope decodes
    let mut xml = String::new();
    GzDecoder::new(&request.body[..]).read_to_string(&mut xml).unwrap();
    assert!(xml.ends_with("</s:Envelope>"));
}

#[test]
fn test_corrupt_gzip_response_is_malformed() {
    let transport = Scripted::new(vec![Ok(HttpResponse::new(200, b"not gzip at all".to_vec())
        .with_header("Content-Encoding", "gzip"))]);
    let mut client = Client::with_transport(ClientConfig::default(), &transport);
    client.use_session("SID", "https://na1.salesforce.com/services/Soap/u/20.0");

    let err = client.get_server_timestamp().unwrap_err();
    assert!(
        matches!(err, SoapError::Xml(XmlError::Malformed(ref msg)) if msg.contains("gzip")),
        "unexpected error: {err:?}"
    );
}

#[test]
fn test_force_http_rewrites_endpoint() {
    let transport = Scripted::new(vec![ok("<describeGlobalResponse/>")]);
    let mut client = Client::with_transport(plain_config().with_force_http(true), &transport);
    client.use_session("SID", "https://na1.salesforce.com/services/Soap/u/20.0");
    client.describe_global().unwrap();
    assert_eq!(
        transport.last_request().url,
        "http://na1.salesforce.com/services/Soap/u/20.0"
    );
}
