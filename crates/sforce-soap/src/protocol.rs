//! Envelope protocol: transmit with retry, classify faults, shape results.

use std::io::Read;

use flate2::read::GzDecoder;
use sforce_xml::{ns, parse, Element, XmlError};

use crate::config::{ClientConfig, MAX_ATTEMPTS};
use crate::envelope::Envelope;
use crate::error::{SoapError, SoapResult, TransportError};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Fault code that means the session must be re-established
pub const INVALID_SESSION_ID: &str = "INVALID_SESSION_ID";

/// A SOAP fault as carried in `Body/Fault`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    /// Local part of `faultcode` (text after the last `:`)
    pub code: String,
    pub message: String,
}

impl Fault {
    fn from_element(fault: &Element) -> Self {
        let code = fault_field(fault, "faultcode");
        let code = match code.rsplit_once(':') {
            Some((_, local)) => local.to_string(),
            None => code,
        };
        Self {
            code,
            message: fault_field(fault, "faultstring"),
        }
    }

    pub fn is_session_expired(&self) -> bool {
        self.code == INVALID_SESSION_ID
    }

    pub fn into_error(self) -> SoapError {
        if self.is_session_expired() {
            SoapError::SessionExpired {
                code: self.code,
                message: self.message,
            }
        } else {
            SoapError::RemoteFault {
                code: self.code,
                message: self.message,
            }
        }
    }
}

/// `faultcode` and `faultstring` are unqualified in SOAP 1.1, but servers
/// differ in the namespace they leave in scope, so only the local name is
/// matched.
fn fault_field(fault: &Element, local: &str) -> String {
    fault
        .elements()
        .find(|e| e.name().local_name() == local)
        .map(|e| e.raw_text().trim().to_string())
        .unwrap_or_default()
}

/// Parsed response: a fault or the operation's response wrapper
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Fault(Fault),
    Result(Element),
}

/// Shape of a successful call's result
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    /// The wrapper had exactly one child
    One(Element),
    /// The wrapper had several children, or a list was requested
    Many(Vec<Element>),
    /// The wrapper had no children; carries the wrapper itself
    Empty(Element),
}

impl CallResult {
    /// Every result element, however the call was shaped
    pub fn into_vec(self) -> Vec<Element> {
        match self {
            CallResult::One(e) => vec![e],
            CallResult::Many(v) => v,
            CallResult::Empty(_) => Vec::new(),
        }
    }

    /// The single result, or `MissingResult` for any other shape
    pub fn into_one(self) -> SoapResult<Element> {
        match self {
            CallResult::One(e) => Ok(e),
            CallResult::Many(mut v) if v.len() == 1 => Ok(v.remove(0)),
            _ => Err(SoapError::MissingResult),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CallResult::One(_) => 1,
            CallResult::Many(v) => v.len(),
            CallResult::Empty(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse a response document into fault-or-result
pub fn parse_response(bytes: &[u8]) -> SoapResult<Response> {
    let root = parse(bytes)?;
    let body_name = ns::SOAP_ENVELOPE.name("Body");
    let body = root
        .into_elements()
        .find(|e| e.name() == &body_name)
        .ok_or(SoapError::MissingResult)?;

    if let Some(fault) = body.find_child(&ns::SOAP_ENVELOPE.name("Fault")) {
        return Ok(Response::Fault(Fault::from_element(fault)));
    }

    body.into_elements()
        .next()
        .map(Response::Result)
        .ok_or(SoapError::MissingResult)
}

/// Shape the response wrapper's children.
///
/// `always_list` and the child count are independent: either one yields
/// `Many`.
pub fn normalize(wrapper: Element, always_list: bool) -> CallResult {
    let count = wrapper.element_count();
    if always_list || count > 1 {
        CallResult::Many(wrapper.into_elements().collect())
    } else if count == 1 {
        match wrapper.into_elements().next() {
            Some(only) => CallResult::One(only),
            None => CallResult::Many(Vec::new()),
        }
    } else {
        CallResult::Empty(wrapper)
    }
}

/// Build the HTTP request for `envelope`
pub fn build_request(config: &ClientConfig, url: &str, envelope: &Envelope) -> SoapResult<HttpRequest> {
    let body = envelope.to_bytes(&config.client_id, config.gzip_request)?;
    let mut headers = vec![
        ("Content-Type".to_string(), "text/xml; charset=utf-8".to_string()),
        ("SOAPAction".to_string(), "\"\"".to_string()),
        ("User-Agent".to_string(), config.user_agent.clone()),
    ];
    if config.gzip_response {
        headers.push(("accept-encoding".to_string(), "gzip".to_string()));
    }
    if config.gzip_request {
        headers.push(("content-encoding".to_string(), "gzip".to_string()));
    }
    Ok(HttpRequest {
        url: config.effective_url(url),
        headers,
        body,
        timeout: config.timeout,
    })
}

/// Send with up to [`MAX_ATTEMPTS`] tries on connection failures
pub fn transmit<T: Transport + ?Sized>(
    transport: &T,
    request: &HttpRequest,
) -> SoapResult<HttpResponse> {
    let mut last_error: Option<TransportError> = None;
    for attempt in 1..=MAX_ATTEMPTS {
        tracing::debug!("POST {} (attempt {attempt}/{MAX_ATTEMPTS})", request.url);
        match transport.send(request) {
            Ok(response) => return Ok(response),
            Err(e) if e.is_connect() => {
                tracing::warn!("Connection to {} failed on attempt {attempt}: {e}", request.url);
                last_error = Some(e);
            }
            Err(e) => return Err(SoapError::Transport(e)),
        }
    }
    Err(SoapError::NoResponse {
        attempts: MAX_ATTEMPTS,
        source: last_error
            .unwrap_or_else(|| TransportError::Connect("no attempt was made".to_string())),
    })
}

/// Undo `content-encoding: gzip`
pub fn decode_body(response: &HttpResponse) -> SoapResult<Vec<u8>> {
    let gzipped = response
        .header("content-encoding")
        .map(|v| v.trim().eq_ignore_ascii_case("gzip"))
        .unwrap_or(false);
    if !gzipped {
        return Ok(response.body.clone());
    }
    let mut decoded = Vec::new();
    GzDecoder::new(response.body.as_slice())
        .read_to_end(&mut decoded)
        .map_err(|e| XmlError::Malformed(format!("corrupt gzip body: {e}")))?;
    Ok(decoded)
}

/// One full call: build, transmit, classify, normalize
pub fn post<T: Transport + ?Sized>(
    transport: &T,
    config: &ClientConfig,
    url: &str,
    envelope: &Envelope,
    always_list: bool,
) -> SoapResult<CallResult> {
    let request = build_request(config, url, envelope)?;
    let response = transmit(transport, &request)?;
    let body = decode_body(&response)?;

    if !response.is_success() {
        // faults arrive with status 500
        return match parse_response(&body) {
            Ok(Response::Fault(fault)) => Err(fault.into_error()),
            _ => Err(SoapError::HttpStatus {
                status: response.status,
                body: String::from_utf8_lossy(&body).into_owned(),
            }),
        };
    }

    match parse_response(&body)? {
        Response::Fault(fault) => {
            tracing::debug!("{} faulted: {} {}", envelope.operation(), fault.code, fault.message);
            Err(fault.into_error())
        }
        Response::Result(wrapper) => {
            let result = normalize(wrapper, always_list);
            tracing::trace!("{} returned {} result(s)", envelope.operation(), result.len());
            Ok(result)
        }
    }
}
