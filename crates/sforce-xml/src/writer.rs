//! Streaming XML writer with prefix management and optional gzip.

use std::io::Write;

use flate2::write::GzEncoder;
use flate2::Compression;
use quick_xml::escape::escape;

use crate::element::{Element, Node};
use crate::error::{XmlError, XmlResult};
use crate::name::QName;
use crate::value::{Record, Value};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

enum Sink {
    Plain(Vec<u8>),
    Gzip(GzEncoder<Vec<u8>>),
}

impl Sink {
    fn write_str(&mut self, s: &str) -> XmlResult<()> {
        match self {
            Sink::Plain(buf) => buf.extend_from_slice(s.as_bytes()),
            Sink::Gzip(enc) => enc.write_all(s.as_bytes())?,
        }
        Ok(())
    }

    fn finish(self) -> XmlResult<Vec<u8>> {
        match self {
            Sink::Plain(buf) => Ok(buf),
            Sink::Gzip(enc) => Ok(enc.finish()?),
        }
    }
}

/// Prefix bindings introduced by one open element
#[derive(Debug)]
struct Scope {
    tag: String,
    /// (prefix, uri); `None` prefix is the default namespace
    bindings: Vec<(Option<String>, String)>,
}

/// Writes elements, text and [`Value`]s as a namespace-qualified document.
///
/// Callers declare preferred prefixes with [`declare_prefix`](Self::declare_prefix);
/// the declarations are emitted on the next start tag and stay in scope until
/// that element is closed. A start tag whose namespace has no visible prefix
/// gets a generated one.
pub struct XmlWriter {
    sink: Sink,
    scopes: Vec<Scope>,
    queued: Vec<(Option<String>, String)>,
    generated: usize,
}

impl XmlWriter {
    /// Start a document, gzip-compressing the output when `compress` is set
    pub fn new(compress: bool) -> XmlResult<Self> {
        let sink = if compress {
            Sink::Gzip(GzEncoder::new(Vec::new(), Compression::default()))
        } else {
            Sink::Plain(Vec::new())
        };
        let mut writer = Self::with_sink(sink);
        writer.sink.write_str(XML_DECLARATION)?;
        Ok(writer)
    }

    /// Writer without the XML declaration, for serializing subtrees
    pub fn fragment() -> Self {
        Self::with_sink(Sink::Plain(Vec::new()))
    }

    fn with_sink(sink: Sink) -> Self {
        Self {
            sink,
            scopes: Vec::new(),
            queued: Vec::new(),
            generated: 0,
        }
    }

    /// Bind `prefix` to `uri` on the next start tag
    pub fn declare_prefix<P: Into<String>, U: Into<String>>(&mut self, prefix: P, uri: U) {
        self.queued.push((Some(prefix.into()), uri.into()));
    }

    /// Bind the default namespace on the next start tag
    pub fn declare_default<U: Into<String>>(&mut self, uri: U) {
        self.queued.push((None, uri.into()));
    }

    /// Number of elements currently open
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    // ========================================================================
    // Prefix lookup
    // ========================================================================

    /// Innermost visible binding for `prefix`, considering queued declarations
    fn lookup_prefix(&self, prefix: Option<&str>) -> Option<&str> {
        self.queued
            .iter()
            .rev()
            .chain(self.scopes.iter().rev().flat_map(|s| s.bindings.iter().rev()))
            .find(|(p, _)| p.as_deref() == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// A visible, unshadowed prefix bound to `uri`
    fn prefix_for(&self, uri: &str) -> Option<Option<String>> {
        let candidates = self
            .queued
            .iter()
            .rev()
            .chain(self.scopes.iter().rev().flat_map(|s| s.bindings.iter().rev()));
        for (prefix, bound) in candidates {
            if bound == uri && self.lookup_prefix(prefix.as_deref()) == Some(uri) {
                return Some(prefix.clone());
            }
        }
        None
    }

    fn next_generated_prefix(&mut self) -> String {
        loop {
            let candidate = format!("ns{}", self.generated);
            self.generated += 1;
            if self.lookup_prefix(Some(&candidate)).is_none() {
                return candidate;
            }
        }
    }

    /// Lexical form of an element name, queuing a declaration if needed
    fn element_tag(&mut self, name: &QName) -> String {
        match name.namespace() {
            Some(uri) => match self.prefix_for(uri) {
                Some(Some(prefix)) => format!("{prefix}:{}", name.local_name()),
                Some(None) => name.local_name().to_string(),
                None => {
                    let prefix = self.next_generated_prefix();
                    self.queued.push((Some(prefix.clone()), uri.to_string()));
                    format!("{prefix}:{}", name.local_name())
                }
            },
            None => {
                let default_bound = self
                    .lookup_prefix(None)
                    .map(|uri| !uri.is_empty())
                    .unwrap_or(false);
                if default_bound {
                    self.queued.push((None, String::new()));
                }
                name.local_name().to_string()
            }
        }
    }

    /// Lexical form of an attribute name; qualified attributes need a prefix
    fn attribute_tag(&mut self, name: &QName) -> String {
        match name.namespace() {
            Some(uri) => {
                let prefix = match self.prefix_for(uri) {
                    Some(Some(prefix)) => prefix,
                    _ => {
                        let prefix = self.next_generated_prefix();
                        self.queued.push((Some(prefix.clone()), uri.to_string()));
                        prefix
                    }
                };
                format!("{prefix}:{}", name.local_name())
            }
            None => name.local_name().to_string(),
        }
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Open an element with the given attributes
    pub fn start_element(&mut self, name: &QName, attrs: &[(QName, String)]) -> XmlResult<()> {
        let tag = self.element_tag(name);
        let attr_tags: Vec<(String, &str)> = attrs
            .iter()
            .map(|(n, v)| (self.attribute_tag(n), v.as_str()))
            .collect();

        let bindings = std::mem::take(&mut self.queued);
        let mut out = String::with_capacity(tag.len() + 2);
        out.push('<');
        out.push_str(&tag);
        for (prefix, uri) in &bindings {
            match prefix {
                Some(p) => out.push_str(&format!(" xmlns:{p}=\"{}\"", escape(uri.as_str()))),
                None => out.push_str(&format!(" xmlns=\"{}\"", escape(uri.as_str()))),
            }
        }
        for (attr, value) in attr_tags {
            out.push_str(&format!(" {attr}=\"{}\"", escape(value)));
        }
        out.push('>');
        self.sink.write_str(&out)?;

        self.scopes.push(Scope { tag, bindings });
        Ok(())
    }

    /// Write escaped character data
    pub fn characters(&mut self, text: &str) -> XmlResult<()> {
        self.sink.write_str(&escape(text))
    }

    /// Close the innermost open element
    pub fn end_element(&mut self) -> XmlResult<()> {
        let scope = self.scopes.pop().ok_or(XmlError::UnbalancedEnd)?;
        self.sink.write_str(&format!("</{}>", scope.tag))
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// Write `value` as the content of element(s) named `name`.
    ///
    /// Lists produce one sibling per item, records produce nested elements
    /// in `name`'s namespace, and everything else becomes a text child.
    /// `attrs` go on the outer element only.
    pub fn write_value(
        &mut self,
        name: &QName,
        value: &Value,
        attrs: &[(QName, String)],
    ) -> XmlResult<()> {
        match value {
            Value::List(items) => {
                for item in items {
                    self.write_value(name, item, attrs)?;
                }
                Ok(())
            }
            Value::Record(record) => self.write_record_in(name, name, record, attrs),
            scalar => {
                self.start_element(name, attrs)?;
                if let Some(text) = scalar.scalar_text() {
                    if !text.is_empty() {
                        self.characters(&text)?;
                    }
                }
                self.end_element()
            }
        }
    }

    /// Write `record` as element `name` whose fields live in `field_ns`'s
    /// namespace. A `type` field is always written first.
    pub fn write_record_in(
        &mut self,
        name: &QName,
        field_ns: &QName,
        record: &Record,
        attrs: &[(QName, String)],
    ) -> XmlResult<()> {
        self.start_element(name, attrs)?;
        if let Some(ty) = record.get("type") {
            self.write_value(&field_ns.sibling("type"), ty, &[])?;
        }
        for (key, value) in record.iter().filter(|(k, _)| *k != "type") {
            self.write_value(&field_ns.sibling(key), value, &[])?;
        }
        self.end_element()
    }

    /// Write a parsed tree, re-declaring the prefixes captured at parse time
    pub fn write_tree(&mut self, element: &Element) -> XmlResult<()> {
        for (uri, prefix) in element.prefixes() {
            let already = match prefix {
                Some(p) => self.lookup_prefix(Some(p)) == Some(uri),
                None => self.lookup_prefix(None) == Some(uri),
            };
            if already {
                continue;
            }
            match prefix {
                Some(p) => self.declare_prefix(p, uri),
                None => self.declare_default(uri),
            }
        }

        let attrs: Vec<(QName, String)> = element
            .attributes()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        self.start_element(element.name(), &attrs)?;
        for node in element.nodes() {
            match node {
                Node::Element(child) => self.write_tree(child)?,
                Node::Text(text) => self.characters(text)?,
            }
        }
        self.end_element()
    }

    /// Close any open elements and return the finished bytes
    pub fn end_document(mut self) -> XmlResult<Vec<u8>> {
        while !self.scopes.is_empty() {
            self.end_element()?;
        }
        self.sink.finish()
    }
}
