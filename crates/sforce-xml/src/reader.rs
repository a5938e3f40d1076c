//! Streaming parser that builds an [`Element`] tree.
//!
//! Namespace prefixes are resolved while reading: every element carries the
//! default namespace and prefix table that were in scope at its start tag.
//! Documents that declare a DTD are rejected, so entity definitions can never
//! be expanded.

use std::collections::BTreeMap;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::element::Element;
use crate::error::{XmlError, XmlResult};
use crate::name::{ns, QName};

/// Parse a complete document from a string
pub fn parse_str(xml: &str) -> XmlResult<Element> {
    parse_reader(xml.as_bytes())
}

/// Parse a complete document from bytes
pub fn parse(bytes: &[u8]) -> XmlResult<Element> {
    parse_reader(bytes)
}

/// Parse a complete document from any buffered reader
pub fn parse_reader<R: BufRead>(source: R) -> XmlResult<Element> {
    let mut reader = Reader::from_reader(source);
    reader.trim_text(false);
    reader.expand_empty_elements(true);

    let mut builder = TreeBuilder::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => builder.start(&e)?,
            Ok(Event::End(_)) => builder.end()?,
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| XmlError::malformed(err.to_string()))?;
                builder.characters(&text)?;
            }
            Ok(Event::CData(e)) => {
                let raw = e.into_inner();
                let text = std::str::from_utf8(&raw)
                    .map_err(|err| XmlError::malformed(err.to_string()))?;
                builder.characters(text)?;
            }
            Ok(Event::DocType(_)) => {
                log::warn!("rejecting document with a DOCTYPE declaration");
                return Err(XmlError::malformed("DOCTYPE declarations are not allowed"));
            }
            Ok(Event::Eof) => break,
            // declaration, comments, processing instructions
            Ok(_) => {}
            Err(e) => {
                return Err(XmlError::malformed(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
        buf.clear();
    }

    builder.finish()
}

// ============================================================================
// Tree builder
// ============================================================================

/// One prefix binding; `prefix == None` is the default namespace and an empty
/// URI undeclares it.
#[derive(Debug, Clone)]
struct Binding {
    prefix: Option<String>,
    uri: String,
}

#[derive(Debug)]
struct Frame {
    element: Element,
    /// bindings length before this element's declarations
    scope_mark: usize,
}

#[derive(Debug, Default)]
struct TreeBuilder {
    stack: Vec<Frame>,
    bindings: Vec<Binding>,
    pending: String,
    root: Option<Element>,
}

impl TreeBuilder {
    fn start(&mut self, e: &BytesStart<'_>) -> XmlResult<()> {
        if self.root.is_some() {
            return Err(XmlError::malformed("content after the document element"));
        }
        self.flush_text();

        let scope_mark = self.bindings.len();
        let mut plain_attrs = Vec::new();

        for attr in e.attributes() {
            let attr = attr.map_err(|err| XmlError::malformed(err.to_string()))?;
            let key = utf8(attr.key.as_ref())?.to_string();
            let value = attr
                .unescape_value()
                .map_err(|err| XmlError::malformed(err.to_string()))?
                .into_owned();

            if key == "xmlns" {
                self.bindings.push(Binding {
                    prefix: None,
                    uri: value,
                });
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                if value.is_empty() {
                    return Err(XmlError::malformed(format!(
                        "prefix '{prefix}' cannot be bound to an empty namespace"
                    )));
                }
                self.bindings.push(Binding {
                    prefix: Some(prefix.to_string()),
                    uri: value,
                });
            } else {
                plain_attrs.push((key, value));
            }
        }

        let raw_name = utf8(e.name().as_ref())?.to_string();
        let name = self.resolve_element(&raw_name)?;
        let mut element = Element::new(name);

        for (key, value) in plain_attrs {
            let attr_name = self.resolve_attribute(&key)?;
            if element.set_attribute(attr_name, value).is_some() {
                return Err(XmlError::malformed(format!("duplicate attribute '{key}'")));
            }
        }

        element.set_namespace_context(self.default_namespace(), self.prefix_table());
        self.stack.push(Frame {
            element,
            scope_mark,
        });
        Ok(())
    }

    fn end(&mut self) -> XmlResult<()> {
        self.flush_text();
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| XmlError::malformed("end tag without a matching start tag"))?;
        self.bindings.truncate(frame.scope_mark);

        match self.stack.last_mut() {
            Some(parent) => parent.element.push_child(frame.element),
            None => self.root = Some(frame.element),
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> XmlResult<()> {
        if self.stack.is_empty() {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(XmlError::malformed("text outside the document element"));
        }
        self.pending.push_str(text);
        Ok(())
    }

    /// Attach accumulated text to the open element unless it is all whitespace
    fn flush_text(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending);
        if text.trim().is_empty() {
            return;
        }
        if let Some(top) = self.stack.last_mut() {
            top.element.push_text(text);
        }
    }

    fn finish(self) -> XmlResult<Element> {
        if let Some(open) = self.stack.last() {
            return Err(XmlError::malformed(format!(
                "unclosed element {}",
                open.element.name()
            )));
        }
        self.root
            .ok_or_else(|| XmlError::malformed("document has no root element"))
    }

    // ------------------------------------------------------------------------
    // Namespace resolution
    // ------------------------------------------------------------------------

    fn lookup(&self, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(ns::XML_URI);
        }
        self.bindings
            .iter()
            .rev()
            .find(|b| b.prefix.as_deref() == prefix)
            .map(|b| b.uri.as_str())
    }

    fn default_namespace(&self) -> Option<String> {
        self.lookup(None)
            .filter(|uri| !uri.is_empty())
            .map(str::to_string)
    }

    fn resolve_element(&self, raw: &str) -> XmlResult<QName> {
        match raw.split_once(':') {
            Some((prefix, local)) => {
                let uri = self.lookup(Some(prefix)).ok_or_else(|| {
                    XmlError::malformed(format!("undeclared namespace prefix '{prefix}'"))
                })?;
                Ok(QName::new(uri, local))
            }
            None => Ok(QName::from_parts(self.default_namespace().as_deref(), raw)),
        }
    }

    /// Unprefixed attributes are in no namespace
    fn resolve_attribute(&self, raw: &str) -> XmlResult<QName> {
        match raw.split_once(':') {
            Some((prefix, local)) => {
                let uri = self.lookup(Some(prefix)).ok_or_else(|| {
                    XmlError::malformed(format!("undeclared namespace prefix '{prefix}'"))
                })?;
                Ok(QName::new(uri, local))
            }
            None => Ok(QName::unqualified(raw)),
        }
    }

    /// URI -> prefix for every binding still visible at this point
    fn prefix_table(&self) -> BTreeMap<String, Option<String>> {
        let mut table = BTreeMap::new();
        for binding in &self.bindings {
            if binding.uri.is_empty() {
                continue;
            }
            let visible = self.lookup(binding.prefix.as_deref()) == Some(binding.uri.as_str());
            if visible {
                table.insert(binding.uri.clone(), binding.prefix.clone());
            }
        }
        table
    }
}

fn utf8(bytes: &[u8]) -> XmlResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| XmlError::malformed(e.to_string()))
}
