//! In-memory element tree.

use std::collections::BTreeMap;
use std::ops::{Bound, RangeBounds};

use crate::error::{XmlError, XmlResult};
use crate::name::QName;
use crate::writer::XmlWriter;

/// A child of an [`Element`]: a nested element or a text fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Node::Element(_))
    }
}

impl From<Element> for Node {
    fn from(e: Element) -> Self {
        Node::Element(e)
    }
}

impl From<String> for Node {
    fn from(s: String) -> Self {
        Node::Text(s)
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Text(s.to_string())
    }
}

/// A mutable XML element.
///
/// Children keep document order, with text fragments interleaved between
/// child elements. The default namespace and the prefix table captured at
/// parse time describe the tree but are not part of its identity: two
/// elements compare equal when their names, attributes and children match.
#[derive(Debug, Clone)]
pub struct Element {
    name: QName,
    attributes: BTreeMap<QName, String>,
    children: Vec<Node>,
    default_namespace: Option<String>,
    /// URI -> prefix (`None` is the default namespace)
    prefixes: BTreeMap<String, Option<String>>,
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.attributes == other.attributes
            && self.children == other.children
    }
}

impl Element {
    /// Create an empty element
    pub fn new<N: Into<QName>>(name: N) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            default_namespace: None,
            prefixes: BTreeMap::new(),
        }
    }

    /// Builder: add an attribute
    pub fn with_attribute<N: Into<QName>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder: append a child element
    pub fn with_child(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    /// Builder: append a text fragment
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.push_text(text);
        self
    }

    pub fn name(&self) -> &QName {
        &self.name
    }

    // ========================================================================
    // Namespace metadata
    // ========================================================================

    /// Default namespace in scope where this element was parsed
    pub fn default_namespace(&self) -> Option<&str> {
        self.default_namespace.as_deref()
    }

    /// Prefix bound to `uri` where this element was parsed.
    ///
    /// `Some(None)` means the URI was the default namespace.
    pub fn prefix_for(&self, uri: &str) -> Option<Option<&str>> {
        self.prefixes.get(uri).map(|p| p.as_deref())
    }

    /// Iterate the captured `(uri, prefix)` table
    pub fn prefixes(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.prefixes.iter().map(|(uri, p)| (uri.as_str(), p.as_deref()))
    }

    /// Replace the namespace metadata
    pub fn set_namespace_context(
        &mut self,
        default_namespace: Option<String>,
        prefixes: BTreeMap<String, Option<String>>,
    ) {
        self.default_namespace = default_namespace;
        self.prefixes = prefixes;
    }

    /// Qualify a bare local name with this element's default namespace
    pub fn resolve_local(&self, local: &str) -> QName {
        QName::from_parts(self.default_namespace.as_deref(), local)
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn attributes(&self) -> &BTreeMap<QName, String> {
        &self.attributes
    }

    /// Attribute value, or `NoSuchAttribute` when absent
    pub fn attribute<N: Into<QName>>(&self, name: N) -> XmlResult<&str> {
        let name = name.into();
        match self.attributes.get(&name) {
            Some(v) => Ok(v),
            None => Err(XmlError::NoSuchAttribute(name)),
        }
    }

    pub fn find_attribute<N: Into<QName>>(&self, name: N) -> Option<&str> {
        self.attributes.get(&name.into()).map(String::as_str)
    }

    /// Set an attribute, returning the previous value
    pub fn set_attribute<N: Into<QName>, V: Into<String>>(
        &mut self,
        name: N,
        value: V,
    ) -> Option<String> {
        self.attributes.insert(name.into(), value.into())
    }

    pub fn remove_attribute<N: Into<QName>>(&mut self, name: N) -> Option<String> {
        self.attributes.remove(&name.into())
    }

    // ========================================================================
    // Positional access
    // ========================================================================

    /// All children, text fragments included
    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.children.get(index)
    }

    /// Children in `range`, clamped to the number of children
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> &[Node] {
        let len = self.children.len();
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s.saturating_add(1),
            Bound::Unbounded => 0,
        }
        .min(len);
        let end = match range.end_bound() {
            Bound::Included(&e) => e.saturating_add(1),
            Bound::Excluded(&e) => e,
            Bound::Unbounded => len,
        }
        .clamp(start, len);
        &self.children[start..end]
    }

    /// Child elements in document order, text skipped
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First child element, if any
    pub fn first_element(&self) -> Option<&Element> {
        self.elements().next()
    }

    /// Consume the element, yielding its child elements
    pub fn into_elements(self) -> impl Iterator<Item = Element> {
        self.children.into_iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Number of child elements, text excluded
    pub fn element_count(&self) -> usize {
        self.elements().count()
    }

    // ========================================================================
    // Lookup by name
    // ========================================================================

    /// First child named `name`, or `NoSuchChild`
    pub fn child(&self, name: &QName) -> XmlResult<&Element> {
        self.find_child(name)
            .ok_or_else(|| XmlError::NoSuchChild(name.clone()))
    }

    pub fn find_child(&self, name: &QName) -> Option<&Element> {
        self.elements().find(|e| &e.name == name)
    }

    /// First child with this local name in the default namespace
    pub fn child_local(&self, local: &str) -> XmlResult<&Element> {
        self.child(&self.resolve_local(local))
    }

    /// All children named `name`; empty when none match
    pub fn children(&self, name: &QName) -> Vec<&Element> {
        self.elements().filter(|e| &e.name == name).collect()
    }

    pub fn children_local(&self, local: &str) -> Vec<&Element> {
        self.children(&self.resolve_local(local))
    }

    pub fn has_child(&self, name: &QName) -> bool {
        self.find_child(name).is_some()
    }

    // ========================================================================
    // Text
    // ========================================================================

    /// Whitespace-normalized join of the direct text fragments.
    ///
    /// Leading and trailing whitespace is dropped and every internal run of
    /// whitespace becomes one space. Nested elements do not contribute.
    pub fn text(&self) -> String {
        let raw = self.raw_text();
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Direct text fragments concatenated verbatim, newlines preserved
    pub fn raw_text(&self) -> String {
        self.children.iter().filter_map(Node::as_text).collect()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn push_text<S: Into<String>>(&mut self, text: S) {
        self.children.push(Node::Text(text.into()));
    }

    pub fn push_node(&mut self, node: Node) {
        self.children.push(node);
    }

    /// Replace the child at `index`, returning the old node
    pub fn replace_node(&mut self, index: usize, node: Node) -> Option<Node> {
        let slot = self.children.get_mut(index)?;
        Some(std::mem::replace(slot, node))
    }

    pub fn remove_node(&mut self, index: usize) -> Option<Node> {
        if index < self.children.len() {
            Some(self.children.remove(index))
        } else {
            None
        }
    }

    /// Set `<name>text</name>`: the first match is replaced in place, other
    /// matches are removed, and the element is appended when none exists.
    pub fn set_child_text<S: Into<String>>(&mut self, name: &QName, text: S) {
        let replacement = Element::new(name).with_text(text);
        let mut replaced = false;
        let mut slot = Some(replacement);
        self.children.retain_mut(|node| match node {
            Node::Element(e) if &e.name == name => {
                if replaced {
                    false
                } else {
                    replaced = true;
                    if let Some(r) = slot.take() {
                        *e = r;
                    }
                    true
                }
            }
            _ => true,
        });
        if let Some(r) = slot {
            self.children.push(Node::Element(r));
        }
    }

    /// Always append a new `<name>text</name>`
    pub fn append_child_text<S: Into<String>>(&mut self, name: &QName, text: S) {
        self.push_child(Element::new(name).with_text(text));
    }

    /// Remove every child named `name`, returning how many were removed
    pub fn remove_children(&mut self, name: &QName) -> usize {
        let before = self.children.len();
        self.children
            .retain(|node| !matches!(node, Node::Element(e) if &e.name == name));
        before - self.children.len()
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    /// Serialize this tree, re-declaring the captured prefixes
    pub fn to_xml(&self) -> XmlResult<String> {
        let mut writer = XmlWriter::fragment();
        writer.write_tree(self)?;
        let bytes = writer.end_document()?;
        String::from_utf8(bytes).map_err(|e| XmlError::malformed(e.to_string()))
    }
}
