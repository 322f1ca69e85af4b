//! XML Document - Arena-based DOM representation
//!
//! Storage for a tree that grows across several reads:
//! - Arena allocation for nodes, linked by NodeId
//! - Shared attribute arena, sliced per element
//! - String interning for names, values and text
//! - Source name table so every element can report where it came from

use super::node::{NodeId, NodeKind, SourceId, SourceLocation, XmlAttribute, XmlNode};
use super::strings::{StrId, StringPool};
use crate::error::{DomError, Result};
use crate::reader::events::Attribute;

/// ID of the implicit document container
pub const DOCUMENT_NODE: NodeId = 0;

/// An XML document stored in arena format
#[derive(Debug)]
pub struct Document {
    /// Arena of nodes; index 0 is the document container
    nodes: Vec<XmlNode>,
    /// Arena of attributes
    attributes: Vec<XmlAttribute>,
    /// Interned strings
    strings: StringPool,
    /// Source names in read order
    sources: Vec<String>,
}

impl Document {
    /// Create a document holding only the container node
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(256);
        nodes.push(XmlNode::document());
        Document {
            nodes,
            attributes: Vec::with_capacity(128),
            strings: StringPool::new(),
            sources: Vec::new(),
        }
    }

    // =========================================================================
    // Read access
    // =========================================================================

    /// ID of the document container node
    pub fn document_id(&self) -> NodeId {
        DOCUMENT_NODE
    }

    /// First top-level element, i.e. the root of the first source read
    pub fn root_element_id(&self) -> Option<NodeId> {
        self.top_level_elements().next()
    }

    /// Root elements of every source, in read order
    pub fn top_level_elements(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children(DOCUMENT_NODE)
            .filter(|&id| self.node_kind(id) == Some(NodeKind::Element))
    }

    /// True when no element was ever added
    pub fn is_empty(&self) -> bool {
        !self.nodes[DOCUMENT_NODE as usize].has_children()
    }

    /// Get a node by ID
    pub fn get_node(&self, id: NodeId) -> Option<&XmlNode> {
        self.nodes.get(id as usize)
    }

    pub fn node_kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get_node(id).map(|n| n.kind)
    }

    /// Tag name of an element
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        if node.is_element() {
            self.strings.get(node.name_id)
        } else {
            None
        }
    }

    /// Content of a text node
    pub fn text_content(&self, id: NodeId) -> Option<&str> {
        let node = self.get_node(id)?;
        if node.is_text() {
            self.strings.get(node.name_id)
        } else {
            None
        }
    }

    /// Parent of a node; None for the document container
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get_node(id)?.parent
    }

    fn attribute_slice(&self, id: NodeId) -> &[XmlAttribute] {
        match self.get_node(id) {
            Some(node) if node.has_attributes() => {
                let start = node.attr_start as usize;
                let end = start + node.attr_count as usize;
                self.attributes.get(start..end).unwrap_or(&[])
            }
            _ => &[],
        }
    }

    /// Attributes of an element as (name, value), in source order
    pub fn attributes(&self, id: NodeId) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.attribute_slice(id).iter().filter_map(move |attr| {
            let name = self.strings.get(attr.name_id)?;
            let value = self.strings.get(attr.value_id)?;
            Some((name, value))
        })
    }

    /// Get attribute value by name
    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id).find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Iterate over children of a node
    pub fn children(&self, id: NodeId) -> ChildIter<'_> {
        let first = self.get_node(id).and_then(|n| n.first_child);
        ChildIter { doc: self, next: first }
    }

    /// Iterate over all descendants of a node in document order
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        let mut stack = Vec::new();
        if let Some(node) = self.get_node(id) {
            let mut child_id = node.last_child;
            while let Some(cid) = child_id {
                stack.push(cid);
                child_id = self.get_node(cid).and_then(|n| n.prev_sibling);
            }
        }
        DescendantIter { doc: self, stack }
    }

    /// Where an element's start tag was read
    pub fn location(&self, id: NodeId) -> Option<SourceLocation> {
        let node = self.get_node(id)?;
        if !node.is_element() {
            return None;
        }
        Some(SourceLocation {
            source: node.source,
            line: node.line,
            column: node.column,
        })
    }

    /// Name of a source by ID
    pub fn source_name(&self, id: SourceId) -> Option<&str> {
        self.sources.get(id as usize).map(String::as_str)
    }

    /// Source names in read order
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Get total number of nodes, document container included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Serialize a subtree back to XML text. The document node serializes
    /// its top-level elements back to back.
    pub fn to_xml(&self, id: NodeId) -> String {
        let mut buf = String::with_capacity(1024);

        enum StackEntry {
            Enter(NodeId),
            Close(NodeId),
        }

        // Explicit stack so deep documents cannot overflow the call stack
        let mut stack: Vec<StackEntry> = Vec::with_capacity(64);
        stack.push(StackEntry::Enter(id));

        while let Some(entry) = stack.pop() {
            match entry {
                StackEntry::Close(id) => {
                    if let Some(name) = self.node_name(id) {
                        buf.push_str("</");
                        buf.push_str(name);
                        buf.push('>');
                    }
                }
                StackEntry::Enter(current) => {
                    let node = match self.get_node(current) {
                        Some(n) => n,
                        None => continue,
                    };

                    match node.kind {
                        NodeKind::Element => {
                            let name = self.node_name(current).unwrap_or("");
                            buf.push('<');
                            buf.push_str(name);
                            for (attr_name, attr_value) in self.attributes(current) {
                                buf.push(' ');
                                buf.push_str(attr_name);
                                buf.push_str("=\"");
                                escape_xml_to_buf(attr_value, &mut buf);
                                buf.push('"');
                            }
                            if !node.has_children() {
                                buf.push_str("/>");
                                continue;
                            }
                            buf.push('>');
                            stack.push(StackEntry::Close(current));
                            self.push_children_reversed(node, &mut stack, StackEntry::Enter);
                        }
                        NodeKind::Text => {
                            escape_xml_to_buf(self.text_content(current).unwrap_or(""), &mut buf);
                        }
                        NodeKind::Document => {
                            self.push_children_reversed(node, &mut stack, StackEntry::Enter);
                        }
                    }
                }
            }
        }

        buf
    }

    fn push_children_reversed<T>(&self, node: &XmlNode, stack: &mut Vec<T>, wrap: fn(NodeId) -> T) {
        let mut child_id = node.last_child;
        while let Some(cid) = child_id {
            stack.push(wrap(cid));
            child_id = self.get_node(cid).and_then(|n| n.prev_sibling);
        }
    }

    // =========================================================================
    // Mutation (builder only)
    // =========================================================================

    /// Register a source name, returning its ID
    pub(crate) fn add_source(&mut self, name: &str) -> Result<SourceId> {
        let id = SourceId::try_from(self.sources.len())
            .map_err(|_| DomError::ResourceExhausted("too many sources".to_string()))?;
        self.sources.push(name.to_string());
        Ok(id)
    }

    /// Forget the most recently added source. Only valid while no node refers to it.
    pub(crate) fn retract_source(&mut self, id: SourceId) {
        if id as usize + 1 == self.sources.len() {
            self.sources.pop();
        }
    }

    /// Append an element as last child of `parent`
    pub(crate) fn append_element(
        &mut self,
        parent: NodeId,
        name: &str,
        attributes: &[Attribute],
        location: SourceLocation,
    ) -> Result<NodeId> {
        let depth = self.child_depth(parent)?;
        let name_id = self.intern(name)?;

        let attr_count = u16::try_from(attributes.len()).map_err(|_| {
            DomError::ResourceExhausted(format!("<{}> has more than {} attributes", name, u16::MAX))
        })?;
        let attr_start = u32::try_from(self.attributes.len())
            .map_err(|_| DomError::ResourceExhausted("attribute arena full".to_string()))?;
        self.attributes
            .try_reserve(attributes.len())
            .map_err(|_| DomError::ResourceExhausted("attribute arena allocation failed".to_string()))?;
        for attr in attributes {
            let name_id = self.intern(&attr.name)?;
            let value_id = self.intern(&attr.value)?;
            self.attributes.push(XmlAttribute::new(name_id, value_id));
        }

        let mut node = XmlNode::element(name_id, parent, depth);
        node.attr_start = attr_start;
        node.attr_count = attr_count;
        node.source = location.source;
        node.line = location.line;
        node.column = location.column;

        self.alloc_node(parent, node)
    }

    /// Append a text node as last child of `parent`
    pub(crate) fn append_text(&mut self, parent: NodeId, content: &str) -> Result<NodeId> {
        let depth = self.child_depth(parent)?;
        let content_id = self.intern(content)?;
        let mut node = XmlNode::text(content_id, parent, depth);
        if let Some(p) = self.get_node(parent) {
            node.source = p.source;
        }
        self.alloc_node(parent, node)
    }

    fn child_depth(&self, parent: NodeId) -> Result<u16> {
        let parent_depth = self
            .get_node(parent)
            .map(|n| n.depth)
            .ok_or_else(|| DomError::ResourceExhausted(format!("parent node {} does not exist", parent)))?;
        parent_depth
            .checked_add(1)
            .ok_or_else(|| DomError::ResourceExhausted("maximum tree depth reached".to_string()))
    }

    fn intern(&mut self, s: &str) -> Result<StrId> {
        self.strings
            .intern(s)
            .ok_or_else(|| DomError::ResourceExhausted("string pool full".to_string()))
    }

    fn alloc_node(&mut self, parent: NodeId, node: XmlNode) -> Result<NodeId> {
        let node_id = NodeId::try_from(self.nodes.len())
            .ok()
            .filter(|&id| id != NodeId::MAX)
            .ok_or_else(|| DomError::ResourceExhausted("node arena full".to_string()))?;
        self.nodes
            .try_reserve(1)
            .map_err(|_| DomError::ResourceExhausted("node arena allocation failed".to_string()))?;
        self.nodes.push(node);
        self.link_child(parent, node_id);
        Ok(node_id)
    }

    /// Link a child node to its parent
    fn link_child(&mut self, parent_id: NodeId, child_id: NodeId) {
        let last_child_opt = self.nodes[parent_id as usize].last_child;

        if let Some(last_child_id) = last_child_opt {
            self.nodes[child_id as usize].prev_sibling = Some(last_child_id);
            self.nodes[last_child_id as usize].next_sibling = Some(child_id);
        } else {
            self.nodes[parent_id as usize].first_child = Some(child_id);
        }
        self.nodes[parent_id as usize].last_child = Some(child_id);
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over child nodes
pub struct ChildIter<'d> {
    doc: &'d Document,
    next: Option<NodeId>,
}

impl<'d> Iterator for ChildIter<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.get_node(current).and_then(|n| n.next_sibling);
        Some(current)
    }
}

/// Iterator over descendant nodes (depth-first, document order)
pub struct DescendantIter<'d> {
    doc: &'d Document,
    stack: Vec<NodeId>,
}

impl<'d> Iterator for DescendantIter<'d> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;

        // Children in reverse so the first child comes out first
        if let Some(node) = self.doc.get_node(current) {
            let mut child_id = node.last_child;
            while let Some(id) = child_id {
                self.stack.push(id);
                child_id = self.doc.get_node(id).and_then(|n| n.prev_sibling);
            }
        }

        Some(current)
    }
}

/// Escape XML special characters to buffer
#[inline]
fn escape_xml_to_buf(s: &str, buf: &mut String) {
    for c in s.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            _ => buf.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation { source: 0, line, column: 1 }
    }

    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        doc.add_source("sample.xml").unwrap();
        let root = doc.append_element(DOCUMENT_NODE, "root", &[], loc(1)).unwrap();
        let a = doc
            .append_element(root, "a", &[Attribute::new("id", "1"), Attribute::new("k", "v")], loc(2))
            .unwrap();
        let text = doc.append_text(a, "hello").unwrap();
        (doc, root, a, text)
    }

    #[test]
    fn test_new_document_is_empty() {
        let doc = Document::new();
        assert!(doc.is_empty());
        assert_eq!(doc.node_count(), 1);
        assert_eq!(doc.root_element_id(), None);
        assert_eq!(doc.node_kind(doc.document_id()), Some(NodeKind::Document));
    }

    #[test]
    fn test_structure_and_parents() {
        let (doc, root, a, text) = sample();
        assert_eq!(doc.root_element_id(), Some(root));
        assert_eq!(doc.node_name(root), Some("root"));
        assert_eq!(doc.parent(root), Some(DOCUMENT_NODE));
        assert_eq!(doc.parent(a), Some(root));
        assert_eq!(doc.parent(text), Some(a));
        assert_eq!(doc.parent(DOCUMENT_NODE), None);
        assert_eq!(doc.get_node(a).map(|n| n.depth), Some(2));
    }

    #[test]
    fn test_attributes_in_order() {
        let (doc, _, a, _) = sample();
        let attrs: Vec<_> = doc.attributes(a).collect();
        assert_eq!(attrs, vec![("id", "1"), ("k", "v")]);
        assert_eq!(doc.get_attribute(a, "k"), Some("v"));
        assert_eq!(doc.get_attribute(a, "missing"), None);
    }

    #[test]
    fn test_text_and_names_are_kind_checked() {
        let (doc, _, a, text) = sample();
        assert_eq!(doc.text_content(text), Some("hello"));
        assert_eq!(doc.text_content(a), None);
        assert_eq!(doc.node_name(text), None);
    }

    #[test]
    fn test_siblings_and_descendants() {
        let mut doc = Document::new();
        let root = doc.append_element(DOCUMENT_NODE, "root", &[], loc(1)).unwrap();
        let a = doc.append_element(root, "a", &[], loc(1)).unwrap();
        let b = doc.append_element(root, "b", &[], loc(1)).unwrap();
        let c = doc.append_element(b, "c", &[], loc(1)).unwrap();

        assert_eq!(doc.children(root).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(doc.descendants(root).collect::<Vec<_>>(), vec![a, b, c]);

        let first = doc.get_node(a).unwrap();
        assert!(first.prev_sibling.is_none());
        assert_eq!(first.next_sibling, Some(b));
    }

    #[test]
    fn test_location_and_sources() {
        let (doc, _, a, text) = sample();
        let location = doc.location(a).unwrap();
        assert_eq!(location.line, 2);
        assert_eq!(doc.source_name(location.source), Some("sample.xml"));
        assert_eq!(doc.location(text), None);
        assert_eq!(doc.sources(), ["sample.xml".to_string()]);
    }

    #[test]
    fn test_retract_only_last_source() {
        let mut doc = Document::new();
        let a = doc.add_source("a.xml").unwrap();
        let b = doc.add_source("b.xml").unwrap();
        doc.retract_source(a);
        assert_eq!(doc.sources().len(), 2);
        doc.retract_source(b);
        assert_eq!(doc.sources(), ["a.xml".to_string()]);
        assert_eq!(doc.add_source("c.xml").unwrap(), 1);
    }

    #[test]
    fn test_to_xml() {
        let (doc, root, _, _) = sample();
        assert_eq!(doc.to_xml(root), r#"<root><a id="1" k="v">hello</a></root>"#);
        assert_eq!(doc.to_xml(DOCUMENT_NODE), doc.to_xml(root));
    }

    #[test]
    fn test_to_xml_escapes() {
        let mut doc = Document::new();
        let root = doc
            .append_element(DOCUMENT_NODE, "r", &[Attribute::new("q", "a\"b")], loc(1))
            .unwrap();
        doc.append_text(root, "1 < 2 & 3").unwrap();
        assert_eq!(doc.to_xml(root), r#"<r q="a&quot;b">1 &lt; 2 &amp; 3</r>"#);
    }
}
