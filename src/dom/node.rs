//! XML Node representation
//!
//! Uses NodeId (u32) for compact, cache-friendly node references.

use super::strings::StrId;

/// Compact node identifier (index into arena)
pub type NodeId = u32;

/// Index into the document's list of source names
pub type SourceId = u32;

/// Type of XML node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Implicit container holding the root element of every source
    Document,
    /// Element node
    Element,
    /// Text content (CDATA included)
    Text,
}

/// An XML node in the arena
#[derive(Debug, Clone)]
pub struct XmlNode {
    /// Type of this node
    pub kind: NodeKind,
    /// Parent node (None for the document node). Lookup only, never owning.
    pub parent: Option<NodeId>,
    /// First child node
    pub first_child: Option<NodeId>,
    /// Last child node
    pub last_child: Option<NodeId>,
    /// Previous sibling
    pub prev_sibling: Option<NodeId>,
    /// Next sibling
    pub next_sibling: Option<NodeId>,
    /// Pool ID of the tag name (elements) or the content (text nodes)
    pub name_id: StrId,
    /// Start of attributes in attribute arena (for elements)
    pub attr_start: u32,
    /// Number of attributes
    pub attr_count: u16,
    /// Depth in document tree; top-level elements are 1
    pub depth: u16,
    /// Source the node was read from
    pub source: SourceId,
    /// 1-based line of the start tag (0 for the document node)
    pub line: u32,
    /// 1-based column of the start tag
    pub column: u32,
}

impl XmlNode {
    /// Create the document container node
    pub fn document() -> Self {
        XmlNode {
            kind: NodeKind::Document,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            name_id: 0,
            attr_start: 0,
            attr_count: 0,
            depth: 0,
            source: 0,
            line: 0,
            column: 0,
        }
    }

    /// Create a new element node
    pub fn element(name_id: StrId, parent: NodeId, depth: u16) -> Self {
        XmlNode {
            kind: NodeKind::Element,
            parent: Some(parent),
            name_id,
            depth,
            ..Self::document()
        }
    }

    /// Create a new text node
    pub fn text(content_id: StrId, parent: NodeId, depth: u16) -> Self {
        XmlNode {
            kind: NodeKind::Text,
            parent: Some(parent),
            name_id: content_id,
            depth,
            ..Self::document()
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        self.kind == NodeKind::Text
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        self.first_child.is_some()
    }

    #[inline]
    pub fn has_attributes(&self) -> bool {
        self.attr_count > 0
    }
}

/// Stored attribute
#[derive(Debug, Clone, Copy)]
pub struct XmlAttribute {
    pub name_id: StrId,
    pub value_id: StrId,
}

impl XmlAttribute {
    pub fn new(name_id: StrId, value_id: StrId) -> Self {
        XmlAttribute { name_id, value_id }
    }
}

/// Where an element came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub source: SourceId,
    pub line: u32,
    pub column: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_node() {
        let doc = XmlNode::document();
        assert_eq!(doc.kind, NodeKind::Document);
        assert!(doc.parent.is_none());
        assert_eq!(doc.depth, 0);
    }

    #[test]
    fn test_element_node() {
        let elem = XmlNode::element(1, 0, 1);
        assert!(elem.is_element());
        assert_eq!(elem.parent, Some(0));
        assert_eq!(elem.name_id, 1);
        assert!(!elem.has_children());
        assert!(!elem.has_attributes());
    }

    #[test]
    fn test_text_node() {
        let text = XmlNode::text(3, 1, 2);
        assert!(text.is_text());
        assert_eq!(text.name_id, 3);
        assert_eq!(text.depth, 2);
    }
}
