//! Tree Builder
//!
//! Applies the event sequence of one source to a document and its cursor.
//! The cursor belongs to the parser context, so a failed read leaves it
//! exactly as far as the builder got.

use std::collections::HashSet;

use super::document::{Document, DOCUMENT_NODE};
use super::node::{NodeId, SourceId, SourceLocation};
use crate::config::ParserOptions;
use crate::error::{DomError, Location, Result};
use crate::reader::events::{Attribute, EndElement, StartElement, TextPosition, XmlEvent};
use crate::reader::slice::SliceReader;

/// Builds one source into a shared document
pub struct TreeBuilder<'c> {
    doc: &'c mut Document,
    cursor: &'c mut Vec<NodeId>,
    options: &'c ParserOptions,
    source: SourceId,
    source_name: &'c str,
    /// Top-level element contributed by this source
    file_root: Option<NodeId>,
    /// Text not yet committed; adjacent runs merge here
    pending_text: String,
}

impl<'c> TreeBuilder<'c> {
    pub fn new(
        doc: &'c mut Document,
        cursor: &'c mut Vec<NodeId>,
        options: &'c ParserOptions,
        source: SourceId,
        source_name: &'c str,
    ) -> Self {
        TreeBuilder {
            doc,
            cursor,
            options,
            source,
            source_name,
            file_root: None,
            pending_text: String::new(),
        }
    }

    /// Drain the reader into the document. Returns the source's root element.
    pub fn build(mut self, reader: &mut SliceReader<'_>) -> Result<NodeId> {
        loop {
            let event = reader.next_event()?;
            let done = matches!(event, XmlEvent::EndOfInput);
            self.feed(event)?;
            if done {
                break;
            }
        }
        self.file_root.ok_or_else(|| DomError::NoRootElement {
            source_name: self.source_name.to_string(),
        })
    }

    /// Apply a single event
    pub fn feed(&mut self, event: XmlEvent) -> Result<()> {
        match event {
            XmlEvent::ElementStart(start) => {
                self.flush_text()?;
                self.start_element(start)
            }
            XmlEvent::ElementEnd(end) => {
                self.flush_text()?;
                self.end_element(end)
            }
            XmlEvent::Text(content, position) => self.text(content, position),
            // Comments carry no tree meaning and do not split text
            XmlEvent::Comment(_) => Ok(()),
            XmlEvent::EndOfInput => {
                self.flush_text()?;
                self.end_of_input()
            }
        }
    }

    fn start_element(&mut self, start: StartElement) -> Result<()> {
        if let Some(dup) = find_duplicate_attribute(&start.attributes) {
            return Err(DomError::DuplicateAttribute {
                name: dup.to_string(),
                element: start.name,
                location: self.location(start.position),
            });
        }

        let parent = match self.cursor.last() {
            Some(&id) => id,
            None => {
                if let Some(first) = self.file_root {
                    return Err(DomError::MultipleRoots {
                        first: self.doc.node_name(first).unwrap_or_default().to_string(),
                        second: start.name,
                        location: self.location(start.position),
                    });
                }
                DOCUMENT_NODE
            }
        };

        if self.cursor.len() >= self.options.max_depth as usize {
            return Err(DomError::ResourceExhausted(format!(
                "{}: element <{}> exceeds maximum depth {}",
                self.location(start.position),
                start.name,
                self.options.max_depth
            )));
        }

        let location = SourceLocation {
            source: self.source,
            line: start.position.line,
            column: start.position.column,
        };
        let id = self
            .doc
            .append_element(parent, &start.name, &start.attributes, location)?;

        if parent == DOCUMENT_NODE {
            self.file_root = Some(id);
        }
        self.cursor
            .try_reserve(1)
            .map_err(|_| DomError::ResourceExhausted("cursor allocation failed".to_string()))?;
        self.cursor.push(id);
        Ok(())
    }

    fn end_element(&mut self, end: EndElement) -> Result<()> {
        let current = match self.cursor.last() {
            Some(&id) => id,
            None => {
                return Err(DomError::UnbalancedTag {
                    expected: None,
                    found: end.name,
                    location: self.location(end.position),
                })
            }
        };

        let open_name = self.doc.node_name(current).unwrap_or_default();
        if open_name != end.name {
            return Err(DomError::UnbalancedTag {
                expected: Some(open_name.to_string()),
                found: end.name,
                location: self.location(end.position),
            });
        }

        self.cursor.pop();
        Ok(())
    }

    fn text(&mut self, content: String, position: TextPosition) -> Result<()> {
        if self.cursor.is_empty() {
            if is_xml_whitespace(&content) {
                return Ok(());
            }
            return Err(DomError::Syntax {
                message: "text content outside of the root element".to_string(),
                location: self.location(position),
                offset: position.offset,
            });
        }

        if self.pending_text.is_empty() {
            self.pending_text = content;
        } else {
            self.pending_text.push_str(&content);
        }
        Ok(())
    }

    /// Commit the buffered text run as one node under the cursor element
    fn flush_text(&mut self) -> Result<()> {
        if self.pending_text.is_empty() {
            return Ok(());
        }
        let content = std::mem::take(&mut self.pending_text);
        if self.options.skip_whitespace_text && is_xml_whitespace(&content) {
            return Ok(());
        }
        if let Some(&parent) = self.cursor.last() {
            self.doc.append_text(parent, &content)?;
        }
        Ok(())
    }

    fn end_of_input(&mut self) -> Result<()> {
        if let Some(&open) = self.cursor.last() {
            let name = self.doc.node_name(open).unwrap_or_default().to_string();
            let location = match self.doc.location(open) {
                Some(loc) => Location::new(
                    self.doc.source_name(loc.source).unwrap_or(self.source_name),
                    loc.line,
                    loc.column,
                ),
                None => Location::new(self.source_name, 0, 0),
            };
            return Err(DomError::UnterminatedElement { name, location });
        }
        Ok(())
    }

    fn location(&self, position: TextPosition) -> Location {
        Location::new(self.source_name, position.line, position.column)
    }
}

/// Tags with more attributes than this are checked through a hash set
const PAIRWISE_ATTRIBUTE_LIMIT: usize = 8;

/// Find the first attribute whose name repeats an earlier one on the same tag
fn find_duplicate_attribute(attrs: &[Attribute]) -> Option<&str> {
    if attrs.len() <= PAIRWISE_ATTRIBUTE_LIMIT {
        return attrs
            .iter()
            .enumerate()
            .find(|(j, attr)| attrs[..*j].iter().any(|prev| prev.name == attr.name))
            .map(|(_, attr)| attr.name.as_str());
    }

    let mut seen = HashSet::with_capacity(attrs.len());
    attrs
        .iter()
        .find(|attr| !seen.insert(attr.name.as_str()))
        .map(|attr| attr.name.as_str())
}

/// XML whitespace is space, tab, CR and LF only
fn is_xml_whitespace(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::node::NodeKind;

    struct Fixture {
        doc: Document,
        cursor: Vec<NodeId>,
        options: ParserOptions,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_options(ParserOptions::default())
        }

        fn with_options(options: ParserOptions) -> Self {
            Fixture {
                doc: Document::new(),
                cursor: Vec::new(),
                options,
            }
        }

        fn read(&mut self, name: &str, xml: &str) -> Result<NodeId> {
            let source = self.doc.add_source(name)?;
            let mut reader = SliceReader::new(xml, name);
            TreeBuilder::new(&mut self.doc, &mut self.cursor, &self.options, source, name).build(&mut reader)
        }
    }

    #[test]
    fn test_single_element_with_text() {
        let mut fx = Fixture::new();
        let root = fx.read("a.xml", r#"<doc><item id="1">hello</item></doc>"#).unwrap();

        assert_eq!(fx.doc.node_name(root), Some("doc"));
        let item = fx.doc.children(root).next().unwrap();
        assert_eq!(fx.doc.node_name(item), Some("item"));
        assert_eq!(fx.doc.attributes(item).collect::<Vec<_>>(), vec![("id", "1")]);
        let text = fx.doc.children(item).next().unwrap();
        assert_eq!(fx.doc.text_content(text), Some("hello"));
        assert!(fx.cursor.is_empty());
    }

    #[test]
    fn test_document_order_preserved() {
        let mut fx = Fixture::new();
        let root = fx.read("o.xml", "<r><a/><b><c/></b><d/></r>").unwrap();
        let names: Vec<_> = fx
            .doc
            .descendants(root)
            .filter_map(|id| fx.doc.node_name(id))
            .collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
    }

    #[test]
    fn test_mismatched_end_tag() {
        let mut fx = Fixture::new();
        let err = fx.read("m.xml", "<a><b></a>").unwrap_err();
        match err {
            DomError::UnbalancedTag { expected, found, location } => {
                assert_eq!(expected.as_deref(), Some("b"));
                assert_eq!(found, "a");
                assert_eq!((location.line, location.column), (1, 7));
            }
            other => panic!("unexpected error: {other}"),
        }
        // Partial tree stays, cursor still holds a and b
        assert_eq!(fx.cursor.len(), 2);
    }

    #[test]
    fn test_stray_end_tag() {
        let mut fx = Fixture::new();
        let err = fx.read("s.xml", "</a>").unwrap_err();
        assert!(matches!(err, DomError::UnbalancedTag { expected: None, .. }));
    }

    #[test]
    fn test_duplicate_attribute_allocates_nothing() {
        let mut fx = Fixture::new();
        let err = fx.read("d.xml", r#"<a id="1" id="2"/>"#).unwrap_err();
        match err {
            DomError::DuplicateAttribute { name, element, .. } => {
                assert_eq!(name, "id");
                assert_eq!(element, "a");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fx.doc.node_count(), 1);
    }

    #[test]
    fn test_duplicate_found_on_wide_tag() {
        let mut attrs: Vec<String> = (0..200).map(|i| format!(r#"a{i}="{i}""#)).collect();
        attrs.push(r#"a150="again""#.to_string());
        let xml = format!("<wide {}/>", attrs.join(" "));

        let mut fx = Fixture::new();
        match fx.read("w.xml", &xml).unwrap_err() {
            DomError::DuplicateAttribute { name, element, .. } => {
                assert_eq!(name, "a150");
                assert_eq!(element, "wide");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(fx.doc.node_count(), 1);

        let unique: Vec<String> = (0..200).map(|i| format!(r#"b{i}="{i}""#)).collect();
        let root = fx.read("u.xml", &format!("<wide {}/>", unique.join(" "))).unwrap();
        assert_eq!(fx.doc.attributes(root).count(), 200);
    }

    #[test]
    fn test_first_repeat_reported() {
        let attr = |name: &str| Attribute {
            name: name.to_string(),
            value: String::new(),
        };
        let small = [attr("x"), attr("y"), attr("y"), attr("x")];
        assert_eq!(find_duplicate_attribute(&small), Some("y"));

        let mut wide: Vec<Attribute> = (0..20).map(|i| attr(&format!("n{i}"))).collect();
        wide.push(attr("n3"));
        wide.push(attr("n1"));
        assert_eq!(find_duplicate_attribute(&wide), Some("n3"));
        assert_eq!(find_duplicate_attribute(&wide[..20]), None);
    }

    #[test]
    fn test_multiple_roots_in_one_source() {
        let mut fx = Fixture::new();
        let err = fx.read("two.xml", "<a/><b/>").unwrap_err();
        match err {
            DomError::MultipleRoots { first, second, .. } => {
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_roots_of_separate_sources_are_siblings() {
        let mut fx = Fixture::new();
        let a = fx.read("a.xml", "<root><a/></root>").unwrap();
        let b = fx.read("b.xml", "<other/>").unwrap();
        assert_eq!(fx.doc.top_level_elements().collect::<Vec<_>>(), vec![a, b]);
        let b_loc = fx.doc.location(b).unwrap();
        assert_eq!(fx.doc.source_name(b_loc.source), Some("b.xml"));
    }

    #[test]
    fn test_unterminated_element_names_innermost() {
        let mut fx = Fixture::new();
        let err = fx.read("u.xml", "<a>\n  <b>text").unwrap_err();
        match err {
            DomError::UnterminatedElement { name, location } => {
                assert_eq!(name, "b");
                assert_eq!(location.source, "u.xml");
                assert_eq!((location.line, location.column), (2, 3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_root_element() {
        let mut fx = Fixture::new();
        let err = fx.read("empty.xml", "<?xml version=\"1.0\"?>\n<!-- nothing -->\n").unwrap_err();
        assert!(matches!(err, DomError::NoRootElement { ref source_name } if source_name == "empty.xml"));
    }

    #[test]
    fn test_text_runs_coalesced_across_comments_and_cdata() {
        let mut fx = Fixture::new();
        let root = fx.read("c.xml", "<a>one<!-- x -->two<![CDATA[<3>]]>&amp;</a>").unwrap();
        let children: Vec<_> = fx.doc.children(root).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(fx.doc.text_content(children[0]), Some("onetwo<3>&"));
    }

    #[test]
    fn test_text_not_coalesced_across_elements() {
        let mut fx = Fixture::new();
        let root = fx.read("t.xml", "<a>x<b/>y</a>").unwrap();
        let kinds: Vec<_> = fx.doc.children(root).filter_map(|id| fx.doc.node_kind(id)).collect();
        assert_eq!(kinds, [NodeKind::Text, NodeKind::Element, NodeKind::Text]);
    }

    #[test]
    fn test_whitespace_outside_root_ignored() {
        let mut fx = Fixture::new();
        fx.read("w.xml", "\n  <a/>\n\n").unwrap();
        assert_eq!(fx.doc.children(DOCUMENT_NODE).count(), 1);
    }

    #[test]
    fn test_text_outside_root_rejected() {
        let mut fx = Fixture::new();
        let err = fx.read("w.xml", "<a/>trailing").unwrap_err();
        assert!(matches!(err, DomError::Syntax { .. }));
    }

    #[test]
    fn test_whitespace_text_kept_by_default() {
        let mut fx = Fixture::new();
        let root = fx.read("k.xml", "<a>\n  <b/>\n</a>").unwrap();
        assert_eq!(fx.doc.children(root).count(), 3);
    }

    #[test]
    fn test_skip_whitespace_text() {
        let mut fx = Fixture::with_options(ParserOptions::new().skip_whitespace_text(true));
        let root = fx.read("k.xml", "<a>\n  <b> x </b>\n</a>").unwrap();
        let children: Vec<_> = fx.doc.children(root).collect();
        assert_eq!(children.len(), 1);
        let b_text = fx.doc.children(children[0]).next().unwrap();
        assert_eq!(fx.doc.text_content(b_text), Some(" x "));
    }

    #[test]
    fn test_max_depth() {
        let mut fx = Fixture::with_options(ParserOptions::new().max_depth(2));
        assert!(fx.read("ok.xml", "<a><b/></a>").is_ok());

        let mut fx = Fixture::with_options(ParserOptions::new().max_depth(2));
        let err = fx.read("deep.xml", "<a><b><c/></b></a>").unwrap_err();
        assert!(matches!(err, DomError::ResourceExhausted(_)));
    }

    #[test]
    fn test_feed_events_directly() {
        let mut doc = Document::new();
        let mut cursor = Vec::new();
        let options = ParserOptions::default();
        let source = doc.add_source("events").unwrap();
        let mut builder = TreeBuilder::new(&mut doc, &mut cursor, &options, source, "events");

        let pos = TextPosition::default();
        builder
            .feed(XmlEvent::ElementStart(StartElement::new("a", vec![], pos)))
            .unwrap();
        builder.feed(XmlEvent::Text("hi".into(), pos)).unwrap();
        builder
            .feed(XmlEvent::ElementEnd(EndElement { name: "a".into(), position: pos }))
            .unwrap();
        builder.feed(XmlEvent::EndOfInput).unwrap();

        assert!(cursor.is_empty());
        assert_eq!(doc.to_xml(DOCUMENT_NODE), "<a>hi</a>");
    }
}
