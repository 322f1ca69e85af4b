//! XML Event Types
//!
//! The uniform event sequence handed from the adapter to the tree builder.
//! Events own their strings: the tokenizer's borrows end with each read.

/// Byte offset plus the line/column it maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextPosition {
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

/// One `name="value"` pair from a start tag, value already unescaped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Start element event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartElement {
    /// Full element name, prefix included
    pub name: String,
    /// Attributes in source order; duplicates are not filtered here
    pub attributes: Vec<Attribute>,
    /// Position of the `<`
    pub position: TextPosition,
}

impl StartElement {
    pub fn new(name: impl Into<String>, attributes: Vec<Attribute>, position: TextPosition) -> Self {
        StartElement {
            name: name.into(),
            attributes,
            position,
        }
    }

    /// Get an attribute value by name (first match)
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

/// End element event data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndElement {
    pub name: String,
    /// Position of the `</`, or of the `<` of a self-closing tag
    pub position: TextPosition,
}

/// XML parsing event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// `<name attrs...>`, also emitted first for `<name/>`
    ElementStart(StartElement),
    /// `</name>`, also emitted right after the start of `<name/>`
    ElementEnd(EndElement),
    /// Character data or CDATA content, with the position where the run starts
    Text(String, TextPosition),
    /// Comment content; carries no tree meaning
    Comment(String),
    /// Source exhausted
    EndOfInput,
}

#[cfg(test)]
impl XmlEvent {
    pub fn as_start_element(&self) -> Option<&StartElement> {
        match self {
            XmlEvent::ElementStart(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            XmlEvent::Text(t, _) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_element_lookup() {
        let elem = StartElement::new(
            "item",
            vec![Attribute::new("id", "1"), Attribute::new("kind", "x")],
            TextPosition::default(),
        );
        assert_eq!(elem.get_attribute("kind"), Some("x"));
        assert_eq!(elem.get_attribute("missing"), None);
    }

    #[test]
    fn test_event_accessors() {
        let start = XmlEvent::ElementStart(StartElement::new("a", vec![], TextPosition::default()));
        assert_eq!(start.as_start_element().map(|e| e.name.as_str()), Some("a"));
        assert_eq!(start.as_text(), None);
        assert_eq!(XmlEvent::Text("hi".into(), TextPosition::default()).as_text(), Some("hi"));
        assert!(XmlEvent::EndOfInput.as_start_element().is_none());
    }
}
