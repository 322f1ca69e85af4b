//! Event Adapter over a UTF-8 slice
//!
//! Drives the quick-xml pull tokenizer and turns its events into the uniform
//! [`XmlEvent`] sequence. Tag balancing is left to the tree builder, so the
//! tokenizer's own end-name checks are switched off.
//!
//! Text and attribute values get XML 1.0 line-end normalization (section 2.11)
//! before references are expanded, and attribute values additionally get
//! whitespace normalization (section 3.3.3). Character references such as
//! `&#13;` therefore survive as written.

use std::borrow::Cow;

use memchr::{memchr, memchr3};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::events::{Attribute, EndElement, StartElement, TextPosition, XmlEvent};
use super::position::LineIndex;
use crate::error::{DomError, Location, Result};

/// XML event reader over one decoded source
pub struct SliceReader<'a> {
    input: &'a str,
    source: &'a str,
    reader: Reader<&'a [u8]>,
    lines: LineIndex,
    /// End half of a self-closing tag, emitted on the next call
    pending_end: Option<EndElement>,
    done: bool,
}

impl<'a> SliceReader<'a> {
    /// Create a reader; `source` names the input in positions and errors
    pub fn new(input: &'a str, source: &'a str) -> Self {
        let mut reader = Reader::from_str(input);
        let config = reader.config_mut();
        config.trim_text_start = false;
        config.trim_text_end = false;
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        SliceReader {
            input,
            source,
            reader,
            lines: LineIndex::new(input.as_bytes()),
            pending_end: None,
            done: false,
        }
    }

    /// Map a byte offset of this source to a position
    pub fn text_position(&self, offset: usize) -> TextPosition {
        let (line, column) = self.lines.position(offset);
        TextPosition { offset, line, column }
    }

    /// Map a position to a reportable location
    pub fn location(&self, position: TextPosition) -> Location {
        Location::new(self.source, position.line, position.column)
    }

    /// Get the next event. After `EndOfInput` or an error, keeps returning `EndOfInput`.
    pub fn next_event(&mut self) -> Result<XmlEvent> {
        if let Some(end) = self.pending_end.take() {
            return Ok(XmlEvent::ElementEnd(end));
        }

        loop {
            if self.done {
                return Ok(XmlEvent::EndOfInput);
            }

            let offset = self.reader.buffer_position() as usize;
            let event = match self.reader.read_event() {
                Ok(event) => event,
                Err(err) => {
                    self.done = true;
                    let at = self.reader.error_position() as usize;
                    return Err(self.syntax_error(err.to_string(), at));
                }
            };

            match event {
                Event::Start(e) => {
                    let position = self.markup_position(offset);
                    let start = self.start_element(&e, position)?;
                    return Ok(XmlEvent::ElementStart(start));
                }

                Event::Empty(e) => {
                    let position = self.markup_position(offset);
                    let start = self.start_element(&e, position)?;
                    self.pending_end = Some(EndElement {
                        name: start.name.clone(),
                        position,
                    });
                    return Ok(XmlEvent::ElementStart(start));
                }

                Event::End(e) => {
                    let position = self.markup_position(offset);
                    let name = self.utf8(e.name().as_ref(), position.offset)?.to_string();
                    return Ok(XmlEvent::ElementEnd(EndElement { name, position }));
                }

                Event::Text(e) => {
                    let raw = normalize_line_ends(self.utf8(&e, offset)?);
                    let text = unescape(&raw)
                        .map_err(|err| self.syntax_error(format!("invalid text content: {}", err), offset))?;
                    if text.is_empty() {
                        continue;
                    }
                    return Ok(XmlEvent::Text(text.into_owned(), self.text_position(offset)));
                }

                Event::CData(e) => {
                    let position = self.markup_position(offset);
                    let text = normalize_line_ends(self.utf8(&e, offset)?).into_owned();
                    return Ok(XmlEvent::Text(text, position));
                }

                Event::Comment(e) => {
                    let content = String::from_utf8_lossy(&e);
                    return Ok(XmlEvent::Comment(normalize_line_ends(&content).into_owned()));
                }

                Event::Eof => {
                    self.done = true;
                    return Ok(XmlEvent::EndOfInput);
                }

                // XML declaration, processing instructions, DOCTYPE
                _ => {}
            }
        }
    }

    fn start_element(&self, e: &BytesStart<'_>, position: TextPosition) -> Result<StartElement> {
        let name = self.utf8(e.name().as_ref(), position.offset)?.to_string();

        let mut attrs = e.attributes();
        attrs.with_checks(false);

        let mut attributes = Vec::new();
        for attr in attrs {
            let attr = attr.map_err(|err| {
                self.syntax_error(format!("malformed attribute in <{}>: {}", name, err), position.offset)
            })?;
            let key = self.utf8(attr.key.as_ref(), position.offset)?.to_string();
            let raw = normalize_attribute_value(self.utf8(&attr.value, position.offset)?);
            let value = unescape(&raw).map_err(|err| {
                self.syntax_error(format!("invalid value for attribute '{}': {}", key, err), position.offset)
            })?;
            attributes.push(Attribute {
                name: key,
                value: value.into_owned(),
            });
        }

        Ok(StartElement::new(name, attributes, position))
    }

    /// The tokenizer may already have consumed the `<` when text preceded the tag.
    fn markup_position(&self, offset: usize) -> TextPosition {
        let bytes = self.input.as_bytes();
        let start = if bytes.get(offset) == Some(&b'<') {
            offset
        } else {
            offset.saturating_sub(1)
        };
        self.text_position(start)
    }

    fn utf8<'b>(&self, bytes: &'b [u8], offset: usize) -> Result<&'b str> {
        std::str::from_utf8(bytes)
            .map_err(|_| self.syntax_error("invalid UTF-8 in markup".to_string(), offset))
    }

    fn syntax_error(&self, message: String, offset: usize) -> DomError {
        let position = self.text_position(offset.min(self.input.len()));
        DomError::Syntax {
            message,
            location: self.location(position),
            offset,
        }
    }
}

/// `\r\n` and lone `\r` become `\n`
fn normalize_line_ends(raw: &str) -> Cow<'_, str> {
    if memchr(b'\r', raw.as_bytes()).is_none() {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Every tab, line end or `\r\n` pair becomes a single space
fn normalize_attribute_value(raw: &str) -> Cow<'_, str> {
    if memchr3(b'\t', b'\n', b'\r', raw.as_bytes()).is_none() {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push(' ');
            }
            '\t' | '\n' => out.push(' '),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

impl<'a> Iterator for SliceReader<'a> {
    type Item = Result<XmlEvent>;

    /// Yields events up to (not including) `EndOfInput`; an error ends the sequence.
    fn next(&mut self) -> Option<Self::Item> {
        if self.done && self.pending_end.is_none() {
            return None;
        }
        match self.next_event() {
            Ok(XmlEvent::EndOfInput) => None,
            other => Some(other),
        }
    }
}
