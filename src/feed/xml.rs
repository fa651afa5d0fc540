//! Minimal element tree built on quick-xml events.
//!
//! Feed mapping needs look-behind (fallback chains, "first item image"), so
//! the document is materialized into a small tree before any field is read.
//! Element names are kept as qualified names (`itunes:image`), which is how
//! every feed in the wild spells the iTunes and Podcasting 2.0 namespaces.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::parser::ParseError;

/// SEC-003: Maximum element nesting depth. Real feeds stay under 10 levels.
pub(crate) const MAX_XML_DEPTH: usize = 64;

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
}

impl Element {
    fn from_start(start: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Self, ParseError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        let decoder = reader.decoder();

        for attr_result in start.attributes() {
            let attr = match attr_result {
                Ok(attr) => attr,
                Err(e) => {
                    tracing::debug!(element = %name, error = %e, "Skipping malformed attribute");
                    continue;
                }
            };
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .decode_and_unescape_value(decoder)
                .map_err(|e| ParseError::InvalidXml(e.to_string()))?;
            attrs.push((key, value.into_owned()));
        }

        Ok(Self {
            name,
            attrs,
            ..Self::default()
        })
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a Element> + use<'a, 'n> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Trimmed text content, `None` when blank.
    pub fn text(&self) -> Option<&str> {
        Some(self.text.trim()).filter(|t| !t.is_empty())
    }

    /// Text of the first child with the given name that has any.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.children
            .iter()
            .filter(|c| c.name == name)
            .find_map(Element::text)
    }
}

/// Parse a complete document and return its root element.
///
/// Fails on malformed XML, mismatched or unclosed tags, documents without a
/// root element, and nesting deeper than [`MAX_XML_DEPTH`].
pub(crate) fn parse_document(bytes: &[u8]) -> Result<Element, ParseError> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations; only the
    // five predefined entities and character references are resolved.
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ParseError::InvalidXml(format!("at byte {}: {e}", reader.buffer_position())))?;

        match event {
            Event::Start(e) => {
                if stack.len() >= MAX_XML_DEPTH {
                    return Err(ParseError::TooDeep(MAX_XML_DEPTH));
                }
                if root.is_some() && stack.is_empty() {
                    return Err(ParseError::InvalidXml("multiple root elements".into()));
                }
                stack.push(Element::from_start(&e, &reader)?);
            }
            Event::Empty(e) => {
                let element = Element::from_start(&e, &reader)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None if root.is_none() => root = Some(element),
                    None => return Err(ParseError::InvalidXml("multiple root elements".into())),
                }
            }
            Event::End(_) => {
                // quick-xml checks that end names match their start tags
                let element = stack
                    .pop()
                    .ok_or_else(|| ParseError::InvalidXml("unexpected closing tag".into()))?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(element),
                    None => root = Some(element),
                }
            }
            Event::Text(e) => {
                if let Some(current) = stack.last_mut() {
                    let text = e
                        .unescape()
                        .map_err(|e| ParseError::InvalidXml(e.to_string()))?;
                    current.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::InvalidXml(format!(
            "unexpected end of document inside <{}>",
            open.name
        )));
    }

    root.ok_or_else(|| ParseError::InvalidXml("document has no root element".into()))
}
