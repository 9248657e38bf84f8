//! Namespace-agnostic XML element tree.
//!
//! BCF producers disagree on namespaces, prefixes and tag casing, so every
//! lookup here goes through local names compared case-insensitively. The
//! tree is built once per document from quick-xml events; malformed input
//! yields `None` and the caller degrades to its empty/default result.

use quick_xml::events::Event;
use quick_xml::Reader;

#[derive(Debug, Default)]
pub struct XmlElement {
    /// Local name as written in the document (namespace prefix stripped).
    pub name: String,
    /// Attribute (local name, value) pairs; namespace declarations dropped.
    pub attributes: Vec<(String, String)>,
    /// Concatenated direct text content.
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    pub fn is_named(&self, local: &str) -> bool {
        self.name.eq_ignore_ascii_case(local)
    }

    /// Attribute value by local name, case-insensitive. Blank values count
    /// as absent so alias chains fall through to the next candidate.
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(local))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// First direct child with the given local name.
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.is_named(local))
    }

    /// Trimmed text of the first matching direct child; `None` when the
    /// child is missing or its text is blank.
    pub fn child_text(&self, local: &str) -> Option<String> {
        let text = self.child(local)?.text.trim();
        if text.is_empty() {
            None
        } else {
            Some(text.to_string())
        }
    }

    /// Ordered alias lookup: one pass over the keys as attributes, then one
    /// pass as child elements. First non-empty value wins.
    pub fn lookup(&self, keys: &[&str]) -> Option<String> {
        for key in keys {
            if let Some(value) = self.attribute(key) {
                return Some(value.to_string());
            }
        }
        for key in keys {
            if let Some(value) = self.child_text(key) {
                return Some(value);
            }
        }
        None
    }

    /// Depth-first pre-order iterator over all descendants (self excluded).
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: self.children.iter().rev().collect(),
        }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        for child in next.children.iter().rev() {
            self.stack.push(child);
        }
        Some(next)
    }
}

fn local_part(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    match text.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => text.into_owned(),
    }
}

fn element_from_start(start: &quick_xml::events::BytesStart<'_>) -> Option<XmlElement> {
    let mut element = XmlElement {
        name: local_part(start.name().local_name().as_ref()),
        ..XmlElement::default()
    };
    for attr in start.attributes() {
        let attr = attr.ok()?;
        if attr.key.as_ref().starts_with(b"xmlns") {
            continue;
        }
        let value = attr.unescape_value().ok()?;
        element
            .attributes
            .push((local_part(attr.key.local_name().as_ref()), value.into_owned()));
    }
    Some(element)
}

/// Parse a complete document into an element tree. Returns `None` on any
/// well-formedness error; callers treat that as "no data extracted".
pub fn parse(xml: &[u8]) -> Option<XmlElement> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    // Synthetic document node; the real root ends up as its first child.
    let mut stack: Vec<XmlElement> = vec![XmlElement::default()];
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                stack.push(element_from_start(e)?);
            }
            Ok(Event::Empty(ref e)) => {
                let element = element_from_start(e)?;
                stack.last_mut()?.children.push(element);
            }
            Ok(Event::End(_)) => {
                if stack.len() < 2 {
                    return None;
                }
                let finished = stack.pop()?;
                stack.last_mut()?.children.push(finished);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.decode().ok()?;
                stack.last_mut()?.text.push_str(&text);
            }
            Ok(Event::GeneralRef(ref e)) => {
                if let Some(ch) = e.resolve_char_ref().ok()? {
                    stack.last_mut()?.text.push(ch);
                } else {
                    let name = e.decode().ok()?;
                    let resolved = quick_xml::escape::resolve_predefined_entity(&name)?;
                    stack.last_mut()?.text.push_str(resolved);
                }
            }
            Ok(Event::CData(ref e)) => {
                let raw = e.clone().into_inner();
                stack
                    .last_mut()?
                    .text
                    .push_str(&String::from_utf8_lossy(&raw));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(_) => return None,
        }
        buf.clear();
    }

    // Unclosed elements mean a truncated document.
    if stack.len() != 1 {
        return None;
    }
    let mut document = stack.pop()?;
    if document.children.is_empty() {
        return None;
    }
    Some(document.children.remove(0))
}
