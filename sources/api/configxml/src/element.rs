//! The raw tree form of the configuration document, and its XML text encoding.
//!
//! An `Element` is either a leaf, which carries text and no children, or a container, whose
//! text (if any) is ignored by the rest of the crate.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use snafu::{ensure, OptionExt, ResultExt};
use std::io;

use super::{error, Result};

/// Indentation used when writing the document, matching what the appliance itself writes.
const INDENT_CHAR: u8 = b'\t';
const INDENT_SIZE: usize = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new<S: Into<String>>(tag: S) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_text<S1, S2>(tag: S1, text: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            tag: tag.into(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the first direct child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Returns the trimmed value of a named field of this element, looking at attributes first
    /// and then at the text of the first child with that tag.  This is what keyed lookups
    /// (e.g. "the user whose name is X") compare against.
    pub fn field_text(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.attribute(name) {
            return Some(value.trim());
        }
        self.child(name)
            .map(|c| c.text.as_deref().unwrap_or_default().trim())
    }

    /// Parses a whole XML document, returning its root element.
    ///
    /// Whitespace-only text is dropped, CDATA is treated as text, and declarations, comments,
    /// processing instructions and doctypes are discarded.
    pub fn parse(xml: &str) -> Result<Element> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        // Elements that have been opened but not closed yet; the last one is the innermost.
        let mut open: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event().context(error::XmlParseSnafu)? {
                Event::Start(start) => open.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    Self::attach(&mut open, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = open.pop().context(error::MalformedSnafu {
                        msg: "closing tag without matching opening tag",
                    })?;
                    Self::attach(&mut open, &mut root, element)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().context(error::XmlParseSnafu)?;
                    Self::push_text(&mut open, &text)?;
                }
                Event::CData(cdata) => {
                    let raw = cdata.into_inner();
                    Self::push_text(&mut open, &String::from_utf8_lossy(&raw))?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        ensure!(
            open.is_empty(),
            error::MalformedSnafu {
                msg: format!("{} element(s) never closed", open.len()),
            }
        );
        root.context(error::MalformedSnafu {
            msg: "no root element",
        })
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Element> {
        let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
        for attribute in start.attributes() {
            let attribute = attribute.context(error::XmlAttributeSnafu)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .context(error::XmlParseSnafu)?
                .into_owned();
            element.attributes.push((key, value));
        }
        Ok(element)
    }

    /// Hands a finished element to its parent, or makes it the root if nothing is open.
    fn attach(open: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
        match open.last_mut() {
            Some(parent) => parent.children.push(element),
            None => {
                ensure!(
                    root.is_none(),
                    error::MalformedSnafu {
                        msg: format!("second root element '{}'", element.tag),
                    }
                );
                *root = Some(element);
            }
        }
        Ok(())
    }

    fn push_text(open: &mut [Element], text: &str) -> Result<()> {
        let current = open.last_mut().context(error::MalformedSnafu {
            msg: "text outside of the root element",
        })?;
        current.text.get_or_insert_with(String::new).push_str(text);
        Ok(())
    }

    /// Serializes this element as the root of a whole XML document.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), INDENT_CHAR, INDENT_SIZE);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", None, None)))
            .context(error::XmlWriteSnafu)?;
        self.write(&mut writer)?;

        let mut xml = String::from_utf8(writer.into_inner()).context(error::XmlEncodingSnafu)?;
        xml.push('\n');
        Ok(xml)
    }

    fn write<W: io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.tag.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.is_leaf() {
            match self.text.as_deref().filter(|t| !t.is_empty()) {
                None => writer
                    .write_event(Event::Empty(start))
                    .context(error::XmlWriteSnafu)?,
                Some(text) => {
                    writer
                        .write_event(Event::Start(start))
                        .context(error::XmlWriteSnafu)?;
                    writer
                        .write_event(Event::Text(BytesText::new(text)))
                        .context(error::XmlWriteSnafu)?;
                    writer
                        .write_event(Event::End(BytesEnd::new(self.tag.as_str())))
                        .context(error::XmlWriteSnafu)?;
                }
            }
            return Ok(());
        }

        writer
            .write_event(Event::Start(start))
            .context(error::XmlWriteSnafu)?;
        for child in &self.children {
            child.write(writer)?;
        }
        writer
            .write_event(Event::End(BytesEnd::new(self.tag.as_str())))
            .context(error::XmlWriteSnafu)?;
        Ok(())
    }
}
