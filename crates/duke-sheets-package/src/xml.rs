//! Span-based XML patching.
//!
//! Parts are edited by locating element byte spans with the `quick-xml` event
//! reader and splicing new markup into the original text. Nothing outside the
//! spliced range is re-serialized, so attribute order, whitespace, prefixes and
//! unknown content survive untouched.

use std::borrow::Cow;
use std::ops::Range;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{PackageError, PackageResult};

/// Byte span of one element inside a document or fragment.
///
/// For a self-closing element `content_start == content_end == end`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpan {
    /// Qualified element name as written (`x:ext`, `worksheet`)
    pub name: String,
    /// Offset of the opening `<`
    pub start: usize,
    /// Offset just past the start tag
    pub content_start: usize,
    /// Offset of the end tag's `<`
    pub content_end: usize,
    /// Offset just past the element
    pub end: usize,
}

impl ElementSpan {
    /// Whether the element was written as `<name/>`
    pub fn is_self_closing(&self) -> bool {
        self.content_start == self.end
    }

    /// Element name without prefix
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// Element prefix, if any
    pub fn prefix(&self) -> Option<&str> {
        prefix(&self.name)
    }

    /// The whole element
    pub fn outer<'a>(&self, xml: &'a str) -> &'a str {
        &xml[self.start..self.end]
    }

    /// Everything between the start and end tags
    pub fn inner<'a>(&self, xml: &'a str) -> &'a str {
        &xml[self.content_start..self.content_end]
    }

    /// The start tag (the whole element when self-closing)
    pub fn start_tag<'a>(&self, xml: &'a str) -> &'a str {
        &xml[self.start..self.content_start]
    }

    /// All attributes of the start tag, in document order
    pub fn attributes(&self, xml: &str) -> PackageResult<Vec<(String, String)>> {
        let mut reader = Reader::from_str(self.start_tag(xml));
        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) => return collect_attributes(&e),
                Event::Eof => return Ok(Vec::new()),
                _ => {}
            }
        }
    }

    /// Value of the attribute with the given qualified name
    pub fn attribute(&self, xml: &str, qname: &str) -> PackageResult<Option<String>> {
        Ok(self
            .attributes(xml)?
            .into_iter()
            .find(|(key, _)| key == qname)
            .map(|(_, value)| value))
    }

    /// Unescaped text content of the element
    pub fn text(&self, xml: &str) -> PackageResult<String> {
        let mut reader = Reader::from_str(self.inner(xml));
        let mut text = String::new();
        loop {
            match reader.read_event()? {
                Event::Text(e) => text.push_str(&e.unescape()?),
                Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(text)
    }
}

/// Strip the namespace prefix from a qualified name.
pub fn local_name(qname: &str) -> &str {
    qname.rsplit_once(':').map(|(_, local)| local).unwrap_or(qname)
}

/// Namespace prefix of a qualified name.
pub fn prefix(qname: &str) -> Option<&str> {
    qname.split_once(':').map(|(prefix, _)| prefix)
}

/// Build a qualified name from an optional prefix.
pub fn qualify(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{prefix}:{local}"),
        _ => local.to_string(),
    }
}

/// Escape text for use in attribute values or character data.
pub fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}

/// Elements at nesting depth zero of a document or fragment.
///
/// A document yields its root element; a fragment such as the inside of an
/// `<extLst>` yields each top-level element in order.
pub fn top_level_elements(xml: &str) -> PackageResult<Vec<ElementSpan>> {
    let mut reader = Reader::from_str(xml);
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut open: Option<(String, usize, usize)> = None;

    loop {
        let before = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(e) => {
                if depth == 0 {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    open = Some((name, tag_start(xml, before), reader.buffer_position()));
                }
                depth += 1;
            }
            Event::End(_) => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    PackageError::InvalidFormat("unexpected end tag".into())
                })?;
                if depth == 0 {
                    if let Some((name, start, content_start)) = open.take() {
                        spans.push(ElementSpan {
                            name,
                            start,
                            content_start,
                            content_end: tag_start(xml, before),
                            end: reader.buffer_position(),
                        });
                    }
                }
            }
            Event::Empty(e) if depth == 0 => {
                let end = reader.buffer_position();
                spans.push(ElementSpan {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    start: tag_start(xml, before),
                    content_start: end,
                    content_end: end,
                    end,
                });
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(PackageError::InvalidFormat("unclosed element".into()));
    }
    Ok(spans)
}

/// The document element.
pub fn root_element(xml: &str) -> PackageResult<ElementSpan> {
    top_level_elements(xml)?
        .into_iter()
        .next()
        .ok_or_else(|| PackageError::InvalidFormat("document has no root element".into()))
}

/// Direct children of `parent`, with offsets into `xml`.
pub fn child_elements(xml: &str, parent: &ElementSpan) -> PackageResult<Vec<ElementSpan>> {
    let offset = parent.content_start;
    Ok(top_level_elements(parent.inner(xml))?
        .into_iter()
        .map(|span| ElementSpan {
            start: span.start + offset,
            content_start: span.content_start + offset,
            content_end: span.content_end + offset,
            end: span.end + offset,
            name: span.name,
        })
        .collect())
}

/// First direct child of `parent` with the given local name.
pub fn find_child(
    xml: &str,
    parent: &ElementSpan,
    local: &str,
) -> PackageResult<Option<ElementSpan>> {
    Ok(child_elements(xml, parent)?
        .into_iter()
        .find(|child| child.local_name() == local))
}

/// Attributes of every element with the given local name, anywhere in `xml`.
pub fn elements_named(xml: &str, local: &str) -> PackageResult<Vec<Vec<(String, String)>>> {
    let mut reader = Reader::from_str(xml);
    let mut found = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                if e.local_name().as_ref() == local.as_bytes() {
                    found.push(collect_attributes(&e)?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(found)
}

/// Replace `range` of `xml` with `replacement`.
pub fn splice(xml: &str, range: Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(xml.len() + replacement.len());
    out.push_str(&xml[..range.start]);
    out.push_str(replacement);
    out.push_str(&xml[range.end..]);
    out
}

/// Append `fragment` as the last child of `parent`, expanding `<parent/>` if needed.
pub fn append_child(xml: &str, parent: &ElementSpan, fragment: &str) -> String {
    if parent.is_self_closing() {
        let tag = parent.outer(xml);
        let open = tag[..tag.len() - 2].trim_end();
        let expanded = format!("{open}>{fragment}</{}>", parent.name);
        splice(xml, parent.start..parent.end, &expanded)
    } else {
        splice(xml, parent.content_end..parent.content_end, fragment)
    }
}

/// Insert `fragment` as a child of `parent`, before the first existing child
/// whose local name is in `successors`; append it when there is none.
///
/// `successors` lists the elements that the schema orders after the new one.
pub fn insert_child_before(
    xml: &str,
    parent: &ElementSpan,
    fragment: &str,
    successors: &[&str],
) -> PackageResult<String> {
    let children = child_elements(xml, parent)?;
    Ok(
        match children
            .iter()
            .find(|child| successors.contains(&child.local_name()))
        {
            Some(next) => splice(xml, next.start..next.start, fragment),
            None => append_child(xml, parent, fragment),
        },
    )
}

/// Declare `xmlns:{prefix}` on the root element unless it already is.
pub fn ensure_namespace(xml: &str, prefix: &str, uri: &str) -> PackageResult<String> {
    let root = root_element(xml)?;
    let key = format!("xmlns:{prefix}");
    if root.attributes(xml)?.iter().any(|(name, _)| *name == key) {
        return Ok(xml.to_string());
    }
    let at = if root.is_self_closing() {
        root.end - 2
    } else {
        root.content_start - 1
    };
    Ok(splice(xml, at..at, &format!(" {key}=\"{}\"", escape(uri))))
}

/// Offset of the `<` that opens the event read from `pos`.
///
/// Depending on the previous event the reader may already have consumed the `<`.
fn tag_start(xml: &str, pos: usize) -> usize {
    if xml.as_bytes().get(pos) == Some(&b'<') {
        return pos;
    }
    xml[..pos].rfind('<').unwrap_or(pos)
}

fn collect_attributes(e: &BytesStart<'_>) -> PackageResult<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.push((key, value));
    }
    Ok(attrs)
}

/// Writes markup fragments (no enclosing document) through `quick-xml`.
///
/// Used for every piece of new markup so values are escaped by the writer and
/// no string trimming is needed to drop a synthetic container.
pub struct FragmentWriter {
    writer: Writer<Vec<u8>>,
}

impl Default for FragmentWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    /// Write the standard `standalone="yes"` XML declaration and a newline
    pub fn declaration(&mut self) -> PackageResult<&mut Self> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        self.writer
            .write_event(Event::Text(BytesText::from_escaped("\n")))?;
        Ok(self)
    }

    /// Write a start tag
    pub fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> PackageResult<&mut Self> {
        let mut start = BytesStart::new(name);
        for &attr in attrs {
            start.push_attribute(attr);
        }
        self.writer.write_event(Event::Start(start))?;
        Ok(self)
    }

    /// Write a self-closing element
    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> PackageResult<&mut Self> {
        let mut start = BytesStart::new(name);
        for &attr in attrs {
            start.push_attribute(attr);
        }
        self.writer.write_event(Event::Empty(start))?;
        Ok(self)
    }

    /// Write an end tag
    pub fn end(&mut self, name: &str) -> PackageResult<&mut Self> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(self)
    }

    /// Write escaped character data
    pub fn text(&mut self, text: &str) -> PackageResult<&mut Self> {
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        Ok(self)
    }

    /// Write `<name attrs>text</name>`
    pub fn text_element(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
        text: &str,
    ) -> PackageResult<&mut Self> {
        self.start(name, attrs)?.text(text)?.end(name)
    }

    /// Write already-serialized markup verbatim
    pub fn raw(&mut self, markup: &str) -> PackageResult<&mut Self> {
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(markup)))?;
        Ok(self)
    }

    /// Finish and return the markup
    pub fn into_string(self) -> PackageResult<String> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| PackageError::InvalidFormat(format!("writer produced invalid UTF-8: {e}")))
    }
}
