//! Namespace-tolerant pull parsing over `quick_xml`.
//!
//! OOXML parts mix the common 2006 transitional namespace family with the
//! rarer purl.oclc.org "strict" family. Every consumer of this reader names
//! the namespace it cares about with a short [`NsId`] and both variants are
//! accepted transparently, so callers never hard-code a URI.

use crate::error::{ExcelError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{QName, ResolveResult};
use quick_xml::reader::NsReader;
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

pub const NS_XLSX_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
pub const NS_XLSX_MAIN_STRICT: &str = "http://purl.oclc.org/ooxml/spreadsheetml/main";
pub const NS_REL_DOC: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
pub const NS_REL_DOC_STRICT: &str = "http://purl.oclc.org/ooxml/officeDocument/relationships";
pub const NS_REL_PKG: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// Short identifier for a namespace family this crate cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NsId {
    /// The empty/unprefixed namespace.
    None,
    /// `spreadsheetml/main`, transitional or strict.
    XlsxMain,
    /// `officeDocument/relationships`, transitional or strict.
    RelDoc,
    /// `package/relationships`.
    RelPkg,
}

impl NsId {
    fn accepted(self) -> &'static [&'static str] {
        match self {
            NsId::None => &[""],
            NsId::XlsxMain => &[NS_XLSX_MAIN, NS_XLSX_MAIN_STRICT],
            NsId::RelDoc => &[NS_REL_DOC, NS_REL_DOC_STRICT],
            NsId::RelPkg => &[NS_REL_PKG],
        }
    }

    /// Parse a namespace identifier from its configuration name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "none" => Ok(NsId::None),
            "xlsx-main" => Ok(NsId::XlsxMain),
            "rel-doc" => Ok(NsId::RelDoc),
            "rel-pkg" => Ok(NsId::RelPkg),
            other => Err(ExcelError::InvalidArg(format!(
                "unknown namespace identifier: {other}"
            ))),
        }
    }
}

enum Source {
    File(NsReader<BufReader<File>>),
    Bytes(NsReader<Cursor<Vec<u8>>>),
}

impl Source {
    fn read_resolved_event_into<'b>(
        &mut self,
        buf: &'b mut Vec<u8>,
    ) -> quick_xml::Result<(ResolveResult, Event<'b>)> {
        match self {
            Source::File(r) => r.read_resolved_event_into(buf),
            Source::Bytes(r) => r.read_resolved_event_into(buf),
        }
    }

    fn resolve_attribute(&self, name: QName<'_>) -> (ResolveResult, quick_xml::name::LocalName<'_>) {
        match self {
            Source::File(r) => r.resolve_attribute(name),
            Source::Bytes(r) => r.resolve_attribute(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    Start,
    Empty,
    End,
    Text,
    Eof,
    Other,
}

/// A single pull-parse step: the kind of node last read, its namespace
/// resolution (for start/empty/end tags), its owned tag data, and any
/// accumulated text.
pub struct XmlPullReader {
    source: Source,
    buf: Vec<u8>,
    kind: NodeKind,
    ns: ResolveResult,
    start: Option<BytesStart<'static>>,
    text: String,
}

impl XmlPullReader {
    /// Open an XML part from a filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = NsReader::from_file(path.as_ref())?;
        reader.config_mut().trim_text(true);
        Ok(XmlPullReader {
            source: Source::File(reader),
            buf: Vec::with_capacity(4096),
            kind: NodeKind::Other,
            ns: ResolveResult::Unbound,
            start: None,
            text: String::new(),
        })
    }

    /// Parse an in-memory XML document (an already-extracted part, or a
    /// synthetic document built for tests).
    pub fn xml(bytes: Vec<u8>) -> Self {
        let mut reader = NsReader::from_reader(Cursor::new(bytes));
        reader.config_mut().trim_text(true);
        XmlPullReader {
            source: Source::Bytes(reader),
            buf: Vec::with_capacity(4096),
            kind: NodeKind::Other,
            ns: ResolveResult::Unbound,
            start: None,
            text: String::new(),
        }
    }

    /// Release any buffered state; further reads return `false`.
    pub fn close(&mut self) {
        self.kind = NodeKind::Eof;
        self.start = None;
        self.text.clear();
    }

    /// Advance to the next node. Returns `false` at end of document.
    pub fn read(&mut self) -> Result<bool> {
        self.buf.clear();
        loop {
            let (ns, event) = self.source.read_resolved_event_into(&mut self.buf)?;
            match event {
                Event::Start(e) => {
                    self.ns = ns;
                    self.start = Some(e.into_owned());
                    self.kind = NodeKind::Start;
                    return Ok(true);
                }
                Event::Empty(e) => {
                    self.ns = ns;
                    self.start = Some(e.into_owned());
                    self.kind = NodeKind::Empty;
                    return Ok(true);
                }
                Event::End(e) => {
                    self.ns = ns;
                    self.start = Some(BytesStart::new(
                        String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    ));
                    self.kind = NodeKind::End;
                    return Ok(true);
                }
                Event::Text(t) => {
                    self.text = t.unescape()?.into_owned();
                    self.kind = NodeKind::Text;
                    return Ok(true);
                }
                Event::CData(c) => {
                    self.text = String::from_utf8_lossy(c.as_ref()).into_owned();
                    self.kind = NodeKind::Text;
                    return Ok(true);
                }
                Event::Eof => {
                    self.kind = NodeKind::Eof;
                    return Ok(false);
                }
                _ => continue,
            }
        }
    }

    /// True when the last node read was a closing tag (or a self-closing
    /// element, which both opens and closes in one step).
    pub fn is_closing_tag(&self) -> bool {
        matches!(self.kind, NodeKind::End | NodeKind::Empty)
    }

    /// True when the last node read carries attributes to read (a `Start`
    /// or a self-closing `Empty` element). Attribute-only elements like
    /// `<numFmt .../>`, `<xf .../>`, `<c .../>` are routinely serialized
    /// self-closing, so callers that only want "does this tag have
    /// attributes to read" should check this instead of the negation of
    /// [`Self::is_closing_tag`], which would wrongly exclude `Empty`.
    pub fn is_opening_tag(&self) -> bool {
        matches!(self.kind, NodeKind::Start | NodeKind::Empty)
    }

    /// True when the last node read was a self-closing element (both
    /// opens and closes at once; it has no separate `End` event).
    pub fn is_empty_element(&self) -> bool {
        matches!(self.kind, NodeKind::Empty)
    }

    /// True when the document has been exhausted.
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, NodeKind::Eof)
    }

    /// The text content of the last `Text`/`CData` node.
    pub fn text(&self) -> &str {
        &self.text
    }

    fn local_name(&self) -> Option<&[u8]> {
        self.start.as_ref().map(|s| s.local_name().into_inner())
    }

    /// Whether the current element's local name and (optional) namespace
    /// match.
    pub fn matches_element(&self, local_name: &str, ns_id: Option<NsId>) -> bool {
        if !matches!(self.kind, NodeKind::Start | NodeKind::Empty | NodeKind::End) {
            return false;
        }
        if self.local_name() != Some(local_name.as_bytes()) {
            return false;
        }
        self.matches_namespace(ns_id, false)
    }

    /// Returns the matching name from `names` if the current element
    /// matches one of them, trying each in order.
    pub fn matches_one_of<'a>(&self, names: &[(&'a str, Option<NsId>)]) -> Option<&'a str> {
        names
            .iter()
            .find(|(name, ns)| self.matches_element(name, *ns))
            .map(|(name, _)| *name)
    }

    /// Whether the current element's (or, with `for_attr`, an attribute's)
    /// resolved namespace is among `ns_id`'s accepted URIs. `None` always
    /// matches (namespace-agnostic check).
    pub fn matches_namespace(&self, ns_id: Option<NsId>, for_attr: bool) -> bool {
        let Some(ns_id) = ns_id else { return true };
        let accepted = ns_id.accepted();
        match &self.ns {
            ResolveResult::Bound(ns) => {
                let uri = std::str::from_utf8(ns.as_ref()).unwrap_or("");
                accepted.contains(&uri)
            }
            ResolveResult::Unbound => accepted.contains(&"") && !for_attr,
            ResolveResult::Unknown(_) => false,
        }
    }

    /// The first attribute whose local name and namespace match.
    pub fn attribute(&self, local_name: &str, ns_id: Option<NsId>) -> Option<String> {
        let start = self.start.as_ref()?;
        for attr in start.attributes().flatten() {
            if attr.key.local_name().as_ref() != local_name.as_bytes() {
                continue;
            }
            let (resolved, _) = self.source.resolve_attribute(attr.key);
            let ok = match ns_id {
                None => true,
                Some(id) => {
                    let accepted = id.accepted();
                    match resolved {
                        ResolveResult::Bound(ns) => {
                            let uri = std::str::from_utf8(ns.as_ref()).unwrap_or("");
                            accepted.contains(&uri)
                        }
                        ResolveResult::Unbound => accepted.contains(&""),
                        ResolveResult::Unknown(_) => false,
                    }
                }
            };
            if !ok {
                continue;
            }
            if let Ok(v) = attr.unescape_value() {
                return Some(v.into_owned());
            }
        }
        None
    }

    /// Skip forward until an element with this local name/namespace opens
    /// (as a `Start` or `Empty` node), or EOF.
    pub fn next_ns(&mut self, local_name: &str, ns_id: Option<NsId>) -> Result<bool> {
        loop {
            if self.matches_element(local_name, ns_id)
                && matches!(self.kind, NodeKind::Start | NodeKind::Empty)
            {
                return Ok(true);
            }
            if !self.read()? {
                return Ok(false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_both_namespace_families() {
        let xml = br#"<sheet xmlns="http://purl.oclc.org/ooxml/spreadsheetml/main" name="A"/>"#;
        let mut r = XmlPullReader::xml(xml.to_vec());
        assert!(r.read().unwrap());
        assert!(r.matches_element("sheet", Some(NsId::XlsxMain)));
        assert_eq!(r.attribute("name", None).as_deref(), Some("A"));
    }

    #[test]
    fn unprefixed_attribute_matches_none() {
        let xml = br#"<Relationship Id="rId1" Type="t" Target="x"/>"#;
        let mut r = XmlPullReader::xml(xml.to_vec());
        assert!(r.read().unwrap());
        assert_eq!(r.attribute("Id", None).as_deref(), Some("rId1"));
    }

    #[test]
    fn next_ns_skips_to_target() {
        let xml = br#"<root><a/><b id="1"/><b id="2"/></root>"#;
        let mut r = XmlPullReader::xml(xml.to_vec());
        assert!(r.next_ns("b", None).unwrap());
        assert_eq!(r.attribute("id", None).as_deref(), Some("1"));
    }

    #[test]
    fn unknown_namespace_identifier_is_invalid_arg() {
        let err = NsId::from_name("bogus").unwrap_err();
        assert!(matches!(err, ExcelError::InvalidArg(_)));
    }
}
