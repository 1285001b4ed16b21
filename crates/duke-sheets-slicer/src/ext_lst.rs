//! `<extLst>` codec
//!
//! An extension list is an ordered run of `<ext uri="{GUID}">` blocks. Blocks
//! this crate does not understand are kept as their original source text and
//! written back unchanged, along with any comments or whitespace around them. New blocks are merged in and the list is put into
//! the order Excel expects (see [`priority_rank`]).

use duke_sheets_package::xml::{self, FragmentWriter};

use crate::error::{SlicerError, SlicerResult};

/// Extension URIs
pub mod uri {
    pub const CONDITIONAL_FORMATTINGS: &str = "{78C0D931-6437-407d-A8EE-F0AAD7539E65}";
    pub const DATA_VALIDATIONS: &str = "{CCE6A557-97BC-4b89-ADB6-D9C93CAAB3DF}";
    pub const SPARKLINE_GROUPS: &str = "{05C60535-1F16-4fd2-B633-F4F36F0B64E0}";
    /// Worksheet slicer list (Excel 2010 pivot slicers)
    pub const SLICER_LIST_X14: &str = "{A8765BA9-456A-4dab-B4F3-ACF838C121DE}";
    pub const PROTECTED_RANGES: &str = "{FC87AEE6-9EDD-4A0A-B7FB-166176984837}";
    pub const IGNORED_ERRORS: &str = "{01252117-D84E-4E92-8308-4BE1C098FCBB}";
    pub const WEB_EXTENSIONS: &str = "{F7C9EE02-42E1-4005-9D12-6889AFFD525C}";
    /// Worksheet slicer list (Excel 2013 table slicers)
    pub const SLICER_LIST_X15: &str = "{3A4CF648-6AED-40f4-86FF-DC5316D8AED3}";
    pub const TIMELINE_REFS: &str = "{7E03D99C-DC04-49d9-9315-930204A7B6E9}";
    pub const EXTERNAL_LINK_PR: &str = "{FCE6A71B-6B00-49CD-AB44-F6B1AE7CDE65}";
    pub const PIVOT_CACHES_X14: &str = "{876F7934-8845-4945-9796-88D515C7AA90}";
    /// Workbook slicer caches (Excel 2010 pivot slicers)
    pub const SLICER_CACHES_X14: &str = "{BBE1A952-AA13-448e-AADC-164F8A28A991}";
    pub const WORKBOOK_PR_X14: &str = "{79F54976-1DA5-4618-B147-4CDE4B953A38}";
    pub const PIVOT_CACHES_X15: &str = "{841E416B-1EF1-43b6-AB56-02D37102CBD5}";
    /// Workbook slicer caches (Excel 2013 table slicers)
    pub const SLICER_CACHES_X15: &str = "{46BE6895-7355-4a93-B00E-2C351335B9C9}";
    pub const TIMELINE_CACHE_REFS: &str = "{D0CA8CA8-9F24-4464-BF8E-62219DCF47F9}";
    pub const WORKBOOK_PR_X15: &str = "{140A7094-0E35-4892-8432-C4D2E57EDEB5}";
    /// Table binding inside a slicer cache definition
    pub const SLICER_CACHE_DEFINITION: &str = "{2F2917AC-EB37-4324-AD4E-5DD8C200BD13}";
}

/// Known URIs in the order Excel writes them
const URI_PRIORITY: &[&str] = &[
    uri::CONDITIONAL_FORMATTINGS,
    uri::DATA_VALIDATIONS,
    uri::SPARKLINE_GROUPS,
    uri::SLICER_LIST_X14,
    uri::PROTECTED_RANGES,
    uri::IGNORED_ERRORS,
    uri::WEB_EXTENSIONS,
    uri::SLICER_LIST_X15,
    uri::TIMELINE_REFS,
    uri::EXTERNAL_LINK_PR,
    uri::PIVOT_CACHES_X14,
    uri::SLICER_CACHES_X14,
    uri::WORKBOOK_PR_X14,
    uri::PIVOT_CACHES_X15,
    uri::SLICER_CACHES_X15,
    uri::TIMELINE_CACHE_REFS,
    uri::WORKBOOK_PR_X15,
];

/// Sort rank of an extension URI. Unknown URIs rank after every known one.
pub fn priority_rank(uri: &str) -> usize {
    URI_PRIORITY
        .iter()
        .position(|known| *known == uri)
        .unwrap_or(URI_PRIORITY.len())
}

/// What to do when an existing list cannot be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePolicy {
    /// Fail with [`SlicerError::Decode`]
    Required,
    /// Log a warning and treat the list as empty
    Tolerant,
}

/// One `<ext>` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionBlock {
    pub uri: String,
    /// `xmlns:*` declarations on the `<ext>` element, as `(prefix, uri)`
    pub namespaces: Vec<(String, String)>,
    /// Inner markup, not interpreted
    pub content: String,
    /// Element name the block was read with
    tag: Option<String>,
    /// Source text of a decoded block, dropped once its content changes
    raw: Option<String>,
    /// Text between the previous block and this one
    leading: String,
}

impl ExtensionBlock {
    /// A new block
    pub fn new(uri: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            namespaces: Vec::new(),
            content: content.into(),
            tag: None,
            raw: None,
            leading: String::new(),
        }
    }

    /// Declare a namespace on the `<ext>` element
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.push((prefix.into(), uri.into()));
        self
    }

    /// Replace the inner markup
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.raw = None;
    }

    /// Original source text, while the block is unmodified
    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    fn decode(fragment: &str, span: &xml::ElementSpan) -> SlicerResult<Self> {
        let mut block = ExtensionBlock::new(String::new(), span.inner(fragment));
        for (key, value) in span.attributes(fragment)? {
            if key == "uri" {
                block.uri = value;
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                block.namespaces.push((prefix.to_string(), value));
            }
        }
        block.tag = Some(span.name.clone());
        block.raw = Some(span.outer(fragment).to_string());
        Ok(block)
    }

    fn encode_into(&self, w: &mut FragmentWriter, ext_tag: &str) -> SlicerResult<()> {
        w.raw(&self.leading)?;
        if let Some(raw) = &self.raw {
            w.raw(raw)?;
            return Ok(());
        }
        let tag = self.tag.as_deref().unwrap_or(ext_tag);
        let declarations: Vec<(String, &str)> = self
            .namespaces
            .iter()
            .map(|(prefix, uri)| (format!("xmlns:{prefix}"), uri.as_str()))
            .collect();
        let mut attrs = vec![("uri", self.uri.as_str())];
        attrs.extend(declarations.iter().map(|(key, value)| (key.as_str(), *value)));
        w.start(tag, &attrs)?.raw(&self.content)?.end(tag)?;
        Ok(())
    }
}

/// Ordered extension blocks of one `<extLst>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionList {
    blocks: Vec<ExtensionBlock>,
    /// Text after the last block
    trailing: String,
}

impl ExtensionList {
    /// An empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the inside of an `<extLst>`, failing on malformed markup.
    pub fn decode(fragment: &str) -> SlicerResult<Self> {
        let mut blocks = Vec::new();
        let mut cursor = 0;
        for span in xml::top_level_elements(fragment)
            .map_err(|e| SlicerError::decode("extension list", e))?
        {
            let mut block = ExtensionBlock::decode(fragment, &span)
                .map_err(|e| SlicerError::decode("extension list", e))?;
            block.leading = fragment[cursor..span.start].to_string();
            cursor = span.end;
            blocks.push(block);
        }
        Ok(Self {
            blocks,
            trailing: fragment[cursor..].to_string(),
        })
    }

    /// Decode with an explicit failure policy.
    pub fn decode_with(fragment: &str, policy: DecodePolicy) -> SlicerResult<Self> {
        match (Self::decode(fragment), policy) {
            (Ok(list), _) => Ok(list),
            (Err(err), DecodePolicy::Required) => Err(err),
            (Err(err), DecodePolicy::Tolerant) => {
                log::warn!("ignoring undecodable extension list: {err}");
                Ok(Self::new())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks in list order
    pub fn blocks(&self) -> &[ExtensionBlock] {
        &self.blocks
    }

    /// First block with the given URI
    pub fn find(&self, uri: &str) -> Option<&ExtensionBlock> {
        self.blocks.iter().find(|block| block.uri == uri)
    }

    /// First block with the given URI, mutably
    pub fn find_mut(&mut self, uri: &str) -> Option<&mut ExtensionBlock> {
        self.blocks.iter_mut().find(|block| block.uri == uri)
    }

    /// Append `block` and restore priority order.
    ///
    /// The sort is stable, so blocks of equal rank (in particular all unknown
    /// URIs) keep their relative order.
    pub fn merge(&mut self, block: ExtensionBlock) {
        self.blocks.push(block);
        self.blocks.sort_by_key(|block| priority_rank(&block.uri));
    }

    /// Serialize the blocks without a container element.
    ///
    /// New blocks are written as `ext_tag`; decoded blocks keep their own name.
    pub fn encode(&self, ext_tag: &str) -> SlicerResult<String> {
        let mut w = FragmentWriter::new();
        for block in &self.blocks {
            block
                .encode_into(&mut w, ext_tag)
                .map_err(|e| SlicerError::encode(format!("extension {}", block.uri), e))?;
        }
        w.raw(&self.trailing)?;
        Ok(w.into_string()?)
    }
}

/// Decode the `<extLst>` child of a part's root element.
///
/// A part without one yields an empty list. `what` names the part in errors.
pub fn decode_host(xml: &str, what: &str, policy: DecodePolicy) -> SlicerResult<ExtensionList> {
    let fragment = xml::root_element(xml)
        .and_then(|root| xml::find_child(xml, &root, "extLst"))
        .map(|ext_lst| ext_lst.map(|span| span.inner(xml)).unwrap_or(""));

    let decoded = match fragment {
        Ok(fragment) => ExtensionList::decode(fragment),
        Err(e) => Err(SlicerError::decode(what, e)),
    };
    match (decoded, policy) {
        (Ok(list), _) => Ok(list),
        (Err(SlicerError::Decode { reason, .. }), DecodePolicy::Required) => {
            Err(SlicerError::decode(format!("{what} extLst"), reason))
        }
        (Err(err), DecodePolicy::Required) => Err(err),
        (Err(err), DecodePolicy::Tolerant) => {
            log::warn!("{what}: ignoring undecodable extLst: {err}");
            Ok(ExtensionList::new())
        }
    }
}

/// Write `list` as the `<extLst>` of a part's root element.
///
/// Replaces the contents of an existing `<extLst>` or appends a new one as the
/// last child, which is where every host schema places it.
pub fn encode_host(xml: &str, list: &ExtensionList) -> SlicerResult<String> {
    let root = xml::root_element(xml)?;
    let prefix = root.prefix();
    let blocks = list.encode(&xml::qualify(prefix, "ext"))?;

    Ok(match xml::find_child(xml, &root, "extLst")? {
        Some(ext_lst) if ext_lst.is_self_closing() => {
            let wrapped = format!("<{0}>{blocks}</{0}>", ext_lst.name);
            xml::splice(xml, ext_lst.start..ext_lst.end, &wrapped)
        }
        Some(ext_lst) => xml::splice(xml, ext_lst.content_start..ext_lst.content_end, &blocks),
        None => {
            let tag = xml::qualify(prefix, "extLst");
            xml::append_child(xml, &root, &format!("<{tag}>{blocks}</{tag}>"))
        }
    })
}
