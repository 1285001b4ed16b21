//! Slicer cache definitions
//!
//! One cache exists per (table, column) pair in the whole package. Slicers on
//! the same column share it by name.

use duke_sheets_package::content_types::{content_type, register_override};
use duke_sheets_package::path::relative_target;
use duke_sheets_package::relationships::{add_relationship, rel_types};
use duke_sheets_package::workbook::{add_defined_name, workbook_part, workbook_scoped_names};
use duke_sheets_package::xml::{self, FragmentWriter};
use duke_sheets_package::{DefinedName, PartFamily, PartMap, TargetMode};

use crate::error::{SlicerError, SlicerResult};
use crate::ext_lst::{decode_host, encode_host, uri, DecodePolicy, ExtensionBlock, ExtensionList};
use crate::names::unique_defined_name;
use crate::ns;
use crate::options::SlicerOptions;
use crate::source::ResolvedSource;

/// Formula of the defined name registered for each cache
pub const CACHE_NAME_FORMULA: &str = "#N/A";

/// Item sort order of a slicer cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// A table slicer cache (`slicerCacheDefinition` bound through `x15:tableSlicerCache`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicerCacheDefinition {
    /// Cache name, also a workbook-scoped defined name
    pub name: String,
    /// Field the cache is built from
    pub source_name: String,
    pub table_id: u32,
    /// 1-based table column
    pub column: u32,
    pub sort_order: SortOrder,
}

impl SlicerCacheDefinition {
    /// Serialize as a complete part
    pub fn to_xml(&self) -> SlicerResult<String> {
        let column = self.column.to_string();
        let table_id = self.table_id.to_string();
        let mut binding_attrs = vec![("tableId", table_id.as_str()), ("column", column.as_str())];
        if self.sort_order == SortOrder::Descending {
            binding_attrs.push(("sortOrder", "descending"));
        }
        let mut binding = FragmentWriter::new();
        binding.empty("x15:tableSlicerCache", &binding_attrs)?;

        let mut ext_lst = ExtensionList::new();
        ext_lst.merge(
            ExtensionBlock::new(uri::SLICER_CACHE_DEFINITION, binding.into_string()?)
                .with_namespace("x15", ns::X15),
        );

        let mut w = FragmentWriter::new();
        w.declaration()?
            .start(
                "slicerCacheDefinition",
                &[
                    ("xmlns", ns::X14),
                    ("xmlns:mc", ns::MC),
                    ("mc:Ignorable", "x xr10"),
                    ("xmlns:x", ns::SPREADSHEET_ML),
                    ("xmlns:x15", ns::X15),
                    ("xmlns:xr10", ns::XR10),
                    ("name", self.name.as_str()),
                    ("sourceName", self.source_name.as_str()),
                ],
            )?
            .start("extLst", &[])?
            .raw(&ext_lst.encode("x:ext")?)?
            .end("extLst")?
            .end("slicerCacheDefinition")?;
        Ok(w.into_string()?)
    }

    /// Read a cache definition part.
    ///
    /// Returns `None` for caches without a table binding (pivot table slicers).
    pub fn parse(xml: &str) -> SlicerResult<Option<Self>> {
        let root = xml::root_element(xml)?;
        let mut name = String::new();
        let mut source_name = String::new();
        for (key, value) in root.attributes(xml)? {
            match key.as_str() {
                "name" => name = value,
                "sourceName" => source_name = value,
                _ => {}
            }
        }

        let ext_lst = decode_host(xml, "slicer cache definition", DecodePolicy::Required)?;
        let Some(binding) = ext_lst.find(uri::SLICER_CACHE_DEFINITION) else {
            return Ok(None);
        };
        let Some(attrs) = xml::elements_named(&binding.content, "tableSlicerCache")?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        let mut table_id = None;
        let mut column = None;
        let mut sort_order = SortOrder::Ascending;
        for (key, value) in attrs {
            match key.as_str() {
                "tableId" => table_id = value.parse().ok(),
                "column" => column = value.parse().ok(),
                "sortOrder" if value == "descending" => sort_order = SortOrder::Descending,
                _ => {}
            }
        }
        match (table_id, column) {
            (Some(table_id), Some(column)) => Ok(Some(Self {
                name,
                source_name,
                table_id,
                column,
                sort_order,
            })),
            _ => Err(SlicerError::decode(
                "tableSlicerCache",
                "missing tableId or column",
            )),
        }
    }
}

/// Cache chosen for a new slicer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRef {
    pub name: String,
    pub part: String,
    /// Whether an existing cache was reused
    pub reused: bool,
}

/// Existing table slicer cache bound to `source`, if any.
///
/// Cache parts that cannot be read are skipped with a warning.
pub fn find_cache(parts: &PartMap, source: &ResolvedSource) -> Option<CacheRef> {
    for (_, part) in PartFamily::SLICER_CACHE.members(parts) {
        let definition = match parts.get_str(part) {
            Ok(Some(xml)) => SlicerCacheDefinition::parse(xml),
            Ok(None) => continue,
            Err(e) => Err(e.into()),
        };
        match definition {
            Ok(Some(def)) if def.table_id == source.table.id && def.column == source.cache_column() => {
                log::debug!("reusing slicer cache {} from {part}", def.name);
                return Some(CacheRef {
                    name: def.name,
                    part: part.to_string(),
                    reused: true,
                });
            }
            Ok(_) => {}
            Err(e) => log::warn!("skipping unreadable slicer cache {part}: {e}"),
        }
    }
    None
}

/// Reuse the cache bound to `source` or create one.
///
/// A new cache gets its part, content type, workbook relationship, entry in
/// the workbook's slicer cache list and a `#N/A` defined name.
pub fn find_or_create_cache(
    parts: &mut PartMap,
    source: &ResolvedSource,
    opts: &SlicerOptions,
) -> SlicerResult<CacheRef> {
    if let Some(existing) = find_cache(parts, source) {
        return Ok(existing);
    }

    let name = unique_defined_name(&opts.name, &workbook_scoped_names(parts)?);
    let part = PartFamily::SLICER_CACHE.part_name(PartFamily::SLICER_CACHE.next_index(parts));
    let definition = SlicerCacheDefinition {
        name: name.clone(),
        source_name: opts.name.clone(),
        table_id: source.table.id,
        column: source.cache_column(),
        sort_order: if opts.item_desc {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        },
    };

    link_workbook_cache(parts, &part)?;
    parts.insert(&part, definition.to_xml()?);
    register_override(parts, &part, content_type::SLICER_CACHE)?;
    add_defined_name(parts, &DefinedName::workbook_scope(&name, CACHE_NAME_FORMULA))?;

    log::debug!("created slicer cache {name} in {part}");
    Ok(CacheRef {
        name,
        part,
        reused: false,
    })
}

/// Relate `cache_part` to the workbook and list it in the workbook's x15
/// slicer caches extension.
fn link_workbook_cache(parts: &mut PartMap, cache_part: &str) -> SlicerResult<()> {
    let workbook = workbook_part(parts)?;
    let mut list = decode_host(parts.require_str(&workbook)?, &workbook, DecodePolicy::Required)?;

    let target = relative_target(&workbook, cache_part);
    let rel_id = add_relationship(parts, &workbook, rel_types::SLICER_CACHE, &target, TargetMode::Internal)?;

    let mut entry = FragmentWriter::new();
    entry.empty("x14:slicerCache", &[("r:id", rel_id.as_str())])?;
    let entry = entry.into_string()?;

    match list.find_mut(uri::SLICER_CACHES_X15) {
        Some(block) => {
            let content = append_cache_entry(&block.content, &entry)?;
            block.set_content(content);
        }
        None => list.merge(
            ExtensionBlock::new(uri::SLICER_CACHES_X15, new_cache_list(&entry)?)
                .with_namespace("x15", ns::X15),
        ),
    }

    let xml = parts.require_str(&workbook)?;
    let updated = encode_host(xml, &list)?;
    let updated = xml::ensure_namespace(&updated, "r", ns::RELATIONSHIPS)?;
    parts.insert(&workbook, updated);
    Ok(())
}

fn new_cache_list(entry: &str) -> SlicerResult<String> {
    let mut w = FragmentWriter::new();
    w.start("x15:slicerCaches", &[("xmlns:x14", ns::X14)])?
        .raw(entry)?
        .end("x15:slicerCaches")?;
    Ok(w.into_string()?)
}

/// Append to an existing `slicerCaches` list; rebuild it if it is unreadable.
fn append_cache_entry(content: &str, entry: &str) -> SlicerResult<String> {
    let existing = xml::top_level_elements(content).map(|spans| {
        spans
            .into_iter()
            .find(|span| span.local_name() == "slicerCaches")
    });
    match existing {
        Ok(Some(list)) => {
            let appended = xml::append_child(content, &list, entry);
            Ok(xml::ensure_namespace(&appended, "x14", ns::X14)?)
        }
        Ok(None) => new_cache_list(entry),
        Err(e) => {
            log::warn!("rebuilding unreadable workbook slicer cache list: {e}");
            new_cache_list(entry)
        }
    }
}
