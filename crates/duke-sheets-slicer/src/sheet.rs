//! Worksheet slicer list and slicer parts
//!
//! A worksheet refers to at most one slicer part through the x15 slicer list
//! in its `extLst`. Every table slicer on the sheet is a `<slicer>` entry in
//! that part.

use duke_sheets_package::content_types::{content_type, register_override};
use duke_sheets_package::path::relative_target;
use duke_sheets_package::relationships::{add_relationship, rel_types, target_part};
use duke_sheets_package::xml::{self, FragmentWriter};
use duke_sheets_package::{PartFamily, PartMap, SheetEntry, TargetMode};

use crate::error::SlicerResult;
use crate::ext_lst::{decode_host, encode_host, uri, DecodePolicy, ExtensionBlock, ExtensionList};
use crate::ns;

/// Row height of a slicer, in EMU
pub const SLICER_ROW_HEIGHT: u32 = 251_883;

/// The slicer part a sheet's slicers go into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicerPartSlot {
    pub part: String,
    /// Worksheet relationship id of the part
    pub rel_id: String,
    /// Whether the sheet already referenced the part
    pub reused: bool,
}

/// Find the sheet's slicer part or allocate one and reference it.
///
/// A new part is only named here; [`append_slicer`] creates it.
pub fn attach_slicer_part(parts: &mut PartMap, sheet: &SheetEntry) -> SlicerResult<SlicerPartSlot> {
    let mut list = decode_host(parts.require_str(&sheet.part)?, &sheet.part, DecodePolicy::Required)?;

    if let Some(slot) = existing_slot(parts, sheet, &list)? {
        log::debug!("{}: reusing slicer part {}", sheet.name, slot.part);
        return Ok(slot);
    }

    let part = PartFamily::SLICER.part_name(PartFamily::SLICER.next_index(parts));
    let rel_id = add_relationship(
        parts,
        &sheet.part,
        rel_types::SLICER,
        &relative_target(&sheet.part, &part),
        TargetMode::Internal,
    )?;

    let mut entry = FragmentWriter::new();
    entry.empty("x14:slicer", &[("r:id", rel_id.as_str())])?;
    let entry = entry.into_string()?;
    add_to_slicer_list(&mut list, &entry)?;

    let updated = encode_host(parts.require_str(&sheet.part)?, &list)?;
    let updated = xml::ensure_namespace(&updated, "x14", ns::X14)?;
    let updated = xml::ensure_namespace(&updated, "r", ns::RELATIONSHIPS)?;
    parts.insert(&sheet.part, updated);

    log::debug!("{}: allocated slicer part {part} as {rel_id}", sheet.name);
    Ok(SlicerPartSlot {
        part,
        rel_id,
        reused: false,
    })
}

/// The slicer part referenced from the x15 slicer list, if it resolves.
fn existing_slot(
    parts: &PartMap,
    sheet: &SheetEntry,
    list: &ExtensionList,
) -> SlicerResult<Option<SlicerPartSlot>> {
    let Some(block) = list.find(uri::SLICER_LIST_X15) else {
        return Ok(None);
    };
    let entries = match xml::elements_named(&block.content, "slicer") {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("{}: ignoring unreadable slicer list: {e}", sheet.name);
            return Ok(None);
        }
    };

    for attrs in entries {
        let rel_id = attrs
            .into_iter()
            .find(|(key, _)| xml::prefix(key).is_some() && xml::local_name(key) == "id")
            .map(|(_, value)| value);
        let Some(rel_id) = rel_id else { continue };
        if let Some(part) = target_part(parts, &sheet.part, &rel_id)? {
            if PartFamily::SLICER.index_of(&part).is_some() {
                return Ok(Some(SlicerPartSlot {
                    part,
                    rel_id,
                    reused: true,
                }));
            }
        }
    }
    Ok(None)
}

/// Add `entry` to the x15 slicer list, creating the block if needed.
fn add_to_slicer_list(list: &mut ExtensionList, entry: &str) -> SlicerResult<()> {
    let fresh = || -> SlicerResult<String> {
        let mut w = FragmentWriter::new();
        w.start("x14:slicerList", &[])?
            .raw(entry)?
            .end("x14:slicerList")?;
        Ok(w.into_string()?)
    };

    match list.find_mut(uri::SLICER_LIST_X15) {
        Some(block) => {
            let existing = xml::top_level_elements(&block.content)
                .ok()
                .and_then(|spans| spans.into_iter().find(|s| s.local_name() == "slicerList"));
            let content = match existing {
                Some(span) => xml::append_child(&block.content, &span, entry),
                None => {
                    log::warn!("rebuilding unreadable worksheet slicer list");
                    fresh()?
                }
            };
            block.set_content(content);
        }
        None => list.merge(
            ExtensionBlock::new(uri::SLICER_LIST_X15, fresh()?).with_namespace("x15", ns::X15),
        ),
    }
    Ok(())
}

/// One `<slicer>` entry of a slicer part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlicerDefinition {
    /// Display name, matching the drawing's `sle:slicer/@name`
    pub name: String,
    /// Cache name
    pub cache: String,
    pub caption: String,
    pub show_caption: Option<bool>,
    pub row_height: u32,
}

impl SlicerDefinition {
    fn write(&self, w: &mut FragmentWriter, tag: &str) -> SlicerResult<()> {
        let row_height = self.row_height.to_string();
        let mut attrs = vec![
            ("name", self.name.as_str()),
            ("cache", self.cache.as_str()),
            ("caption", self.caption.as_str()),
        ];
        if let Some(show) = self.show_caption {
            attrs.push(("showCaption", if show { "1" } else { "0" }));
        }
        attrs.push(("rowHeight", row_height.as_str()));
        w.empty(tag, &attrs)?;
        Ok(())
    }
}

/// Append a slicer to `part`, creating the part on first use.
pub fn append_slicer(parts: &mut PartMap, part: &str, slicer: &SlicerDefinition) -> SlicerResult<()> {
    let updated = match parts.get_str(part)? {
        Some(xml) => {
            let root = xml::root_element(xml)?;
            let mut entry = FragmentWriter::new();
            slicer.write(&mut entry, &xml::qualify(root.prefix(), "slicer"))?;
            xml::append_child(xml, &root, &entry.into_string()?)
        }
        None => {
            let mut w = FragmentWriter::new();
            w.declaration()?.start(
                "slicers",
                &[
                    ("xmlns", ns::X14),
                    ("xmlns:mc", ns::MC),
                    ("mc:Ignorable", "x xr10"),
                    ("xmlns:x", ns::SPREADSHEET_ML),
                    ("xmlns:xr10", ns::XR10),
                ],
            )?;
            slicer.write(&mut w, "slicer")?;
            w.end("slicers")?;
            w.into_string()?
        }
    };
    parts.insert(part, updated);
    register_override(parts, part, content_type::SLICER)?;
    Ok(())
}
