//! Part relationships (`_rels/*.rels`)
//!
//! Relationship ids are local to one `.rels` part. New ids are always
//! `rId{max + 1}` over the ids present when the part is scanned, so an id is
//! never handed out twice even when earlier relationships have been removed.

use crate::error::{PackageError, PackageResult};
use crate::package::PartMap;
use crate::path::{rels_for_part, resolve_target};
use crate::xml::{self, FragmentWriter};

/// Namespace of `.rels` parts
pub const NS_PACKAGE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

/// Relationship type URIs
pub mod rel_types {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const TABLE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/table";
    pub const DRAWING: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing";
    pub const SLICER: &str = "http://schemas.microsoft.com/office/2007/relationships/slicer";
    pub const SLICER_CACHE: &str =
        "http://schemas.microsoft.com/office/2007/relationships/slicerCache";
}

/// How a relationship target is interpreted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TargetMode {
    /// A part inside the package
    #[default]
    Internal,
    /// An external resource (URL, file)
    External,
}

/// One `<Relationship>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub type_uri: String,
    pub target: String,
    pub target_mode: TargetMode,
}

impl Relationship {
    /// Numeric part of an `rIdN` id
    pub fn numeric_id(&self) -> Option<u32> {
        self.id.strip_prefix("rId")?.parse().ok()
    }
}

/// Parse the entries of a `.rels` part. Entries without an `Id` are skipped.
pub fn parse_relationships(xml: &str) -> PackageResult<Vec<Relationship>> {
    let mut rels = Vec::new();
    for attrs in xml::elements_named(xml, "Relationship")? {
        let mut id = None;
        let mut type_uri = String::new();
        let mut target = String::new();
        let mut target_mode = TargetMode::Internal;
        for (key, value) in attrs {
            match xml::local_name(&key) {
                "Id" => id = Some(value),
                "Type" => type_uri = value,
                "Target" => target = value,
                "TargetMode" if value.trim().eq_ignore_ascii_case("External") => {
                    target_mode = TargetMode::External
                }
                _ => {}
            }
        }
        if let Some(id) = id {
            rels.push(Relationship {
                id,
                type_uri,
                target,
                target_mode,
            });
        }
    }
    Ok(rels)
}

/// Relationships owned by `owner_part` (empty when it has no `.rels` part)
pub fn relationships(parts: &PartMap, owner_part: &str) -> PackageResult<Vec<Relationship>> {
    match parts.get_str(&rels_for_part(owner_part))? {
        Some(xml) => parse_relationships(xml),
        None => Ok(Vec::new()),
    }
}

/// Next free `rIdN` number for a set of relationships
pub fn next_relationship_id(rels: &[Relationship]) -> PackageResult<u32> {
    rels.iter()
        .filter_map(Relationship::numeric_id)
        .max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| PackageError::InvalidFormat("relationship ids exhausted".into()))
}

/// Resolve relationship `id` of `owner_part` to the part it targets.
///
/// Returns `None` for unknown ids and external targets.
pub fn target_part(parts: &PartMap, owner_part: &str, id: &str) -> PackageResult<Option<String>> {
    Ok(relationships(parts, owner_part)?
        .into_iter()
        .find(|rel| rel.id == id && rel.target_mode == TargetMode::Internal)
        .map(|rel| resolve_target(owner_part, &rel.target)))
}

/// Add a relationship from `owner_part` and return its new id.
///
/// Creates the `.rels` part when the owner has none yet.
pub fn add_relationship(
    parts: &mut PartMap,
    owner_part: &str,
    type_uri: &str,
    target: &str,
    target_mode: TargetMode,
) -> PackageResult<String> {
    let rels_part = rels_for_part(owner_part);
    let existing = parts.get_str(&rels_part)?.map(str::to_owned);
    let next = match &existing {
        Some(xml) => next_relationship_id(&parse_relationships(xml)?)?,
        None => 1,
    };
    let id = format!("rId{next}");

    let mut attrs = vec![("Id", id.as_str()), ("Type", type_uri), ("Target", target)];
    if target_mode == TargetMode::External {
        attrs.push(("TargetMode", "External"));
    }

    let updated = match existing {
        Some(xml) => {
            let root = xml::root_element(&xml)?;
            let mut entry = FragmentWriter::new();
            entry.empty(&xml::qualify(root.prefix(), "Relationship"), &attrs)?;
            xml::append_child(&xml, &root, &entry.into_string()?)
        }
        None => {
            let mut w = FragmentWriter::new();
            w.declaration()?
                .start("Relationships", &[("xmlns", NS_PACKAGE_RELATIONSHIPS)])?
                .empty("Relationship", &attrs)?
                .end("Relationships")?;
            w.into_string()?
        }
    };

    log::debug!("{rels_part}: added {id} -> {target}");
    parts.insert(&rels_part, updated);
    Ok(id)
}
