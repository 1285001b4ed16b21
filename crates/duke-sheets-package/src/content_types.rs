//! `[Content_Types].xml` registry

use crate::error::PackageResult;
use crate::package::{PartMap, CONTENT_TYPES_PART};
use crate::xml::{self, FragmentWriter};

/// Content types of the parts this crate creates
pub mod content_type {
    pub const DRAWING: &str = "application/vnd.openxmlformats-officedocument.drawing+xml";
    pub const SLICER: &str = "application/vnd.ms-excel.slicer+xml";
    pub const SLICER_CACHE: &str = "application/vnd.ms-excel.slicerCache+xml";
    pub const TABLE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.table+xml";
}

/// `PartName` form of a part name (`/xl/slicers/slicer1.xml`)
pub fn part_uri(part: &str) -> String {
    format!("/{}", part.trim_start_matches('/'))
}

/// Content type registered by an `<Override>` for `part`.
///
/// Part names compare case-insensitively, as OPC requires.
pub fn override_for(parts: &PartMap, part: &str) -> PackageResult<Option<String>> {
    let xml = parts.require_str(CONTENT_TYPES_PART)?;
    let uri = part_uri(part);
    for attrs in xml::elements_named(xml, "Override")? {
        let mut name = None;
        let mut content_type = None;
        for (key, value) in attrs {
            match key.as_str() {
                "PartName" => name = Some(value),
                "ContentType" => content_type = Some(value),
                _ => {}
            }
        }
        if name.is_some_and(|name| name.eq_ignore_ascii_case(&uri)) {
            return Ok(content_type);
        }
    }
    Ok(None)
}

/// Register an `<Override>` for `part` unless one already exists.
///
/// Returns whether the registry changed.
pub fn register_override(
    parts: &mut PartMap,
    part: &str,
    content_type: &str,
) -> PackageResult<bool> {
    if override_for(parts, part)?.is_some() {
        return Ok(false);
    }

    let xml = parts.require_str(CONTENT_TYPES_PART)?;
    let root = xml::root_element(xml)?;
    let uri = part_uri(part);
    let mut entry = FragmentWriter::new();
    entry.empty(
        &xml::qualify(root.prefix(), "Override"),
        &[("PartName", uri.as_str()), ("ContentType", content_type)],
    )?;
    let updated = xml::append_child(xml, &root, &entry.into_string()?);

    log::debug!("registered content type {content_type} for {uri}");
    parts.insert(CONTENT_TYPES_PART, updated);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PackageError;

    const TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/tables/table1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.table+xml"/></Types>"#;

    fn parts() -> PartMap {
        [(CONTENT_TYPES_PART, TYPES)].into_iter().collect()
    }

    #[test]
    fn test_override_lookup_is_case_insensitive() {
        let parts = parts();
        assert_eq!(
            override_for(&parts, "xl/Tables/Table1.xml").unwrap().as_deref(),
            Some(content_type::TABLE)
        );
        assert_eq!(override_for(&parts, "xl/slicers/slicer1.xml").unwrap(), None);
    }

    #[test]
    fn test_register_override_is_idempotent() {
        let mut parts = parts();
        assert!(register_override(&mut parts, "xl/slicers/slicer1.xml", content_type::SLICER).unwrap());
        let once = parts.get_str(CONTENT_TYPES_PART).unwrap().unwrap().to_string();
        assert!(once.ends_with(
            r#"<Override PartName="/xl/slicers/slicer1.xml" ContentType="application/vnd.ms-excel.slicer+xml"/></Types>"#
        ));

        assert!(!register_override(&mut parts, "xl/slicers/slicer1.xml", content_type::SLICER).unwrap());
        assert_eq!(parts.get_str(CONTENT_TYPES_PART).unwrap().unwrap(), once);
    }

    #[test]
    fn test_register_override_requires_registry() {
        let mut parts = PartMap::new();
        assert!(matches!(
            register_override(&mut parts, "xl/drawings/drawing1.xml", content_type::DRAWING),
            Err(PackageError::MissingPart(_))
        ));
    }
}
