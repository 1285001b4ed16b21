//! Workbook part: sheet table and defined names

use crate::error::{PackageError, PackageResult};
use crate::package::PartMap;
use crate::relationships::{rel_types, relationships, target_part};
use crate::path::resolve_target;
use crate::xml::{self, ElementSpan, FragmentWriter};

/// Fallback location of the workbook part
pub const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// `CT_Workbook` children that follow `definedNames`
const DEFINED_NAMES_SUCCESSORS: &[&str] = &[
    "calcPr",
    "oleSize",
    "customWorkbookViews",
    "pivotCaches",
    "smartTagPr",
    "smartTagTypes",
    "webPublishing",
    "fileRecoveryPr",
    "webPublishObjects",
    "extLst",
];

/// One `<sheet>` entry of the workbook, resolved to its part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntry {
    /// Sheet name as shown on the tab
    pub name: String,
    /// `sheetId` attribute
    pub sheet_id: u32,
    /// Workbook relationship id of the sheet part
    pub rel_id: String,
    /// Resolved part name (`xl/worksheets/sheet1.xml`)
    pub part: String,
    /// 0-based position in the sheet list (the `localSheetId` of sheet-scoped names)
    pub index: usize,
}

/// A `<definedName>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedName {
    pub name: String,
    /// Formula text the name refers to
    pub refers_to: String,
    /// `None` for workbook scope
    pub local_sheet_id: Option<u32>,
    pub hidden: bool,
}

impl DefinedName {
    /// Create a workbook-scoped name
    pub fn workbook_scope(name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            refers_to: refers_to.into(),
            local_sheet_id: None,
            hidden: false,
        }
    }

    /// Whether the name is visible from every sheet
    pub fn is_workbook_scope(&self) -> bool {
        self.local_sheet_id.is_none()
    }
}

/// Locate the workbook part through the package root relationships.
pub fn workbook_part(parts: &PartMap) -> PackageResult<String> {
    let office_document = relationships(parts, "")?
        .into_iter()
        .find(|rel| rel.type_uri == rel_types::OFFICE_DOCUMENT)
        .map(|rel| resolve_target("", &rel.target));

    match office_document {
        Some(part) if parts.contains(&part) => Ok(part),
        _ if parts.contains(DEFAULT_WORKBOOK_PART) => Ok(DEFAULT_WORKBOOK_PART.to_string()),
        _ => Err(PackageError::MissingPart(DEFAULT_WORKBOOK_PART.to_string())),
    }
}

/// All sheets listed in the workbook, in tab order.
///
/// Entries whose relationship cannot be resolved are skipped.
pub fn sheets(parts: &PartMap) -> PackageResult<Vec<SheetEntry>> {
    let workbook = workbook_part(parts)?;
    let xml = parts.require_str(&workbook)?;
    let root = xml::root_element(xml)?;
    let Some(sheets) = xml::find_child(xml, &root, "sheets")? else {
        return Ok(Vec::new());
    };

    let mut entries = Vec::new();
    for (index, sheet) in xml::child_elements(xml, &sheets)?
        .iter()
        .filter(|el| el.local_name() == "sheet")
        .enumerate()
    {
        let attrs = sheet.attributes(xml)?;
        let mut name = None;
        let mut sheet_id = 0;
        let mut rel_id = None;
        for (key, value) in attrs {
            match (xml::prefix(&key), xml::local_name(&key)) {
                (None, "name") => name = Some(value),
                (None, "sheetId") => sheet_id = value.parse().unwrap_or(0),
                (Some(_), "id") => rel_id = Some(value),
                _ => {}
            }
        }
        let (Some(name), Some(rel_id)) = (name, rel_id) else {
            continue;
        };
        match target_part(parts, &workbook, &rel_id)? {
            Some(part) => entries.push(SheetEntry {
                name,
                sheet_id,
                rel_id,
                part,
                index,
            }),
            None => log::warn!("sheet {name} has no resolvable relationship {rel_id}"),
        }
    }
    Ok(entries)
}

/// Find a sheet by name (case-insensitive, as Excel compares sheet names).
pub fn find_sheet(parts: &PartMap, name: &str) -> PackageResult<SheetEntry> {
    sheets(parts)?
        .into_iter()
        .find(|sheet| sheet.name.to_lowercase() == name.to_lowercase())
        .ok_or_else(|| PackageError::SheetNotFound(name.to_string()))
}

/// All defined names of the workbook
pub fn defined_names(parts: &PartMap) -> PackageResult<Vec<DefinedName>> {
    let workbook = workbook_part(parts)?;
    let xml = parts.require_str(&workbook)?;
    let root = xml::root_element(xml)?;
    let Some(container) = xml::find_child(xml, &root, "definedNames")? else {
        return Ok(Vec::new());
    };

    let mut names = Vec::new();
    for el in xml::child_elements(xml, &container)?
        .iter()
        .filter(|el| el.local_name() == "definedName")
    {
        names.push(parse_defined_name(xml, el)?);
    }
    Ok(names)
}

/// Names of all workbook-scoped defined names
pub fn workbook_scoped_names(parts: &PartMap) -> PackageResult<Vec<String>> {
    Ok(defined_names(parts)?
        .into_iter()
        .filter(DefinedName::is_workbook_scope)
        .map(|dn| dn.name)
        .collect())
}

/// Append a defined name, creating `<definedNames>` in schema order if needed.
pub fn add_defined_name(parts: &mut PartMap, defined_name: &DefinedName) -> PackageResult<()> {
    let workbook = workbook_part(parts)?;
    let xml = parts.require_str(&workbook)?;
    let root = xml::root_element(xml)?;
    let prefix = root.prefix();

    let local_sheet_id = defined_name.local_sheet_id.map(|id| id.to_string());
    let mut attrs = vec![("name", defined_name.name.as_str())];
    if let Some(id) = &local_sheet_id {
        attrs.push(("localSheetId", id.as_str()));
    }
    if defined_name.hidden {
        attrs.push(("hidden", "1"));
    }
    let element_name = xml::qualify(prefix, "definedName");
    let mut entry = FragmentWriter::new();
    entry.text_element(&element_name, &attrs, &defined_name.refers_to)?;
    let entry = entry.into_string()?;

    let updated = match xml::find_child(xml, &root, "definedNames")? {
        Some(container) => xml::append_child(xml, &container, &entry),
        None => {
            let container_name = xml::qualify(prefix, "definedNames");
            let mut container = FragmentWriter::new();
            container
                .start(&container_name, &[])?
                .raw(&entry)?
                .end(&container_name)?;
            xml::insert_child_before(
                xml,
                &root,
                &container.into_string()?,
                DEFINED_NAMES_SUCCESSORS,
            )?
        }
    };

    log::debug!("added defined name {}", defined_name.name);
    parts.insert(&workbook, updated);
    Ok(())
}

fn parse_defined_name(xml: &str, el: &ElementSpan) -> PackageResult<DefinedName> {
    let mut name = String::new();
    let mut local_sheet_id = None;
    let mut hidden = false;
    for (key, value) in el.attributes(xml)? {
        match key.as_str() {
            "name" => name = value,
            "localSheetId" => local_sheet_id = value.parse().ok(),
            "hidden" => hidden = value == "1" || value == "true",
            _ => {}
        }
    }
    Ok(DefinedName {
        name,
        refers_to: el.text(xml)?,
        local_sheet_id,
        hidden,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

    const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="/xl/worksheets/sheet2.xml"/></Relationships>"#;

    fn parts(workbook: &str) -> PartMap {
        [
            ("_rels/.rels", ROOT_RELS),
            ("xl/workbook.xml", workbook),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
        ]
        .into_iter()
        .collect()
    }

    const WORKBOOK: &str = r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Data" sheetId="1" r:id="rId1"/><sheet name="Summary" sheetId="4" r:id="rId2"/></sheets><calcPr calcId="191029"/></workbook>"#;

    #[test]
    fn test_sheets_resolve_parts() {
        let parts = parts(WORKBOOK);
        let sheets = sheets(&parts).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].part, "xl/worksheets/sheet1.xml");
        assert_eq!(sheets[1].part, "xl/worksheets/sheet2.xml");
        assert_eq!(sheets[1].sheet_id, 4);
        assert_eq!(sheets[1].index, 1);
    }

    #[test]
    fn test_find_sheet_is_case_insensitive() {
        let parts = parts(WORKBOOK);
        assert_eq!(find_sheet(&parts, "summary").unwrap().rel_id, "rId2");
        assert!(matches!(
            find_sheet(&parts, "Missing"),
            Err(PackageError::SheetNotFound(name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_add_defined_name_creates_container_before_calc_pr() {
        let mut parts = parts(WORKBOOK);
        add_defined_name(&mut parts, &DefinedName::workbook_scope("Slicer_Region", "#N/A")).unwrap();
        let xml = parts.get_str("xl/workbook.xml").unwrap().unwrap();
        assert!(xml.contains(
            r#"</sheets><definedNames><definedName name="Slicer_Region">#N/A</definedName></definedNames><calcPr"#
        ));
        assert_eq!(workbook_scoped_names(&parts).unwrap(), vec!["Slicer_Region".to_string()]);
    }

    #[test]
    fn test_add_defined_name_appends_to_container() {
        let workbook = WORKBOOK.replace(
            "</sheets>",
            r#"</sheets><definedNames><definedName name="Local" localSheetId="0">Data!$A$1</definedName></definedNames>"#,
        );
        let mut parts = parts(&workbook);
        add_defined_name(&mut parts, &DefinedName::workbook_scope("Total", "Data!$B$2")).unwrap();

        let names = defined_names(&parts).unwrap();
        assert_eq!(names.len(), 2);
        assert_eq!(names[0].local_sheet_id, Some(0));
        assert_eq!(names[1].refers_to, "Data!$B$2");
        assert_eq!(workbook_scoped_names(&parts).unwrap(), vec!["Total".to_string()]);
    }
}
