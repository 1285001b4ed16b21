//! Slicer source lookup: which table and which column

use duke_sheets_package::relationships::{relationships, rel_types};
use duke_sheets_package::path::resolve_target;
use duke_sheets_package::xml;
use duke_sheets_package::{PartMap, SheetEntry, TargetMode};

use crate::error::{SlicerError, SlicerResult};
use crate::options::SlicerOptions;

/// Table metadata needed to bind a slicer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    /// `table/@id`, unique across the workbook
    pub id: u32,
    pub name: String,
    pub display_name: String,
    /// `table/@ref`, e.g. `A1:C5`
    pub range: String,
    /// Part holding the table definition
    pub part: String,
}

/// Source of table metadata for a sheet.
///
/// The default [`PackageTables`] reads table parts from the package; other
/// implementations can supply the same information from a workbook model.
pub trait TableCatalog {
    /// All tables on a sheet
    fn tables(&self, parts: &PartMap, sheet: &SheetEntry) -> SlicerResult<Vec<TableInfo>>;

    /// Column names of a table, in column order
    fn field_order(&self, parts: &PartMap, table: &TableInfo) -> SlicerResult<Vec<String>>;
}

/// Reads tables through the worksheet's table relationships
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageTables;

impl TableCatalog for PackageTables {
    fn tables(&self, parts: &PartMap, sheet: &SheetEntry) -> SlicerResult<Vec<TableInfo>> {
        let mut tables = Vec::new();
        for rel in relationships(parts, &sheet.part)? {
            if rel.type_uri != rel_types::TABLE || rel.target_mode == TargetMode::External {
                continue;
            }
            let part = resolve_target(&sheet.part, &rel.target);
            let Some(xml) = parts.get_str(&part)? else {
                log::warn!("{}: table relationship {} points at missing {part}", sheet.name, rel.id);
                continue;
            };
            let root = xml::root_element(xml)?;
            let mut table = TableInfo {
                id: 0,
                name: String::new(),
                display_name: String::new(),
                range: String::new(),
                part,
            };
            for (key, value) in root.attributes(xml)? {
                match key.as_str() {
                    "id" => table.id = value.parse().unwrap_or(0),
                    "name" => table.name = value,
                    "displayName" => table.display_name = value,
                    "ref" => table.range = value,
                    _ => {}
                }
            }
            tables.push(table);
        }
        Ok(tables)
    }

    fn field_order(&self, parts: &PartMap, table: &TableInfo) -> SlicerResult<Vec<String>> {
        let xml = parts.require_str(&table.part)?;
        Ok(xml::elements_named(xml, "tableColumn")?
            .into_iter()
            .filter_map(|attrs| {
                attrs
                    .into_iter()
                    .find(|(key, _)| key == "name")
                    .map(|(_, name)| name)
            })
            .collect())
    }
}

/// Table and column a slicer filters on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub table: TableInfo,
    /// 0-based position of the field in the table's column order
    pub column_index: usize,
}

impl ResolvedSource {
    /// 1-based column number as stored in the cache definition
    pub fn cache_column(&self) -> u32 {
        self.column_index as u32 + 1
    }
}

/// Find the table named by `opts.table` on `sheet` and the column named by `opts.name`.
///
/// The field name must match exactly, including case.
pub fn resolve_source<C: TableCatalog + ?Sized>(
    catalog: &C,
    parts: &PartMap,
    sheet: &SheetEntry,
    opts: &SlicerOptions,
) -> SlicerResult<ResolvedSource> {
    let table = catalog
        .tables(parts, sheet)?
        .into_iter()
        .find(|table| table.name == opts.table || table.display_name == opts.table)
        .ok_or_else(|| SlicerError::SourceNotFound(opts.table.clone()))?;

    let column_index = catalog
        .field_order(parts, &table)?
        .iter()
        .position(|field| *field == opts.name)
        .ok_or_else(|| SlicerError::FieldNotFound {
            field: opts.name.clone(),
            table: opts.table.clone(),
        })?;

    log::debug!(
        "slicer source: table {} (id {}), column {}",
        table.name,
        table.id,
        column_index + 1
    );
    Ok(ResolvedSource {
        table,
        column_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SHEET_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/table" Target="../tables/table3.xml"/></Relationships>"#;
    const TABLE: &str = r#"<table xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" id="3" name="Sales" displayName="SalesTable" ref="A1:C4"><autoFilter ref="A1:C4"/><tableColumns count="3"><tableColumn id="1" name="Region"/><tableColumn id="2" name="Rep"/><tableColumn id="3" name="Amount"/></tableColumns></table>"#;

    fn fixture() -> (PartMap, SheetEntry) {
        let parts = [
            ("xl/worksheets/_rels/sheet1.xml.rels", SHEET_RELS),
            ("xl/tables/table3.xml", TABLE),
        ]
        .into_iter()
        .collect();
        let sheet = SheetEntry {
            name: "Data".into(),
            sheet_id: 1,
            rel_id: "rId1".into(),
            part: "xl/worksheets/sheet1.xml".into(),
            index: 0,
        };
        (parts, sheet)
    }

    #[test]
    fn test_package_tables() {
        let (parts, sheet) = fixture();
        let tables = PackageTables.tables(&parts, &sheet).unwrap();
        assert_eq!(
            tables,
            vec![TableInfo {
                id: 3,
                name: "Sales".into(),
                display_name: "SalesTable".into(),
                range: "A1:C4".into(),
                part: "xl/tables/table3.xml".into(),
            }]
        );
        assert_eq!(
            PackageTables.field_order(&parts, &tables[0]).unwrap(),
            vec!["Region", "Rep", "Amount"]
        );
    }

    #[test]
    fn test_resolve_by_display_name() {
        let (parts, sheet) = fixture();
        let source = resolve_source(
            &PackageTables,
            &parts,
            &sheet,
            &SlicerOptions::new("Amount", "SalesTable", "E1"),
        )
        .unwrap();
        assert_eq!(source.table.id, 3);
        assert_eq!(source.column_index, 2);
        assert_eq!(source.cache_column(), 3);
    }

    #[test]
    fn test_unknown_table() {
        let (parts, sheet) = fixture();
        let err = resolve_source(&PackageTables, &parts, &sheet, &SlicerOptions::new("Rep", "Nope", "E1"))
            .unwrap_err();
        assert!(matches!(err, SlicerError::SourceNotFound(name) if name == "Nope"));
    }

    #[test]
    fn test_field_match_is_case_sensitive() {
        let (parts, sheet) = fixture();
        let err = resolve_source(&PackageTables, &parts, &sheet, &SlicerOptions::new("rep", "Sales", "E1"))
            .unwrap_err();
        assert!(matches!(err, SlicerError::FieldNotFound { field, .. } if field == "rep"));
    }
}
