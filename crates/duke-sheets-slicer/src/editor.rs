//! Adding a table slicer end to end

use duke_sheets_package::relationships::{next_relationship_id, relationships};
use duke_sheets_package::workbook::{find_sheet, workbook_part};
use duke_sheets_package::{Package, PartMap, SheetEntry};

use crate::cache::find_or_create_cache;
use crate::cell::CellRef;
use crate::drawing::{add_slicer_shape, existing_drawing, next_shape_id, TwoCellAnchor};
use crate::error::SlicerResult;
use crate::ext_lst::{decode_host, DecodePolicy};
use crate::options::SlicerOptions;
use crate::sheet::{append_slicer, attach_slicer_part, SlicerDefinition, SLICER_ROW_HEIGHT};
use crate::source::{resolve_source, PackageTables, TableCatalog};

/// What [`SlicerEditor::add_slicer`] created or reused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedSlicer {
    /// Slicer display name (`"{field} {shape id}"`)
    pub name: String,
    pub cache_name: String,
    /// Whether an existing cache for the same table column was used
    pub cache_reused: bool,
    pub slicer_part: String,
    pub cache_part: String,
    pub drawing_part: String,
}

/// Adds table slicers to packages.
///
/// Table metadata comes from the catalog `C`, by default the table parts of
/// the package itself.
#[derive(Debug, Clone, Default)]
pub struct SlicerEditor<C: TableCatalog = PackageTables> {
    catalog: C,
}

impl SlicerEditor<PackageTables> {
    /// Editor reading tables from the package
    pub fn new() -> Self {
        Self {
            catalog: PackageTables,
        }
    }
}

impl<C: TableCatalog> SlicerEditor<C> {
    /// Editor with a custom table catalog
    pub fn with_catalog(catalog: C) -> Self {
        Self { catalog }
    }

    /// Add a slicer on `sheet` filtering `opts.table` by the column `opts.name`.
    ///
    /// The whole operation holds the package's write lock, so concurrent calls
    /// on one package never allocate the same part, relationship or name.
    /// Options, placement, sheet, table and column are checked before
    /// anything is written. A failure after that point leaves earlier writes in place.
    pub fn add_slicer(
        &self,
        package: &Package,
        sheet: &str,
        opts: impl Into<Option<SlicerOptions>>,
    ) -> SlicerResult<AddedSlicer> {
        let opts = SlicerOptions::validate(opts.into())?;
        package.edit(|parts| self.apply(parts, sheet, &opts))
    }

    /// Same as [`add_slicer`](Self::add_slicer) on a bare part map
    pub fn add_slicer_to_parts(
        &self,
        parts: &mut PartMap,
        sheet: &str,
        opts: impl Into<Option<SlicerOptions>>,
    ) -> SlicerResult<AddedSlicer> {
        let opts = SlicerOptions::validate(opts.into())?;
        self.apply(parts, sheet, &opts)
    }

    fn apply(&self, parts: &mut PartMap, sheet: &str, opts: &SlicerOptions) -> SlicerResult<AddedSlicer> {
        let cell = CellRef::parse(&opts.cell)?;
        let anchor = TwoCellAnchor::compute(cell, opts)?;
        let workbook = workbook_part(parts)?;
        check_host(parts, &workbook)?;
        let sheet = find_sheet(parts, sheet)?;
        let source = resolve_source(&self.catalog, parts, &sheet, opts)?;
        check_host(parts, &sheet.part)?;
        check_shape_id(parts, &sheet)?;
        for owner in [&workbook, &sheet.part] {
            next_relationship_id(&relationships(parts, owner)?)?;
        }

        let slot = attach_slicer_part(parts, &sheet)?;
        let cache = find_or_create_cache(parts, &source, opts)?;
        let shape = add_slicer_shape(parts, &sheet, opts, &anchor)?;

        append_slicer(
            parts,
            &slot.part,
            &SlicerDefinition {
                name: shape.name.clone(),
                cache: cache.name.clone(),
                caption: opts.caption.clone(),
                show_caption: opts.display_header,
                row_height: SLICER_ROW_HEIGHT,
            },
        )?;

        log::debug!(
            "{}: added slicer {} on {}[{}] using cache {}",
            sheet.name,
            shape.name,
            source.table.name,
            opts.name,
            cache.name
        );
        Ok(AddedSlicer {
            name: shape.name,
            cache_name: cache.name,
            cache_reused: cache.reused,
            slicer_part: slot.part,
            cache_part: cache.part,
            drawing_part: shape.drawing_part,
        })
    }
}

/// Decode the extension list of a part that will be rewritten, so a
/// malformed one fails the call before any part changes.
fn check_host(parts: &PartMap, part: &str) -> SlicerResult<()> {
    decode_host(parts.require_str(part)?, part, DecodePolicy::Required)?;
    Ok(())
}

/// Make sure the sheet's drawing still has a shape id to hand out.
fn check_shape_id(parts: &PartMap, sheet: &SheetEntry) -> SlicerResult<()> {
    if let Some(part) = existing_drawing(parts, sheet)? {
        if let Some(xml) = parts.get_str(&part)? {
            next_shape_id(xml)?;
        }
    }
    Ok(())
}

/// Add a slicer using tables read from the package.
///
/// ```no_run
/// use duke_sheets_package::Package;
/// use duke_sheets_slicer::{add_slicer, SlicerOptions};
///
/// let package = Package::open("report.xlsx")?;
/// let opts = SlicerOptions::new("Region", "Sales", "E1").with_caption("Region");
/// add_slicer(&package, "Sheet1", opts)?;
/// package.save("report.xlsx")?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn add_slicer(
    package: &Package,
    sheet: &str,
    opts: impl Into<Option<SlicerOptions>>,
) -> SlicerResult<AddedSlicer> {
    SlicerEditor::new().add_slicer(package, sheet, opts)
}
