//! Slicer drawing anchors
//!
//! A slicer is drawn as one `xdr:twoCellAnchor` holding an
//! `mc:AlternateContent`: readers that understand table slicers (`sle15`)
//! take the `graphicFrame`, older readers show a text box explaining that the
//! slicer cannot be used.

use duke_sheets_package::content_types::{content_type, register_override};
use duke_sheets_package::path::relative_target;
use duke_sheets_package::relationships::{add_relationship, rel_types, target_part};
use duke_sheets_package::xml::{self, FragmentWriter};
use duke_sheets_package::{PartFamily, PartMap, SheetEntry, TargetMode};

use crate::cell::{CellRef, MAX_COLS, MAX_ROWS};
use crate::error::{SlicerError, SlicerResult};
use crate::ns;
use crate::options::{Positioning, SlicerOptions};

/// Default column width, in pixels
pub const DEFAULT_COL_WIDTH_PX: i64 = 64;
/// Default row height, in pixels
pub const DEFAULT_ROW_HEIGHT_PX: i64 = 20;
/// EMU per pixel at 96 dpi
pub const EMU_PER_PX: i64 = 9525;
/// Width of a sheet of default-width columns, in pixels
pub const MAX_SHEET_WIDTH_PX: i64 = MAX_COLS as i64 * DEFAULT_COL_WIDTH_PX;
/// Height of a sheet of default-height rows, in pixels
pub const MAX_SHEET_HEIGHT_PX: i64 = MAX_ROWS as i64 * DEFAULT_ROW_HEIGHT_PX;

const FALLBACK_OFFSET: (i64, i64) = (2_914_650, 152_400);
const FALLBACK_EXTENT: (i64, i64) = (1_828_800, 2_238_375);
const FALLBACK_TEXT: [&str; 2] = [
    "This shape represents a table slicer. Table slicers are not supported in this version of Excel.",
    "If the shape was modified in an earlier version of Excel, or if the workbook was saved in Excel 2007 or earlier, the slicer can't be used.",
];

/// `CT_Worksheet` children that follow `drawing`
const DRAWING_SUCCESSORS: &[&str] = &[
    "legacyDrawing",
    "legacyDrawingHF",
    "drawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

/// The drawing part of a sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingSlot {
    pub part: String,
    pub reused: bool,
}

/// Drawing part referenced by the sheet's `<drawing r:id>`, if it resolves.
pub fn existing_drawing(parts: &PartMap, sheet: &SheetEntry) -> SlicerResult<Option<String>> {
    let sheet_xml = parts.require_str(&sheet.part)?;
    let root = xml::root_element(sheet_xml)?;
    let Some(drawing) = xml::find_child(sheet_xml, &root, "drawing")? else {
        return Ok(None);
    };
    let rel_id = drawing
        .attributes(sheet_xml)?
        .into_iter()
        .find(|(key, _)| xml::prefix(key).is_some() && xml::local_name(key) == "id")
        .map(|(_, value)| value);
    match rel_id {
        Some(id) => Ok(target_part(parts, &sheet.part, &id)?),
        None => Ok(None),
    }
}

/// Use the sheet's drawing, or create one and reference it from the sheet.
pub fn prepare_drawing(parts: &mut PartMap, sheet: &SheetEntry) -> SlicerResult<DrawingSlot> {
    if let Some(part) = existing_drawing(parts, sheet)? {
        if !parts.contains(&part) {
            parts.insert(&part, empty_drawing()?);
            register_override(parts, &part, content_type::DRAWING)?;
        }
        log::debug!("{}: reusing drawing {part}", sheet.name);
        return Ok(DrawingSlot { part, reused: true });
    }

    let part = PartFamily::DRAWING.part_name(PartFamily::DRAWING.next_index(parts));
    let rel_id = add_relationship(
        parts,
        &sheet.part,
        rel_types::DRAWING,
        &relative_target(&sheet.part, &part),
        TargetMode::Internal,
    )?;

    let sheet_xml = parts.require_str(&sheet.part)?;
    let root = xml::root_element(sheet_xml)?;
    let mut element = FragmentWriter::new();
    element.empty(&xml::qualify(root.prefix(), "drawing"), &[("r:id", rel_id.as_str())])?;
    let updated = xml::insert_child_before(sheet_xml, &root, &element.into_string()?, DRAWING_SUCCESSORS)?;
    let updated = xml::ensure_namespace(&updated, "r", ns::RELATIONSHIPS)?;
    parts.insert(&sheet.part, updated);

    parts.insert(&part, empty_drawing()?);
    register_override(parts, &part, content_type::DRAWING)?;

    log::debug!("{}: created drawing {part} as {rel_id}", sheet.name);
    Ok(DrawingSlot {
        part,
        reused: false,
    })
}

fn empty_drawing() -> SlicerResult<String> {
    let mut w = FragmentWriter::new();
    w.declaration()?
        .start("xdr:wsDr", &[("xmlns:xdr", ns::XDR), ("xmlns:a", ns::A)])?
        .end("xdr:wsDr")?;
    Ok(w.into_string()?)
}

/// Next free shape id in a drawing: one past the largest `cNvPr/@id`, at least 2.
pub fn next_shape_id(drawing_xml: &str) -> SlicerResult<u32> {
    let max = xml::elements_named(drawing_xml, "cNvPr")?
        .into_iter()
        .flatten()
        .filter(|(key, _)| key == "id")
        .filter_map(|(_, value)| value.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    let next = max
        .checked_add(1)
        .ok_or_else(|| SlicerError::encode("shape id", format!("drawing already uses id {max}")))?;
    Ok(next.max(2))
}

/// Scaled size in pixels, or `None` when it is not finite or exceeds `limit`.
pub(crate) fn scaled_px(size: u32, scale: f64, limit: i64) -> Option<i64> {
    let px = (f64::from(size) * scale).round();
    (px.is_finite() && px >= 0.0 && px <= limit as f64).then_some(px as i64)
}

/// One corner of an anchor: cell plus offset in EMU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorPoint {
    pub col: u32,
    pub col_off: i64,
    pub row: u32,
    pub row_off: i64,
}

impl AnchorPoint {
    fn from_pixels(x: i64, y: i64) -> Self {
        Self {
            col: (x / DEFAULT_COL_WIDTH_PX) as u32,
            col_off: (x % DEFAULT_COL_WIDTH_PX) * EMU_PER_PX,
            row: (y / DEFAULT_ROW_HEIGHT_PX) as u32,
            row_off: (y % DEFAULT_ROW_HEIGHT_PX) * EMU_PER_PX,
        }
    }
}

/// Placement of the slicer shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TwoCellAnchor {
    pub from: AnchorPoint,
    pub to: AnchorPoint,
    pub edit_as: Positioning,
}

impl TwoCellAnchor {
    /// Anchor for a shape at `cell` with the size and offsets in `opts`.
    ///
    /// Columns and rows are assumed to have the default size. A shape that
    /// would end past the last column or row is rejected.
    pub fn compute(cell: CellRef, opts: &SlicerOptions) -> SlicerResult<Self> {
        let format = &opts.format;
        let out_of_sheet = || {
            SlicerError::InvalidOptions(format!(
                "slicer at {} does not fit on the sheet",
                opts.cell
            ))
        };
        let x = (i64::from(cell.col) * DEFAULT_COL_WIDTH_PX + i64::from(format.offset_x)).max(0);
        let y = (i64::from(cell.row) * DEFAULT_ROW_HEIGHT_PX + i64::from(format.offset_y)).max(0);
        let width = scaled_px(opts.width, format.scale_x, MAX_SHEET_WIDTH_PX).ok_or_else(out_of_sheet)?;
        let height = scaled_px(opts.height, format.scale_y, MAX_SHEET_HEIGHT_PX).ok_or_else(out_of_sheet)?;

        let to_x = x.checked_add(width).ok_or_else(out_of_sheet)?;
        let to_y = y.checked_add(height).ok_or_else(out_of_sheet)?;
        if to_x >= MAX_SHEET_WIDTH_PX || to_y >= MAX_SHEET_HEIGHT_PX {
            return Err(out_of_sheet());
        }

        Ok(Self {
            from: AnchorPoint::from_pixels(x, y),
            to: AnchorPoint::from_pixels(to_x, to_y),
            edit_as: format.positioning.unwrap_or_default(),
        })
    }
}

/// A slicer shape placed in a drawing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedShape {
    pub drawing_part: String,
    pub shape_id: u32,
    /// `"{field} {shape_id}"`
    pub name: String,
}

/// Add a slicer shape for `opts` at `anchor` to the sheet's drawing.
pub fn add_slicer_shape(
    parts: &mut PartMap,
    sheet: &SheetEntry,
    opts: &SlicerOptions,
    anchor: &TwoCellAnchor,
) -> SlicerResult<PlacedShape> {
    let drawing = prepare_drawing(parts, sheet)?;
    let drawing_xml = parts.require_str(&drawing.part)?;
    let root = xml::root_element(drawing_xml)?;

    let shape_id = next_shape_id(drawing_xml)?;
    let name = format!("{} {}", opts.name, shape_id);
    let markup = AnchorWriter::new(root.prefix()).write(anchor, shape_id, &name, opts)?;

    let updated = xml::append_child(drawing_xml, &root, &markup);
    let updated = xml::ensure_namespace(&updated, "a", ns::A)?;
    parts.insert(&drawing.part, updated);

    log::debug!("{}: slicer shape {shape_id} in {}", sheet.name, drawing.part);
    Ok(PlacedShape {
        drawing_part: drawing.part,
        shape_id,
        name,
    })
}

/// Writes the anchor markup using the drawing's own prefix for `xdr`.
struct AnchorWriter<'a> {
    xdr: Option<&'a str>,
    w: FragmentWriter,
}

impl<'a> AnchorWriter<'a> {
    fn new(xdr: Option<&'a str>) -> Self {
        Self {
            xdr,
            w: FragmentWriter::new(),
        }
    }

    fn tag(&self, local: &str) -> String {
        xml::qualify(self.xdr, local)
    }

    fn write(
        mut self,
        anchor: &TwoCellAnchor,
        shape_id: u32,
        name: &str,
        opts: &SlicerOptions,
    ) -> SlicerResult<String> {
        let anchor_tag = self.tag("twoCellAnchor");
        self.w.start(&anchor_tag, &[("editAs", anchor.edit_as.as_str())])?;
        self.point("from", &anchor.from)?;
        self.point("to", &anchor.to)?;

        self.w
            .start("mc:AlternateContent", &[("xmlns:mc", ns::MC)])?
            .start("mc:Choice", &[("xmlns:sle15", ns::SLE15), ("Requires", "sle15")])?;
        self.graphic_frame(shape_id, name)?;
        self.w.end("mc:Choice")?.start("mc:Fallback", &[])?;
        self.fallback_shape(shape_id, name, opts)?;
        self.w.end("mc:Fallback")?.end("mc:AlternateContent")?;

        let locks = flag(opts.locks_with_sheet());
        let prints = flag(opts.prints_with_sheet());
        let client_data = self.tag("clientData");
        self.w
            .empty(&client_data, &[("fLocksWithSheet", locks), ("fPrintsWithSheet", prints)])?
            .end(&anchor_tag)?;
        Ok(self.w.into_string()?)
    }

    fn point(&mut self, local: &str, point: &AnchorPoint) -> SlicerResult<()> {
        let tag = self.tag(local);
        self.w.start(&tag, &[])?;
        for (child, value) in [
            ("col", i64::from(point.col)),
            ("colOff", point.col_off),
            ("row", i64::from(point.row)),
            ("rowOff", point.row_off),
        ] {
            let child = self.tag(child);
            self.w.text_element(&child, &[], &value.to_string())?;
        }
        self.w.end(&tag)?;
        Ok(())
    }

    fn graphic_frame(&mut self, shape_id: u32, name: &str) -> SlicerResult<()> {
        let id = shape_id.to_string();
        let frame = self.tag("graphicFrame");
        let nv = self.tag("nvGraphicFramePr");
        let xfrm = self.tag("xfrm");
        let c_nv_pr = self.tag("cNvPr");
        let c_nv_frame = self.tag("cNvGraphicFramePr");

        self.w
            .start(&frame, &[("macro", "")])?
            .start(&nv, &[])?
            .empty(&c_nv_pr, &[("id", id.as_str()), ("name", name)])?
            .empty(&c_nv_frame, &[])?
            .end(&nv)?
            .start(&xfrm, &[])?
            .empty("a:off", &[("x", "0"), ("y", "0")])?
            .empty("a:ext", &[("cx", "0"), ("cy", "0")])?
            .end(&xfrm)?
            .start("a:graphic", &[])?
            .start("a:graphicData", &[("uri", ns::SLE)])?
            .empty("sle:slicer", &[("xmlns:sle", ns::SLE), ("name", name)])?
            .end("a:graphicData")?
            .end("a:graphic")?
            .end(&frame)?;
        Ok(())
    }

    fn fallback_shape(&mut self, shape_id: u32, name: &str, opts: &SlicerOptions) -> SlicerResult<()> {
        let id = shape_id.to_string();
        let (off_x, off_y) = (FALLBACK_OFFSET.0.to_string(), FALLBACK_OFFSET.1.to_string());
        let (cx, cy) = (FALLBACK_EXTENT.0.to_string(), FALLBACK_EXTENT.1.to_string());
        let sp = self.tag("sp");
        let nv = self.tag("nvSpPr");
        let c_nv_pr = self.tag("cNvPr");
        let c_nv_sp = self.tag("cNvSpPr");
        let sp_pr = self.tag("spPr");
        let tx_body = self.tag("txBody");

        let mut c_nv_pr_attrs = vec![("id", id.as_str()), ("name", name)];
        if let Some(alt_text) = &opts.format.alt_text {
            c_nv_pr_attrs.push(("descr", alt_text.as_str()));
        }

        self.w
            .start(&sp, &[("macro", opts.macro_name.as_deref().unwrap_or("")), ("textlink", "")])?
            .start(&nv, &[])?
            .empty(&c_nv_pr, &c_nv_pr_attrs)?
            .start(&c_nv_sp, &[("txBox", "1")])?
            .empty("a:spLocks", &[("noTextEdit", "1")])?
            .end(&c_nv_sp)?
            .end(&nv)?;

        self.w
            .start(&sp_pr, &[])?
            .start("a:xfrm", &[])?
            .empty("a:off", &[("x", off_x.as_str()), ("y", off_y.as_str())])?
            .empty("a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())])?
            .end("a:xfrm")?
            .start("a:prstGeom", &[("prst", "rect")])?
            .empty("a:avLst", &[])?
            .end("a:prstGeom")?
            .start("a:solidFill", &[])?
            .empty("a:prstClr", &[("val", "white")])?
            .end("a:solidFill")?
            .start("a:ln", &[("w", "1")])?
            .start("a:solidFill", &[])?
            .empty("a:prstClr", &[("val", "black")])?
            .end("a:solidFill")?
            .end("a:ln")?
            .end(&sp_pr)?;

        self.w
            .start(&tx_body, &[])?
            .empty("a:bodyPr", &[("vertOverflow", "clip"), ("horzOverflow", "clip")])?
            .empty("a:lstStyle", &[])?;
        for text in FALLBACK_TEXT {
            self.w
                .start("a:p", &[])?
                .start("a:r", &[])?
                .empty("a:rPr", &[("lang", "en-US"), ("sz", "1100")])?
                .text_element("a:t", &[], text)?
                .end("a:r")?
                .end("a:p")?;
        }
        self.w.end(&tx_body)?.end(&sp)?;
        Ok(())
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TYPES: &str = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"></Types>"#;
    const SHEET: &str = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/><tableParts count="1"><tablePart r:id="rId1"/></tableParts></worksheet>"#;

    fn sheet() -> SheetEntry {
        SheetEntry {
            name: "Data".into(),
            sheet_id: 1,
            rel_id: "rId1".into(),
            part: "xl/worksheets/sheet1.xml".into(),
            index: 0,
        }
    }

    fn validated(mut opts: SlicerOptions) -> SlicerOptions {
        opts.format.scale_x = 1.0;
        opts.format.scale_y = 1.0;
        opts.width = 200;
        opts.height = 200;
        opts
    }

    fn anchor_at(cell: &str, opts: &SlicerOptions) -> TwoCellAnchor {
        TwoCellAnchor::compute(CellRef::parse(cell).unwrap(), opts).unwrap()
    }

    #[test]
    fn test_next_shape_id_exhausted() {
        let drawing = r#"<xdr:wsDr><xdr:sp><xdr:nvSpPr><xdr:cNvPr id="4294967295" name="Last"/></xdr:nvSpPr></xdr:sp></xdr:wsDr>"#;
        assert!(matches!(next_shape_id(drawing), Err(SlicerError::Encode { .. })));
    }

    #[test]
    fn test_anchor_rejects_oversized_shapes() {
        let mut opts = validated(SlicerOptions::new("Region", "Sales", "E1"));
        opts.format.scale_x = 1e300;
        let cell = CellRef::parse("E1").unwrap();
        assert!(matches!(
            TwoCellAnchor::compute(cell, &opts),
            Err(SlicerError::InvalidOptions(_))
        ));

        let opts = validated(SlicerOptions::new("Region", "Sales", "XFD1"));
        let cell = CellRef::parse("XFD1").unwrap();
        assert!(matches!(
            TwoCellAnchor::compute(cell, &opts),
            Err(SlicerError::InvalidOptions(_))
        ));

        let mut opts = validated(SlicerOptions::new("Region", "Sales", "A1"));
        opts.format.offset_y = i32::MAX;
        assert!(TwoCellAnchor::compute(CellRef::parse("A1").unwrap(), &opts).is_err());
    }

    #[test]
    fn test_next_shape_id() {
        assert_eq!(next_shape_id("<xdr:wsDr/>").unwrap(), 2);
        let drawing = r#"<xdr:wsDr><xdr:twoCellAnchor><xdr:pic><xdr:nvPicPr><xdr:cNvPr id="5" name="Picture 4"/></xdr:nvPicPr></xdr:pic></xdr:twoCellAnchor><xdr:sp><xdr:nvSpPr><xdr:cNvPr id="3" name="x"/></xdr:nvSpPr></xdr:sp></xdr:wsDr>"#;
        assert_eq!(next_shape_id(drawing).unwrap(), 6);
    }

    #[test]
    fn test_anchor_geometry() {
        let opts = validated(SlicerOptions::new("Region", "Sales", "E1"));
        let anchor = TwoCellAnchor::compute(CellRef::parse("E1").unwrap(), &opts).unwrap();
        assert_eq!(anchor.from, AnchorPoint { col: 4, col_off: 0, row: 0, row_off: 0 });
        // 4 * 64 + 200 = 456 px -> column 7, 8 px in; 200 px -> row 10
        assert_eq!(anchor.to, AnchorPoint { col: 7, col_off: 8 * EMU_PER_PX, row: 10, row_off: 0 });
        assert_eq!(anchor.edit_as, Positioning::OneCell);
    }

    #[test]
    fn test_anchor_offsets_and_scale() {
        let mut opts = validated(SlicerOptions::new("Region", "Sales", "B2"));
        opts.format.offset_x = 10;
        opts.format.offset_y = -30;
        opts.format.scale_x = 0.5;
        opts.format.positioning = Some(Positioning::Absolute);
        let anchor = TwoCellAnchor::compute(CellRef::parse("B2").unwrap(), &opts).unwrap();
        assert_eq!(anchor.from, AnchorPoint { col: 1, col_off: 10 * EMU_PER_PX, row: 0, row_off: 0 });
        assert_eq!(anchor.to, AnchorPoint { col: 2, col_off: 46 * EMU_PER_PX, row: 10, row_off: 0 });
        assert_eq!(anchor.edit_as.as_str(), "absolute");
    }

    #[test]
    fn test_prepare_drawing_creates_part_before_table_parts() {
        let mut parts: PartMap = [("[Content_Types].xml", TYPES), ("xl/worksheets/sheet1.xml", SHEET)]
            .into_iter()
            .collect();
        let slot = prepare_drawing(&mut parts, &sheet()).unwrap();
        assert_eq!(slot, DrawingSlot { part: "xl/drawings/drawing1.xml".into(), reused: false });

        let sheet_xml = parts.get_str("xl/worksheets/sheet1.xml").unwrap().unwrap();
        assert!(sheet_xml.contains(r#"<sheetData/><drawing r:id="rId1"/><tableParts"#));
        assert!(sheet_xml.contains(r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#));
        assert!(parts.contains("xl/drawings/drawing1.xml"));

        let again = prepare_drawing(&mut parts, &sheet()).unwrap();
        assert_eq!(again, DrawingSlot { part: "xl/drawings/drawing1.xml".into(), reused: true });
    }

    #[test]
    fn test_slicer_shape_markup() {
        let mut parts: PartMap = [("[Content_Types].xml", TYPES), ("xl/worksheets/sheet1.xml", SHEET)]
            .into_iter()
            .collect();
        let mut opts = validated(SlicerOptions::new("Region", "Sales", "E1"));
        opts.format.locked = Some(true);
        opts.format.print_object = Some(true);
        opts.macro_name = Some("Module1.OnSlicer".into());

        let placed = add_slicer_shape(&mut parts, &sheet(), &opts, &anchor_at("E1", &opts)).unwrap();
        assert_eq!(placed.shape_id, 2);
        assert_eq!(placed.name, "Region 2");

        let xml = parts.get_str(&placed.drawing_part).unwrap().unwrap();
        assert!(xml.contains(r#"<xdr:twoCellAnchor editAs="oneCell"><xdr:from><xdr:col>4</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>0</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>"#));
        assert!(xml.contains(r#"<mc:Choice xmlns:sle15="http://schemas.microsoft.com/office/drawing/2012/slicer" Requires="sle15"><xdr:graphicFrame macro=""><xdr:nvGraphicFramePr><xdr:cNvPr id="2" name="Region 2"/>"#));
        assert!(xml.contains(r#"<sle:slicer xmlns:sle="http://schemas.microsoft.com/office/drawing/2010/slicer" name="Region 2"/>"#));
        assert!(xml.contains(r#"<mc:Fallback><xdr:sp macro="Module1.OnSlicer" textlink="">"#));
        assert!(xml.contains(r#"<a:off x="2914650" y="152400"/><a:ext cx="1828800" cy="2238375"/>"#));
        assert!(xml.contains("<a:t>This shape represents a table slicer. Table slicers are not supported in this version of Excel.</a:t>"));
        assert!(xml.contains("<a:t>If the shape was modified in an earlier version of Excel, or if the workbook was saved in Excel 2007 or earlier, the slicer can"));
        assert!(xml.ends_with(r#"</mc:AlternateContent><xdr:clientData fLocksWithSheet="1" fPrintsWithSheet="1"/></xdr:twoCellAnchor></xdr:wsDr>"#));

        let second = add_slicer_shape(&mut parts, &sheet(), &opts, &anchor_at("H1", &opts)).unwrap();
        assert_eq!(second.drawing_part, placed.drawing_part);
        assert_eq!(second.shape_id, 3);
    }
}
