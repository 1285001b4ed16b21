//! Namespace URIs used by slicer markup

/// SpreadsheetML main namespace
pub const SPREADSHEET_ML: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
/// Office 2010 spreadsheet extensions (`x14`)
pub const X14: &str = "http://schemas.microsoft.com/office/spreadsheetml/2009/9/main";
/// Office 2013 spreadsheet extensions (`x15`)
pub const X15: &str = "http://schemas.microsoft.com/office/spreadsheetml/2010/11/main";
/// Revision 10 (`xr10`)
pub const XR10: &str = "http://schemas.microsoft.com/office/spreadsheetml/2016/revision10";
/// Markup compatibility (`mc`)
pub const MC: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";
/// Office document relationships (`r`)
pub const RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
/// Spreadsheet drawing (`xdr`)
pub const XDR: &str = "http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing";
/// DrawingML main (`a`)
pub const A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
/// Slicer graphic data (`sle`)
pub const SLE: &str = "http://schemas.microsoft.com/office/drawing/2010/slicer";
/// Table slicer drawing capability (`sle15`)
pub const SLE15: &str = "http://schemas.microsoft.com/office/drawing/2012/slicer";
