//! # duke-sheets-slicer
//!
//! Table slicers for XLSX packages opened with `duke-sheets-package`.
//!
//! A slicer touches several parts at once: the worksheet (slicer list and
//! `<drawing>` reference), a slicer part, a package-wide slicer cache, the
//! workbook (relationships, cache list, defined name), the drawing and
//! `[Content_Types].xml`. [`add_slicer`] performs all of these edits as
//! in-place splices; every other part is left byte-identical.
//!
//! ```no_run
//! use duke_sheets_package::Package;
//! use duke_sheets_slicer::{SlicerEditor, SlicerOptions};
//!
//! let package = Package::open("sales.xlsx")?;
//! let editor = SlicerEditor::new();
//! let added = editor.add_slicer(&package, "Sheet1", SlicerOptions::new("Region", "Table1", "E1"))?;
//! println!("{} uses cache {}", added.name, added.cache_name);
//! package.save("sales.xlsx")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod cell;
pub mod drawing;
pub mod editor;
pub mod error;
pub mod ext_lst;
pub mod names;
pub mod ns;
pub mod options;
pub mod sheet;
pub mod source;

pub use editor::{add_slicer, AddedSlicer, SlicerEditor};
pub use error::{SlicerError, SlicerResult};
pub use ext_lst::{DecodePolicy, ExtensionBlock, ExtensionList};
pub use options::{GraphicOptions, Positioning, SlicerOptions};
pub use source::{PackageTables, ResolvedSource, TableCatalog, TableInfo};
