//! # duke-sheets-package
//!
//! Open Packaging Conventions plumbing for duke-sheets.
//!
//! Holds an opened XLSX file as a map of raw parts and provides the pieces
//! needed to patch it in place: relationship bookkeeping, the content-type
//! registry, numbered part allocation, workbook lookups and span-based XML
//! splicing. Parts that are not edited are written back byte for byte.

pub mod content_types;
pub mod error;
pub mod naming;
pub mod package;
pub mod path;
pub mod relationships;
pub mod workbook;
pub mod xml;

pub use content_types::{content_type, register_override};
pub use error::{PackageError, PackageResult};
pub use naming::PartFamily;
pub use package::{Package, PartMap, CONTENT_TYPES_PART};
pub use relationships::{add_relationship, rel_types, Relationship, TargetMode};
pub use workbook::{DefinedName, SheetEntry};
