//! Package error types

use thiserror::Error;

/// Result type for package operations
pub type PackageResult<T> = std::result::Result<T, PackageError>;

/// Errors that can occur while reading, patching or writing a package
#[derive(Debug, Error)]
pub enum PackageError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Malformed XML attribute
    #[error("XML attribute error: {0}")]
    XmlAttribute(#[from] quick_xml::events::attributes::AttrError),

    /// Part content is not UTF-8
    #[error("Part {0} is not valid UTF-8")]
    NonUtf8Part(String),

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// Invalid package or part structure
    #[error("Invalid package format: {0}")]
    InvalidFormat(String),

    /// Sheet not found by name
    #[error("Sheet not found: {0}")]
    SheetNotFound(String),
}
