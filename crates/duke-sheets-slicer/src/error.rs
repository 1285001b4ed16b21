//! Slicer error types

use duke_sheets_package::PackageError;
use thiserror::Error;

/// Result type for slicer operations
pub type SlicerResult<T> = std::result::Result<T, SlicerError>;

/// Errors that can occur while adding a slicer
#[derive(Debug, Error)]
pub enum SlicerError {
    /// No options were supplied
    #[error("Slicer options are required")]
    MissingOptions,

    /// A required option is empty or a value is out of range
    #[error("Invalid slicer options: {0}")]
    InvalidOptions(String),

    /// The named table is not on the sheet
    #[error("Table {0} does not exist")]
    SourceNotFound(String),

    /// The named field is not a column of the table
    #[error("Field {field} is not a column of table {table}")]
    FieldNotFound { field: String, table: String },

    /// A pre-existing part could not be decoded where decoding is mandatory
    #[error("Failed to decode {what}: {reason}")]
    Decode { what: String, reason: String },

    /// Serializing new markup failed
    #[error("Failed to encode {what}: {reason}")]
    Encode { what: String, reason: String },

    /// Package-level failure
    #[error(transparent)]
    Package(#[from] PackageError),
}

impl SlicerError {
    pub(crate) fn decode(what: impl Into<String>, reason: impl ToString) -> Self {
        SlicerError::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encode(what: impl Into<String>, reason: impl ToString) -> Self {
        SlicerError::Encode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}
