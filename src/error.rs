//! Error types for the xlsxstream library

use thiserror::Error;

/// Result type alias for xlsxstream operations
pub type Result<T> = std::result::Result<T, ExcelError>;

/// Main error type for all reader operations
#[derive(Error, Debug)]
pub enum ExcelError {
    /// Bad configuration or API misuse: unknown namespace identifier,
    /// non-positive size, malformed locale character, and similar.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// The input file (or a temp file) could not be read or written.
    #[error("IO error: {0}")]
    IoUnreadable(#[from] std::io::Error),

    /// The package is missing a required relationship or part, or a
    /// relationship's `Type` could not be parsed.
    #[error("corrupt package: {0}")]
    CorruptPackage(String),

    /// The zip collaborator failed to locate or extract a member.
    #[error("zip failure: {message}")]
    ZipFailure { message: String },

    /// `change_sheet`/`change_sheet_by_name` given an unknown index or name.
    #[error("sheet '{sheet}' not found. Available sheets: {available}")]
    SheetNotFound { sheet: String, available: String },

    /// Malformed XML that could not be recovered from locally.
    #[error("XML parse error: {0}")]
    XmlError(String),
}

impl From<zip::result::ZipError> for ExcelError {
    fn from(e: zip::result::ZipError) -> Self {
        ExcelError::ZipFailure {
            message: e.to_string(),
        }
    }
}

impl From<quick_xml::Error> for ExcelError {
    fn from(e: quick_xml::Error) -> Self {
        ExcelError::XmlError(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ExcelError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        ExcelError::XmlError(e.to_string())
    }
}
