use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Fatal failures that abort an export. Recoverable problems are collected in
/// a [`Status`](crate::Status) report instead.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when YAML parsing or serialization fails.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Raised when the status report cannot be serialised.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Raised when no entity in the building document has the building type.
    #[error("no building root found: no entity has type FACILITIES/BUILDING")]
    MissingBuildingRoot,

    /// Raised when more than one entity claims to be the building root.
    #[error("multiple building roots found: {}", .0.join(", "))]
    MultipleBuildingRoots(Vec<String>),

    /// Raised when a document does not follow the identifier → entity layout.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Raised when an output path cannot be used to derive file names.
    #[error("output path must end in .yaml: {0}")]
    InvalidOutputPath(PathBuf),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when a building code does not look like `CC-CITY-CODE`.
    #[error("invalid building code '{0}': expected COUNTRY-CITY-BUILDING")]
    InvalidBuildingCode(String),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
