//! Error types for the cadastro pipeline.
//!
//! Invalid customer data is never an error here: a malformed CPF or an unknown
//! CEP is a failed check that ends up as a detach reason. These types only
//! cover the conditions that abort a run:
//!
//! - [`SheetError`] - Input files that cannot be read as tables
//! - [`LookupError`] - Postal lookup transport failures
//! - [`ExportError`] - Output files that cannot be written
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP surface errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Input Errors
// =============================================================================

/// Errors while reading an input spreadsheet.
#[derive(Debug, Error)]
pub enum SheetError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported file extension.
    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    /// The workbook could not be opened or decoded.
    #[error("Invalid workbook: {0}")]
    Workbook(String),

    /// Invalid CSV content.
    #[error("Invalid CSV format: {0}")]
    Csv(String),

    /// The file has no sheet or no header row.
    #[error("No header row found in {0}")]
    NoHeaders(String),
}

// =============================================================================
// Postal Lookup Errors
// =============================================================================

/// Transport-level failures of the postal lookup.
///
/// These never leave the validator: any of them means the CEP check fails.
#[derive(Debug, Error)]
pub enum LookupError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// Non-success status code.
    #[error("Unexpected status: {0}")]
    Status(u16),

    /// Body was not the expected JSON.
    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

// =============================================================================
// Output Errors
// =============================================================================

/// Errors while writing the run outputs.
#[derive(Debug, Error)]
pub enum ExportError {
    /// IO error (unwritable directory, disk full).
    #[error("Output IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Spreadsheet writer failed.
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// CSV writer failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input error.
    #[error("Input error: {0}")]
    Sheet(#[from] SheetError),

    /// Output error.
    #[error("Output error: {0}")]
    Export(#[from] ExportError),

    /// The incoming dataset has no rows.
    #[error("No incoming records to process")]
    EmptyInput,
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server could not bind or serve.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for input operations.
pub type SheetResult<T> = Result<T, SheetError>;

/// Result type for output operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // SheetError -> PipelineError
        let sheet_err = SheetError::NoHeaders("dados.xlsx".into());
        let pipeline_err: PipelineError = sheet_err.into();
        assert!(pipeline_err.to_string().contains("dados.xlsx"));

        // ExportError -> PipelineError -> ServerError
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let pipeline_err: PipelineError = ExportError::from(io).into();
        let server_err: ServerError = pipeline_err.into();
        assert!(server_err.to_string().contains("read-only"));
    }

    #[test]
    fn test_lookup_error_format() {
        let err = LookupError::Status(404);
        assert_eq!(err.to_string(), "Unexpected status: 404");
    }
}
