//! Error types for tallyshade
//!
//! Every stage of the Load → Clean → Bucket → Aggregate → Render pipeline
//! reports failures through [`Error`]. The filter controller turns the
//! recoverable kinds (empty result, invalid selection) into payloads so
//! they never reach an active session as a failure.

use thiserror::Error;

/// Main error type for tallyshade operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required column is absent, or a stage referenced an unknown column
    #[error("Schema error: {0}")]
    Schema(String),

    /// A filter or selection matched zero rows
    #[error("No rows match the current selection")]
    EmptyResult,

    /// A selection value is not in the dimension's closed set
    #[error("Invalid selection '{value}' for '{dimension}'")]
    InvalidSelection { dimension: String, value: String },

    /// A value falls outside a bucket definition or canvas range
    #[error("Value {value} is outside the configured range {range}")]
    OutOfRange { value: f64, range: String },

    /// A label has no entry in a rename table whose policy rejects unmapped values
    #[error("Label '{label}' has no entry in rename table '{table}'")]
    UnmappedLabel { table: String, label: String },

    /// Invalid bucket definition, breakpoint list or selection string
    #[error("Parse error: {0}")]
    Parse(String),

    /// File I/O error
    #[error("Failed to access file: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// PNG encoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Chart drawing error reported by the plotting backend
    #[error("Chart error: {0}")]
    Chart(String),
}

/// Result type alias for tallyshade operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Short title for the error, used by the CLI when reporting a failed run
    pub fn title(&self) -> &'static str {
        match self {
            Error::Schema(_) => "Schema Error",
            Error::EmptyResult => "Empty Result",
            Error::InvalidSelection { .. } => "Invalid Selection",
            Error::OutOfRange { .. } => "Out Of Range",
            Error::UnmappedLabel { .. } => "Unmapped Label",
            Error::Parse(_) => "Parse Error",
            Error::Io(_) => "File Error",
            Error::Csv(_) => "CSV Error",
            Error::Json(_) => "JSON Error",
            Error::Image(_) => "Image Error",
            Error::Chart(_) => "Chart Error",
        }
    }
}
