//! Custom error types for the audit pipeline.
//!
//! This module provides an error hierarchy using `thiserror`. Errors are
//! serializable so reports that embed a failed section can carry the reason
//! along with the rest of the output.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for audit operations.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Input file does not exist or could not be opened.
    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The dataset has no rows.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A statistic is undefined for the given subset (zero std, empty group,
    /// zero denominator). Analyzers report these as absent metrics; this
    /// variant surfaces only when a caller demanded the value anyway.
    #[error("Statistic '{statistic}' is undefined for {subset}")]
    DegenerateStatistic { statistic: String, subset: String },

    /// An analyzer failed in a way that should not abort the whole audit.
    #[error("Analyzer '{analyzer}' failed: {reason}")]
    AnalyzerFailed { analyzer: String, reason: String },

    /// Report export failed.
    #[error("Failed to write report: {0}")]
    ExportFailed(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AuditError>,
    },
}

impl AuditError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AuditError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for programmatic handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SourceNotFound(_) => "SOURCE_NOT_FOUND",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::EmptyDataset => "EMPTY_DATASET",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::DegenerateStatistic { .. } => "DEGENERATE_STATISTIC",
            Self::AnalyzerFailed { .. } => "ANALYZER_FAILED",
            Self::ExportFailed(_) => "EXPORT_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error is fatal for the whole audit (as opposed to a
    /// single degraded section).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound(_) | Self::EmptyDataset | Self::InvalidConfig(_)
        )
    }
}

/// Errors serialize as a struct with `code` and `message` fields.
impl Serialize for AuditError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AuditError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AuditError::Polars(e).with_context(context))
    }
}
