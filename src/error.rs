//! Error types for the bikestore-ml pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Coarse classification of a [`PipelineError`], for callers that decide
/// exit codes or retry policy without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configured input path does not exist
    SourceNotFound,
    /// Loaded data does not satisfy the dataset schema
    SchemaViolation,
    /// Unrecognized task or otherwise invalid configuration
    InvalidConfiguration,
    /// Fit, evaluation, or artifact rendering failed
    ComputationFailure,
    /// Filesystem or serialization failure outside the data path
    Io,
}

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Dataset not found at: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("One or more required columns are missing from the dataset: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Column '{column}' has type {actual}, expected {expected}")]
    ColumnType {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("Schema mismatch in {}: {reason}", .path.display())]
    SchemaMismatch { path: PathBuf, reason: String },

    #[error("Invalid task '{0}'. Choose 'classification' or 'regression'.")]
    InvalidTask(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Tracking error: {0}")]
    TrackingError(String),

    #[error("Artifact error: {0}")]
    ArtifactError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl PipelineError {
    /// Which of the coarse failure kinds this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::SourceNotFound(_) => ErrorKind::SourceNotFound,
            PipelineError::MissingColumns(_)
            | PipelineError::ColumnType { .. }
            | PipelineError::SchemaMismatch { .. } => ErrorKind::SchemaViolation,
            PipelineError::InvalidTask(_) | PipelineError::ConfigError(_) => {
                ErrorKind::InvalidConfiguration
            }
            PipelineError::DataError(_)
            | PipelineError::ComputationError(_)
            | PipelineError::ShapeError { .. }
            | PipelineError::ModelNotFitted
            | PipelineError::ArtifactError(_) => ErrorKind::ComputationFailure,
            PipelineError::TrackingError(_)
            | PipelineError::IoError(_)
            | PipelineError::SerializationError(_) => ErrorKind::Io,
        }
    }
}

impl From<polars::error::PolarsError> for PipelineError {
    fn from(err: polars::error::PolarsError) -> Self {
        PipelineError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::ConfigError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for PipelineError {
    fn from(err: ndarray::ShapeError) -> Self {
        PipelineError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::ArtifactError(err.to_string())
    }
}
