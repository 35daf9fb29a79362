use std::path::PathBuf;

use thiserror::Error;

use crate::models::ClassifierKind;

// ---------------------------------------------------------------------------
// Input errors (recoverable, the user corrects the input)
// ---------------------------------------------------------------------------

/// A single-record field failed its range or domain check.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} out of range: {min}–{max} (got {value})")]
    OutOfRange {
        field: String,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("{field} must be one of {} (got '{value}')", .allowed.join(", "))]
    InvalidCategory {
        field: String,
        allowed: Vec<String>,
        value: String,
    },

    #[error("{field} must be a number (got '{value}')")]
    NotNumeric { field: String, value: String },

    #[error("{field} is required")]
    MissingField { field: String },
}

/// A batch table lacks one or more required columns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing columns: {}", .missing.join(", "))]
pub struct MissingColumnsError {
    /// Missing column names, in canonical feature order.
    pub missing: Vec<String>,
}

// ---------------------------------------------------------------------------
// Artifact / model availability errors
// ---------------------------------------------------------------------------

/// Why a persisted artifact could not be turned into a usable model.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid artifact {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("not configured")]
    NotConfigured,
}

/// Which model slot was empty when a prediction was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableModel {
    Scaler,
    Classifier(ClassifierKind),
}

impl std::fmt::Display for UnavailableModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnavailableModel::Scaler => write!(f, "scaler"),
            UnavailableModel::Classifier(kind) => write!(f, "{kind} classifier"),
        }
    }
}

/// The scaler or the selected classifier failed to load; prediction must
/// not proceed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{model} unavailable: {reason}")]
pub struct ModelUnavailableError {
    pub model: UnavailableModel,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Numeric / inference errors
// ---------------------------------------------------------------------------

/// Raised by a scaler whose width does not match the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("scaler expects {expected} features, input has {got}")]
pub struct ScalerError {
    pub expected: usize,
    pub got: usize,
}

/// Raised by a classifier implementation while running inference.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    #[error("expected {expected} features, input has {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("{0}")]
    Numerical(String),
}

/// The underlying classifier call failed. The cause is preserved.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("{model} inference failed: {source}")]
    Classifier {
        model: ClassifierKind,
        #[source]
        source: ClassifierError,
    },

    #[error("{model} inference panicked: {message}")]
    Panicked {
        model: ClassifierKind,
        message: String,
    },

    #[error("{model} returned {got} {what}, expected {expected}")]
    Shape {
        model: ClassifierKind,
        what: &'static str,
        expected: usize,
        got: usize,
    },
}

// ---------------------------------------------------------------------------
// Composite errors
// ---------------------------------------------------------------------------

/// Failure while turning a batch table into a scaled matrix.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error(transparent)]
    MissingColumns(#[from] MissingColumnsError),

    #[error("row {row}, column {column}: '{value}' is not a number")]
    NotNumeric {
        row: usize,
        column: String,
        value: String,
    },

    #[error(transparent)]
    Scaler(#[from] ScalerError),
}

/// Every way a prediction request can fail.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Scaler(#[from] ScalerError),

    #[error(transparent)]
    ModelUnavailable(#[from] ModelUnavailableError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl From<MissingColumnsError> for PipelineError {
    fn from(e: MissingColumnsError) -> Self {
        PipelineError::Batch(BatchError::MissingColumns(e))
    }
}
