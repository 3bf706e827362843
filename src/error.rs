// Error taxonomy for the review pipeline.
//
// Loader and writer failures are fatal and propagate to the caller.
// InferenceError is row-scoped: the batch evaluator catches it and records
// empty predictions for that row instead of aborting the run.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the load → clean → evaluate → export pipeline.
#[derive(Debug, Error)]
pub enum ReviewError {
    /// The source could not be read, is not JSON, or is not an
    /// array of arrays of objects.
    #[error("malformed input in {source_name}: {reason}")]
    MalformedInput { source_name: String, reason: String },

    /// The source parsed fine but contained no reviews.
    #[error("no reviews found in {source_name}")]
    EmptyInput { source_name: String },

    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// The output table could not be written or finalized.
    #[error("failed to write {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReviewError {
    pub(crate) fn malformed(source_name: &str, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Only an empty dataset is something callers may choose to continue past.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EmptyInput { .. })
    }

    /// Short kind name for user-facing reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedInput { .. } => "MalformedInputError",
            Self::EmptyInput { .. } => "EmptyInputError",
            Self::Inference(_) => "InferenceError",
            Self::OutputWrite { .. } => "OutputWriteError",
        }
    }
}

/// A single model call failed. Backends convert their own error types
/// into one of these variants before returning.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InferenceError {
    #[error("cannot run inference on empty text")]
    EmptyText,

    #[error("invalid candidate labels: {0}")]
    InvalidLabels(String),

    #[error("inference backend failed: {0}")]
    Backend(String),

    #[error("unparseable model output: {0}")]
    Unparseable(String),

    #[error("inference timed out after {0:?}")]
    Timeout(Duration),
}

impl InferenceError {
    /// Wrap any backend-specific error, keeping its full context chain.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(format!("{err:#}"))
    }
}
