//! Error types and context management for inference and image operations

use std::fmt;
use std::path::PathBuf;

/// Main error type for all completion operations
#[derive(Debug)]
pub enum CompletionError {
    /// Failed to load an image from the filesystem
    ImageLoad {
        /// Path to the image file
        path: PathBuf,
        /// Underlying image loading error
        source: image::ImageError,
    },

    /// Grid dimensions are malformed or disagree with the intensity array
    InvalidDimensions {
        /// Requested number of rows
        rows: usize,
        /// Requested number of columns
        cols: usize,
        /// Description of the mismatch
        reason: String,
    },

    /// An observed pixel carries an intensity outside the state space
    EvidenceOutOfRange {
        /// Row of the offending pixel
        row: usize,
        /// Column of the offending pixel
        col: usize,
        /// Observed intensity
        value: u8,
        /// Size of the state space
        states: usize,
    },

    /// Message normalization hit a zero or non-finite denominator
    ///
    /// Raised instead of letting NaNs leak into later rounds.
    NumericInstability {
        /// Round in which the failure occurred, when known
        iteration: Option<usize>,
        /// Node that was sending the message
        sender: usize,
        /// Node that was receiving the message
        receiver: usize,
        /// Offending normalization denominator
        total: f64,
    },

    /// A message was requested between two nodes that share no edge
    NotAdjacent {
        /// Requested sender index
        sender: usize,
        /// Requested receiver index
        receiver: usize,
    },

    /// Algorithm parameter validation failed
    InvalidParameter {
        /// Name of the invalid parameter
        parameter: &'static str,
        /// Provided value that failed validation
        value: String,
        /// Explanation of why the value is invalid
        reason: String,
    },

    /// Input data doesn't meet algorithm requirements
    InvalidSourceData {
        /// Description of what's wrong with the input
        reason: String,
    },

    /// Failed to save an image to disk
    ImageExport {
        /// Path where export was attempted
        path: PathBuf,
        /// Underlying image export error
        source: image::ImageError,
    },

    /// General file system operation failure
    FileSystem {
        /// Path involved in the operation
        path: PathBuf,
        /// Description of the operation that failed
        operation: &'static str,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

impl fmt::Display for CompletionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImageLoad { path, source } => {
                write!(f, "Failed to load image '{}': {source}", path.display())
            }
            Self::InvalidDimensions { rows, cols, reason } => {
                write!(f, "Invalid grid dimensions {rows}x{cols}: {reason}")
            }
            Self::EvidenceOutOfRange {
                row,
                col,
                value,
                states,
            } => {
                write!(
                    f,
                    "Observed intensity {value} at ({row}, {col}) is outside the state space of size {states}"
                )
            }
            Self::NumericInstability {
                iteration,
                sender,
                receiver,
                total,
            } => {
                write!(
                    f,
                    "Message {sender} -> {receiver} could not be normalized (sum = {total})"
                )?;
                if let Some(iteration) = iteration {
                    write!(f, " at iteration {iteration}")?;
                }
                Ok(())
            }
            Self::NotAdjacent { sender, receiver } => {
                write!(f, "Nodes {sender} and {receiver} are not adjacent")
            }
            Self::InvalidParameter {
                parameter,
                value,
                reason,
            } => {
                write!(f, "Invalid parameter '{parameter}' = '{value}': {reason}")
            }
            Self::InvalidSourceData { reason } => {
                write!(f, "Invalid source data: {reason}")
            }
            Self::ImageExport { path, source } => {
                write!(
                    f,
                    "Failed to export image to '{}': {source}",
                    path.display()
                )
            }
            Self::FileSystem {
                path,
                operation,
                source,
            } => {
                write!(
                    f,
                    "File system error during {operation} on '{}': {source}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for CompletionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ImageLoad { source, .. } | Self::ImageExport { source, .. } => Some(source),
            Self::FileSystem { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Convenience type alias for completion results
pub type Result<T> = std::result::Result<T, CompletionError>;

/// Additional context to enrich error messages
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Current inference round
    pub iteration: Option<usize>,
}

/// Enriches error messages with inference state information
pub trait WithContext<T> {
    /// Add error context to a Result
    ///
    /// # Errors
    ///
    /// Propagates the original error with additional context applied
    fn with_context(self, context: ErrorContext) -> Result<T>;

    /// Add just the round number
    ///
    /// # Errors
    ///
    /// Propagates the original error with the round applied
    fn with_iteration(self, iteration: usize) -> Result<T>;
}

impl<T, E> WithContext<T> for std::result::Result<T, E>
where
    E: Into<CompletionError>,
{
    fn with_context(self, context: ErrorContext) -> Result<T> {
        self.map_err(|e| {
            let mut error = e.into();
            // Only numeric failures carry a round number
            if let CompletionError::NumericInstability { iteration, .. } = &mut error {
                if context.iteration.is_some() {
                    *iteration = context.iteration;
                }
            }
            error
        })
    }

    fn with_iteration(self, iteration: usize) -> Result<T> {
        self.with_context(ErrorContext {
            iteration: Some(iteration),
        })
    }
}

impl From<image::ImageError> for CompletionError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageLoad {
            path: PathBuf::from("<unknown>"),
            source: err,
        }
    }
}

impl From<std::io::Error> for CompletionError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("<unknown>"),
            operation: "unknown",
            source: err,
        }
    }
}

/// Create an invalid parameter error
pub fn invalid_parameter(
    parameter: &'static str,
    value: &impl ToString,
    reason: &impl ToString,
) -> CompletionError {
    CompletionError::InvalidParameter {
        parameter,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Create an error for stored messages sized for another state space
pub fn state_mismatch(states: usize, found: usize) -> CompletionError {
    invalid_parameter(
        "states",
        &states,
        &format!("messages stored in the graph have {found} states"),
    )
}

/// Create an error describing an unusable CLI target path
pub fn invalid_target(path: &std::path::Path, msg: &str) -> CompletionError {
    CompletionError::InvalidParameter {
        parameter: "target",
        value: path.display().to_string(),
        reason: msg.to_string(),
    }
}
