//! Input/output operations, configuration and error handling

/// Command-line interface and batch file processing
pub mod cli;
/// Constants and runtime defaults
pub mod configuration;
/// Error types and context helpers
pub mod error;
/// Grayscale image and mask files
pub mod image;
/// Terminal progress display
pub mod progress;
/// Animated GIF export of inference rounds
pub mod visualization;
