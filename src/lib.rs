//! Grayscale image completion with loopy belief propagation
//!
//! An image is modelled as a pairwise Markov random field over its
//! 4-connected pixel grid. Observed pixels emit fixed evidence messages,
//! a truncated exponential smoothness prior couples neighbours, and
//! sum-product message passing followed by MAP decoding fills in every
//! unobserved pixel.

#![forbid(unsafe_code)]

/// Message passing, scheduling and belief decoding
pub mod algorithm;
/// Input/output operations and error handling
pub mod io;
/// Compatibility potential and distribution utilities
pub mod math;
/// Grid factor graph and observed masks
pub mod spatial;

pub use algorithm::scheduler::{BeliefPropagation, InferenceConfig, Schedule, complete_image};
pub use io::error::{CompletionError, Result};
