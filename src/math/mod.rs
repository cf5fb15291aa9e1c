//! Mathematical utilities for the inference engine

/// Pairwise smoothness potential
pub mod compatibility;
/// Products, normalization and argmax over discrete distributions
pub mod distribution;
