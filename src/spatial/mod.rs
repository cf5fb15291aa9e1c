//! Spatial data structures for the pixel grid
//!
//! This module contains:
//! - The grid factor graph and its message storage
//! - Observed masks and rectangular regions

/// Grid factor graph with per-direction message slots
pub mod grid;
/// Observed masks and unobserved regions
pub mod mask;

pub use grid::{Direction, FactorGraph, Node};
pub use mask::{BoundingBox, ObservedMask};
