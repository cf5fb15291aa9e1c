//! Pairwise smoothness potential shared by every message update

use ndarray::{Array1, Array2, ArrayView1};

use crate::io::configuration::MAX_STATES;
use crate::io::error::{Result, invalid_parameter};

/// Truncated exponential compatibility matrix
///
/// `φ[a][b] = exp(-min(|a - b|, vmax))`. Nearby intensities are more
/// compatible; the truncation keeps very different intensities improbable
/// rather than impossible, so every entry stays strictly positive.
/// The matrix is never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibilityMatrix {
    phi: Array2<f64>,
    vmax: f64,
}

impl CompatibilityMatrix {
    /// Build the K x K matrix for `states` intensities
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if `states` is zero or above 256, or if
    /// `vmax` is negative or not finite
    pub fn build(states: usize, vmax: f64) -> Result<Self> {
        if states == 0 || states > MAX_STATES {
            return Err(invalid_parameter(
                "states",
                &states,
                &format!("must be between 1 and {MAX_STATES}"),
            ));
        }
        if !vmax.is_finite() || vmax < 0.0 {
            return Err(invalid_parameter(
                "vmax",
                &vmax,
                &"must be a finite, non-negative number",
            ));
        }

        let phi = Array2::from_shape_fn((states, states), |(a, b)| {
            let distance = a.abs_diff(b) as f64;
            (-distance.min(vmax)).exp()
        });

        Ok(Self { phi, vmax })
    }

    /// Number of intensity states K
    pub fn states(&self) -> usize {
        self.phi.nrows()
    }

    /// Truncation threshold used to build the matrix
    pub const fn vmax(&self) -> f64 {
        self.vmax
    }

    /// Compatibility of intensities `a` and `b`
    pub fn get(&self, a: usize, b: usize) -> Option<f64> {
        self.phi.get([a, b]).copied()
    }

    /// Row `a` of the matrix, the fixed message emitted by evidence `a`
    pub fn row(&self, a: usize) -> Option<ArrayView1<'_, f64>> {
        (a < self.states()).then(|| self.phi.row(a))
    }

    /// Apply the pairwise factor: `raw[a] = Σ_b φ[a][b] * message[b]`
    pub fn propagate(&self, message: &Array1<f64>) -> Array1<f64> {
        self.phi.dot(message)
    }

    /// Borrow the underlying matrix
    pub const fn matrix(&self) -> &Array2<f64> {
        &self.phi
    }
}
