//! Observed-pixel masks and rectangular unobserved regions

use bitvec::prelude::*;
use std::fmt;
use std::str::FromStr;

/// Inclusive axis-aligned rectangle in grid coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// Minimum (row, col), inclusive
    pub min: [usize; 2],
    /// Maximum (row, col), inclusive
    pub max: [usize; 2],
}

impl BoundingBox {
    /// Create a rectangle from its top-left and bottom-right corners
    pub const fn new(top: usize, left: usize, bottom: usize, right: usize) -> Self {
        Self {
            min: [top, left],
            max: [bottom, right],
        }
    }

    /// Check if a position is within the bounds
    pub const fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.min[0] && row <= self.max[0] && col >= self.min[1] && col <= self.max[1]
    }
}

impl FromStr for BoundingBox {
    type Err = String;

    /// Parse `TOP,LEFT,BOTTOM,RIGHT`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|part| part.trim().parse::<usize>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid region '{s}': {e}"))?;

        match parts.as_slice() {
            &[top, left, bottom, right] => {
                if top > bottom || left > right {
                    Err(format!(
                        "invalid region '{s}': top-left corner must not exceed bottom-right"
                    ))
                } else {
                    Ok(Self::new(top, left, bottom, right))
                }
            }
            _ => Err(format!(
                "invalid region '{s}': expected TOP,LEFT,BOTTOM,RIGHT"
            )),
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min[0], self.min[1], self.max[0], self.max[1]
        )
    }
}

/// Row-major bitmap of which pixels carry fixed evidence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedMask {
    bits: BitVec,
    rows: usize,
    cols: usize,
}

impl ObservedMask {
    /// Mask with every pixel observed
    pub fn all_observed(rows: usize, cols: usize) -> Self {
        Self {
            bits: bitvec![1; rows * cols],
            rows,
            cols,
        }
    }

    /// Mask with every pixel unobserved
    pub fn none_observed(rows: usize, cols: usize) -> Self {
        Self {
            bits: bitvec![0; rows * cols],
            rows,
            cols,
        }
    }

    /// Build a mask from an observed predicate
    pub fn from_fn<F>(rows: usize, cols: usize, is_observed: F) -> Self
    where
        F: Fn(usize, usize) -> bool,
    {
        let bits = (0..rows * cols)
            .map(|i| is_observed(i / cols, i % cols))
            .collect();
        Self { bits, rows, cols }
    }

    /// Mark every pixel of `region` as unobserved
    ///
    /// Parts of the region outside the grid are ignored.
    pub fn hide_region(&mut self, region: &BoundingBox) {
        if self.rows == 0 || self.cols == 0 {
            return;
        }
        let row_end = region.max[0].min(self.rows - 1);
        let col_end = region.max[1].min(self.cols - 1);
        for row in region.min[0]..=row_end {
            for col in region.min[1]..=col_end {
                self.set(row, col, false);
            }
        }
    }

    /// Set the observed flag of one pixel; out-of-range positions are ignored
    pub fn set(&mut self, row: usize, col: usize, observed: bool) {
        if row < self.rows && col < self.cols {
            self.bits.set(row * self.cols + col, observed);
        }
    }

    /// Whether the pixel at (row, col) is observed
    ///
    /// Positions outside the grid are reported as unobserved.
    pub fn is_observed(&self, row: usize, col: usize) -> bool {
        row < self.rows
            && col < self.cols
            && self.bits.get(row * self.cols + col).as_deref() == Some(&true)
    }

    /// Mask dimensions (rows, cols)
    pub const fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of observed pixels
    pub fn observed_count(&self) -> usize {
        self.bits.count_ones()
    }

    /// Number of unobserved pixels
    pub fn unobserved_count(&self) -> usize {
        self.bits.count_zeros()
    }
}
