//! Grayscale PNG loading and export, and observed-mask images

use image::{GrayImage, Luma};
use ndarray::Array2;
use std::path::Path;

use crate::io::configuration::MAX_GRID_DIMENSION;
use crate::io::error::{CompletionError, Result};
use crate::spatial::mask::ObservedMask;

/// Load an image and convert it to 8-bit luminance, indexed `[row, col]`
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be opened or decoded
/// - Either dimension is zero or exceeds `MAX_GRID_DIMENSION`
pub fn load_grayscale(path: &Path) -> Result<Array2<u8>> {
    let img = image::open(path).map_err(|e| CompletionError::ImageLoad {
        path: path.to_path_buf(),
        source: e,
    })?;
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();
    let (rows, cols) = (height as usize, width as usize);

    if rows == 0 || cols == 0 || rows > MAX_GRID_DIMENSION || cols > MAX_GRID_DIMENSION {
        return Err(CompletionError::InvalidDimensions {
            rows,
            cols,
            reason: format!(
                "image '{}' must be between 1 and {MAX_GRID_DIMENSION} pixels on each side",
                path.display()
            ),
        });
    }

    Ok(gray_to_array(&gray))
}

/// Load a mask image; black pixels are observed, anything brighter is not
///
/// # Errors
///
/// Returns an error if the file cannot be decoded or its dimensions differ
/// from `(rows, cols)`
pub fn load_mask(path: &Path, rows: usize, cols: usize) -> Result<ObservedMask> {
    let img = image::open(path).map_err(|e| CompletionError::ImageLoad {
        path: path.to_path_buf(),
        source: e,
    })?;
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();

    if (height as usize, width as usize) != (rows, cols) {
        return Err(CompletionError::InvalidDimensions {
            rows,
            cols,
            reason: format!(
                "mask '{}' is {height}x{width}, expected the image size",
                path.display()
            ),
        });
    }

    Ok(ObservedMask::from_fn(rows, cols, |row, col| {
        gray.get_pixel_checked(col as u32, row as u32)
            .is_some_and(|pixel| pixel.0 == [0])
    }))
}

/// Convert a luminance buffer to a `[row, col]` array
pub fn gray_to_array(gray: &GrayImage) -> Array2<u8> {
    let (width, height) = gray.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(row, col)| {
        gray.get_pixel_checked(col as u32, row as u32)
            .map_or(0, |pixel| pixel.0[0])
    })
}

/// Convert a `[row, col]` array to a luminance buffer
pub fn array_to_gray(intensities: &Array2<u8>) -> GrayImage {
    let (rows, cols) = intensities.dim();
    GrayImage::from_fn(cols as u32, rows as u32, |x, y| {
        Luma([intensities
            .get([y as usize, x as usize])
            .copied()
            .unwrap_or(0)])
    })
}

/// Save intensities as a grayscale PNG, creating parent directories
///
/// # Errors
///
/// Returns an error if:
/// - The array is empty
/// - The parent directory cannot be created
/// - The image cannot be saved to the specified path
pub fn export_grayscale(intensities: &Array2<u8>, output_path: &Path) -> Result<()> {
    if intensities.is_empty() {
        return Err(CompletionError::InvalidSourceData {
            reason: "Cannot export an empty image".to_string(),
        });
    }

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| CompletionError::FileSystem {
            path: parent.to_path_buf(),
            operation: "create directory",
            source: e,
        })?;
    }

    array_to_gray(intensities)
        .save(output_path)
        .map_err(|e| CompletionError::ImageExport {
            path: output_path.to_path_buf(),
            source: e,
        })?;

    Ok(())
}
