//! Frame capture and GIF generation for watching inference progress

use crate::io::configuration::VIEWER_MIN_FRAME_DELAY_MS;
use crate::io::error::{CompletionError, Result};
use image::{Delay, Frame, Rgba, RgbaImage};
use ndarray::Array2;
use std::path::Path;

/// Records the decoded image after each round
///
/// Frames are kept in memory and only encoded on export.
pub struct FrameCapture {
    frames: Vec<(usize, Array2<u8>)>,
    dimensions: (usize, usize),
}

impl FrameCapture {
    /// Prepare a capture for images of the given shape
    pub fn new(rows: usize, cols: usize, max_iterations: usize) -> Self {
        Self {
            frames: Vec::with_capacity(max_iterations + 1),
            dimensions: (rows, cols),
        }
    }

    /// Record the decoded image after `iteration`
    ///
    /// # Errors
    ///
    /// Returns `InvalidDimensions` if the frame shape differs from the
    /// capture shape
    pub fn record_frame(&mut self, iteration: usize, decoded: Array2<u8>) -> Result<()> {
        if decoded.dim() != self.dimensions {
            let (rows, cols) = decoded.dim();
            return Err(CompletionError::InvalidDimensions {
                rows,
                cols,
                reason: format!(
                    "frame does not match the {}x{} capture",
                    self.dimensions.0, self.dimensions.1
                ),
            });
        }
        self.frames.push((iteration, decoded));
        Ok(())
    }

    /// Rounds at which frames were recorded
    pub fn iterations(&self) -> Vec<usize> {
        self.frames.iter().map(|(iteration, _)| *iteration).collect()
    }

    /// Returns the total number of recorded frames
    pub const fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Export the captured frames as a GIF with automatic frame skipping
    ///
    /// If the requested delay is shorter than viewers reliably support,
    /// frames are skipped so the apparent speed is kept. The last frame is
    /// always included and held longer.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No frames were captured
    /// - File system operations fail
    /// - GIF encoding fails
    pub fn export_gif(&self, output_path: &Path, frame_delay_ms: u32) -> Result<()> {
        if self.frames.is_empty() {
            return Err(CompletionError::InvalidSourceData {
                reason: "No frames captured for visualization".to_string(),
            });
        }

        let frame_delay_ms = frame_delay_ms.max(1);
        let effective_delay_ms = frame_delay_ms.max(VIEWER_MIN_FRAME_DELAY_MS);
        let skip_factor = if frame_delay_ms < VIEWER_MIN_FRAME_DELAY_MS {
            VIEWER_MIN_FRAME_DELAY_MS.div_ceil(frame_delay_ms) as usize
        } else {
            1
        };

        let frames = self.generate_frames(effective_delay_ms, skip_factor);

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CompletionError::FileSystem {
                path: parent.to_path_buf(),
                operation: "create directory",
                source: e,
            })?;
        }

        let file = std::fs::File::create(output_path).map_err(|e| CompletionError::FileSystem {
            path: output_path.to_path_buf(),
            operation: "create file",
            source: e,
        })?;

        let mut encoder = image::codecs::gif::GifEncoder::new(file);
        encoder
            .encode_frames(frames)
            .map_err(|e| CompletionError::ImageExport {
                path: output_path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn generate_frames(&self, delay_ms: u32, skip_factor: usize) -> Vec<Frame> {
        let last = self.frames.len().saturating_sub(1);
        let mut frames: Vec<Frame> = self
            .frames
            .iter()
            .enumerate()
            .filter(|(index, _)| index % skip_factor == 0 || *index == last)
            .map(|(_, (_, decoded))| render_frame(decoded, delay_ms))
            .collect();

        // Final frame displays longer for better visibility
        if let Some(last_frame_img) = frames.last().map(|f| f.buffer().clone()) {
            frames.push(Frame::from_parts(
                last_frame_img,
                0,
                0,
                Delay::from_numer_denom_ms(delay_ms * 25, 1),
            ));
        }

        frames
    }
}

fn render_frame(decoded: &Array2<u8>, delay_ms: u32) -> Frame {
    let (rows, cols) = decoded.dim();
    let img = RgbaImage::from_fn(cols as u32, rows as u32, |x, y| {
        let value = decoded
            .get([y as usize, x as usize])
            .copied()
            .unwrap_or(0);
        Rgba([value, value, value, 255])
    });

    Frame::from_parts(img, 0, 0, Delay::from_numer_denom_ms(delay_ms, 1))
}
