//! Command-line interface for batch completion of grayscale PNG files

use crate::algorithm::belief::DecodePolicy;
use crate::algorithm::scheduler::{BeliefPropagation, InferenceConfig, Schedule};
use crate::io::configuration::{
    DEFAULT_ITERATIONS, DEFAULT_STATES, DEFAULT_VMAX, GIF_FRAME_DELAY_MS, MASK_SUFFIX,
    OUTPUT_SUFFIX, VISUALIZATION_SUFFIX,
};
use crate::io::error::{Result, invalid_target};
use crate::io::image::{export_grayscale, load_grayscale, load_mask};
use crate::io::progress::ProgressManager;
use crate::io::visualization::FrameCapture;
use crate::spatial::grid::FactorGraph;
use crate::spatial::mask::{BoundingBox, ObservedMask};
use clap::Parser;
use log::{LevelFilter, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "lbpfill")]
#[command(
    author,
    version,
    about = "Fill unobserved pixels of grayscale images with loopy belief propagation"
)]
/// Command-line arguments for the image completion tool
// CLI tools commonly need multiple boolean flags for various features and user preferences
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input PNG file or directory to process
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Number of message passing rounds
    #[arg(short, long, default_value_t = DEFAULT_ITERATIONS)]
    pub iterations: usize,

    /// Truncation threshold of the smoothness penalty
    #[arg(long, default_value_t = DEFAULT_VMAX)]
    pub vmax: f64,

    /// Number of intensity states
    #[arg(short = 'k', long, default_value_t = DEFAULT_STATES)]
    pub states: usize,

    /// Unobserved rectangle as TOP,LEFT,BOTTOM,RIGHT (inclusive, repeatable)
    #[arg(short, long = "region", value_name = "TOP,LEFT,BOTTOM,RIGHT")]
    pub regions: Vec<BoundingBox>,

    /// Use mask image if available (looks for <input>_mask.png, non-black = unobserved)
    #[arg(short, long)]
    pub mask: bool,

    /// Message schedule: sequential or synchronous
    #[arg(short, long, default_value_t = Schedule::Sequential)]
    pub schedule: Schedule,

    /// Stop once no message changes by more than this in a round
    #[arg(short, long)]
    pub tolerance: Option<f64>,

    /// Decode observed pixels from their beliefs instead of keeping them
    #[arg(long)]
    pub decode_observed: bool,

    /// Write an animated GIF of the decoded image after every round
    #[arg(short = 'g', long)]
    pub visualize: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Process files even if output exists
    #[arg(short, long)]
    pub no_skip: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Check if existing output files should be skipped
    pub const fn skip_existing(&self) -> bool {
        !self.no_skip
    }

    /// Check if progress should be displayed
    pub const fn should_show_progress(&self) -> bool {
        !self.quiet
    }

    /// Default log filter implied by `--verbose`
    pub const fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        }
    }

    /// Inference configuration assembled from the arguments
    pub const fn inference_config(&self) -> InferenceConfig {
        InferenceConfig {
            states: self.states,
            vmax: self.vmax,
            iterations: self.iterations,
            schedule: self.schedule,
            tolerance: self.tolerance,
            decode_policy: if self.decode_observed {
                DecodePolicy::FromBeliefs
            } else {
                DecodePolicy::ClampObserved
            },
        }
    }
}

/// Orchestrates batch processing of PNG files with progress tracking
pub struct FileProcessor {
    cli: Cli,
    progress_manager: Option<ProgressManager>,
}

impl FileProcessor {
    /// Create a new file processor with the given CLI arguments
    pub fn new(cli: Cli) -> Self {
        let progress_manager = cli.should_show_progress().then(ProgressManager::new);

        Self {
            cli,
            progress_manager,
        }
    }

    /// Process files according to CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the target cannot
    /// be read, or any file fails to complete
    pub fn process(&mut self) -> Result<()> {
        self.cli.inference_config().validate()?;
        let files = self.collect_files()?;

        if files.is_empty() {
            info!("Nothing to process in {}", self.cli.target.display());
            return Ok(());
        }

        if let Some(ref mut pm) = self.progress_manager {
            pm.initialize(files.len());
        }

        for (index, file) in files.iter().enumerate() {
            self.process_file(file, index)?;
        }

        if let Some(ref mut pm) = self.progress_manager {
            pm.finish();
        }

        Ok(())
    }

    /// Input files selected by the target, sorted; generated files are excluded
    ///
    /// # Errors
    ///
    /// Returns an error if the target is neither a PNG file nor a readable
    /// directory
    pub fn collect_files(&self) -> Result<Vec<PathBuf>> {
        let target = &self.cli.target;
        if target.is_file() {
            if !is_png(target) {
                return Err(invalid_target(target, "Target file must be a PNG image"));
            }
            Ok(if self.should_process_file(target) {
                vec![target.clone()]
            } else {
                vec![]
            })
        } else if target.is_dir() {
            let mut files = Vec::new();
            for entry in std::fs::read_dir(target)? {
                let path = entry?.path();
                if is_png(&path) && !is_generated(&path) && self.should_process_file(&path) {
                    files.push(path);
                }
            }
            files.sort();
            Ok(files)
        } else {
            Err(invalid_target(
                target,
                "Target must be a PNG file or directory",
            ))
        }
    }

    fn should_process_file(&self, input_path: &Path) -> bool {
        if !self.cli.skip_existing() {
            return true;
        }

        let output_path = output_path(input_path);
        if output_path.exists() {
            warn!("Skipping: {} (output exists)", input_path.display());
            false
        } else {
            true
        }
    }

    /// Observed mask for an image: mask file and regions combined
    ///
    /// # Errors
    ///
    /// Returns an error if a requested mask file exists but cannot be used
    pub fn observed_mask(&self, input_path: &Path, rows: usize, cols: usize) -> Result<ObservedMask> {
        let mut mask = ObservedMask::all_observed(rows, cols);

        if self.cli.mask {
            let mask_path = mask_path(input_path);
            if mask_path.exists() {
                mask = load_mask(&mask_path, rows, cols)?;
            } else {
                warn!(
                    "No mask found at: {} (continuing without mask)",
                    mask_path.display()
                );
            }
        }

        for region in &self.cli.regions {
            mask.hide_region(region);
        }

        Ok(mask)
    }

    fn process_file(&mut self, input_path: &Path, index: usize) -> Result<()> {
        let start_time = Instant::now();
        let output_path = output_path(input_path);

        if let Some(ref mut pm) = self.progress_manager {
            pm.start_file(index, input_path, self.cli.iterations);
        }

        let intensities = load_grayscale(input_path)?;
        let (rows, cols) = intensities.dim();
        let mask = self.observed_mask(input_path, rows, cols)?;
        info!(
            "Completing {} ({rows}x{cols}, {} unobserved pixels)",
            input_path.display(),
            mask.unobserved_count()
        );

        let graph = FactorGraph::from_mask(&intensities, &mask)?;
        let mut inference = BeliefPropagation::new(graph, self.cli.inference_config())?;

        let mut capture = self
            .cli
            .visualize
            .then(|| FrameCapture::new(rows, cols, self.cli.iterations));
        if let Some(ref mut capture) = capture {
            capture.record_frame(0, inference.decode()?)?;
        }

        while inference.should_continue() {
            let report = inference.execute_iteration()?;

            if let Some(ref mut pm) = self.progress_manager {
                pm.update_iteration(index, report.iteration, report.max_delta);
            }
            if let Some(ref mut capture) = capture {
                capture.record_frame(report.iteration, inference.decode()?)?;
            }
        }

        export_grayscale(&inference.decode()?, &output_path)?;

        if let Some(ref capture) = capture {
            capture.export_gif(&visualization_path(input_path), GIF_FRAME_DELAY_MS)?;
        }

        if let Some(ref mut pm) = self.progress_manager {
            pm.complete_file(index, start_time.elapsed());
        }

        info!(
            "Wrote {} after {} iterations in {:?}",
            output_path.display(),
            inference.iteration(),
            start_time.elapsed()
        );

        Ok(())
    }
}

fn is_png(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("png")
}

// Masks, results and other derived files never count as inputs
fn is_generated(path: &Path) -> bool {
    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    stem.ends_with(MASK_SUFFIX) || stem.ends_with(OUTPUT_SUFFIX)
}

fn sibling_path(input_path: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = input_path.file_stem().unwrap_or_default();
    let name = format!("{}{suffix}.{extension}", stem.to_string_lossy());

    if let Some(parent) = input_path.parent() {
        parent.join(name)
    } else {
        PathBuf::from(name)
    }
}

/// Where the completed image of `input_path` is written
pub fn output_path(input_path: &Path) -> PathBuf {
    sibling_path(input_path, OUTPUT_SUFFIX, "png")
}

/// Where the mask of `input_path` is looked up
pub fn mask_path(input_path: &Path) -> PathBuf {
    sibling_path(input_path, MASK_SUFFIX, "png")
}

/// Where the round-by-round GIF of `input_path` is written
pub fn visualization_path(input_path: &Path) -> PathBuf {
    sibling_path(input_path, VISUALIZATION_SUFFIX, "gif")
}
