//! Multi-file progress tracking with automatic batching for large sets

use crate::io::configuration::MAX_INDIVIDUAL_PROGRESS_BARS;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

/// Display state of one file
#[derive(Debug, Clone, Default)]
struct FileState {
    name: String,
    iteration: usize,
    max_iterations: usize,
    max_delta: Option<f64>,
}

/// Coordinates progress display for batch inference runs
///
/// Shows one bar per file for the most recent files, and adds a batch bar
/// once the batch is too large to list
pub struct ProgressManager {
    multi_progress: MultiProgress,
    batch_bar: Option<ProgressBar>,
    file_bars: Vec<ProgressBar>,
    file_states: Vec<FileState>,
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new()
    }
}

static ITERATION_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("{prefix} [{bar:30.cyan/blue}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏ ")
});

static BATCH_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] Images: [{bar:40.cyan/blue}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
});

impl ProgressManager {
    /// Create a new progress manager
    pub fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            batch_bar: None,
            file_bars: Vec::new(),
            file_states: Vec::new(),
        }
    }

    /// Create bars for a batch of `file_count` images
    pub fn initialize(&mut self, file_count: usize) {
        if file_count > MAX_INDIVIDUAL_PROGRESS_BARS + 1 {
            let batch_bar = ProgressBar::new(file_count as u64);
            batch_bar.set_style(BATCH_STYLE.clone());
            self.batch_bar = Some(self.multi_progress.add(batch_bar));
        }

        for _ in 0..file_count.min(MAX_INDIVIDUAL_PROGRESS_BARS) {
            let pb = ProgressBar::new(0);
            pb.set_style(ITERATION_STYLE.clone());
            self.file_bars.push(self.multi_progress.add(pb));
        }
    }

    /// Configure progress for a new file
    pub fn start_file(&mut self, index: usize, path: &Path, iterations: usize) {
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        if index >= self.file_states.len() {
            self.file_states.resize(index + 1, FileState::default());
        }
        if let Some(state) = self.file_states.get_mut(index) {
            *state = FileState {
                name,
                iteration: 0,
                max_iterations: iterations,
                max_delta: None,
            };
        }
        self.update_bars();
    }

    /// Report a finished round and its largest message change
    pub fn update_iteration(&mut self, file_index: usize, iteration: usize, max_delta: f64) {
        if let Some(state) = self.file_states.get_mut(file_index) {
            state.iteration = iteration;
            state.max_delta = Some(max_delta);
        }
        self.update_bars();
    }

    /// Mark file as completed and update batch progress
    pub fn complete_file(&mut self, index: usize, elapsed: Duration) {
        if let Some(ref batch_bar) = self.batch_bar {
            batch_bar.inc(1);
        }

        if let Some(state) = self.file_states.get_mut(index) {
            state.name = format!("✓ {} ({:.1}s)", state.name, elapsed.as_secs_f64());
            // Early-stopped runs still show a full bar
            state.max_iterations = state.iteration;
        }
        self.update_bars();
    }

    /// Clean up all progress displays
    pub fn finish(&self) {
        if let Some(ref batch_bar) = self.batch_bar {
            batch_bar.finish_with_message("All images processed");
        }
        let _ = self.multi_progress.clear();
    }

    /// Number of files seen so far
    pub const fn tracked_files(&self) -> usize {
        self.file_states.len()
    }

    /// Show the last N started files
    fn update_bars(&self) {
        let active: Vec<&FileState> = self
            .file_states
            .iter()
            .filter(|state| !state.name.is_empty())
            .collect();
        let start_idx = active.len().saturating_sub(MAX_INDIVIDUAL_PROGRESS_BARS);
        let visible = active.get(start_idx..).unwrap_or(&[]);

        for (bar, state) in self.file_bars.iter().zip(visible) {
            bar.set_length(state.max_iterations as u64);
            bar.set_position(state.iteration as u64);
            bar.set_prefix(state.name.clone());
            let width = state.max_iterations.to_string().len();
            let delta = state
                .max_delta
                .filter(|delta| delta.is_finite())
                .map_or_else(String::new, |delta| format!(" Δ {delta:.2e}"));
            bar.set_message(format!(
                "{:>width$}/{}{delta}",
                state.iteration, state.max_iterations
            ));
        }

        for bar in self.file_bars.iter().skip(visible.len()) {
            bar.set_length(0);
            bar.set_position(0);
            bar.set_message(String::new());
            bar.set_prefix(String::new());
        }
    }
}
