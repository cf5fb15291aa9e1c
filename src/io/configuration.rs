//! Inference constants and runtime configuration defaults

// Model parameters
/// Default size of the intensity state space
pub const DEFAULT_STATES: usize = 256;

/// Largest state space representable by 8-bit intensities
pub const MAX_STATES: usize = 256;

/// Default truncation threshold of the smoothness penalty
pub const DEFAULT_VMAX: f64 = 50.0;

/// Default number of message passing rounds
pub const DEFAULT_ITERATIONS: usize = 100;

// Safety limit to prevent excessive memory allocation
/// Maximum allowed grid dimension
pub const MAX_GRID_DIMENSION: usize = 10_000;

// Progress bar display settings
/// Threshold for switching to batch progress mode
pub const MAX_INDIVIDUAL_PROGRESS_BARS: usize = 5;

// Output settings
/// Suffix added to completed image filenames
pub const OUTPUT_SUFFIX: &str = "_completed";
/// Suffix identifying observed-mask images next to an input
pub const MASK_SUFFIX: &str = "_mask";
/// Suffix added to visualization filenames
pub const VISUALIZATION_SUFFIX: &str = "_rounds";
/// Delay between GIF animation frames
pub const GIF_FRAME_DELAY_MS: u32 = 20;
/// Minimum frame delay that viewers reliably support (in milliseconds)
pub const VIEWER_MIN_FRAME_DELAY_MS: u32 = 50;
