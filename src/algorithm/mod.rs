/// Belief combination and MAP decoding
pub mod belief;
/// Sum-product message computation
pub mod message;
/// Round scheduling and the inference driver
pub mod scheduler;
