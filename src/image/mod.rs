//! Image normalization for vision API transport
//!
//! Loads captured frames, forces true-color mode, downsizes oversized images,
//! and re-encodes to PNG for transport unless the source is already compliant.

pub mod normalizer;

pub use normalizer::{normalize, NormalizedImage};
