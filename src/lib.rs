//! Motion-triggered home monitoring loop.
//!
//! Watches a directory of captured images and clips, plays the newest media,
//! forwards recent frames to a vision-language model for analysis, announces
//! results via speech and desktop notifications, and publishes state to an
//! MQTT telemetry bus.

pub mod ai;
pub mod announce;
pub mod app;
pub mod error;
pub mod image;
pub mod models;
pub mod playback;
pub mod prompts;
pub mod telemetry;
pub mod watcher;

pub use error::{Error, Result};
