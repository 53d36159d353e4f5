//! Vision inference services
//!
//! Provides the interface to the remote vision-language endpoint used to
//! analyze batches of captured frames for emergencies.

pub mod mock;
pub mod openai;

pub use mock::MockVisionClient;
pub use openai::OpenAiVisionClient;

use crate::models::InferenceReport;
use async_trait::async_trait;
use std::path::PathBuf;

#[async_trait]
pub trait VisionService: Send + Sync {
    /// Analyze a batch of local image files, optionally steered by extra
    /// prompt text. Failures are carried on the report, never raised.
    async fn analyze(&self, image_paths: &[PathBuf], extra_prompt: &str) -> InferenceReport;
}
