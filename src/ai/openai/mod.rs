pub mod client;
pub mod messages;
pub mod types;
pub mod vision;

pub use vision::OpenAiVisionClient;
