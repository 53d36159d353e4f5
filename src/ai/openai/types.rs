//! OpenAI-specific request/response payloads used by the vision client.

use serde::{Deserialize, Serialize};

/// Request body for OpenAI chat completions.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

/// Structured response-format directive for chat completions.
#[derive(Debug, Serialize, Clone)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    /// Require the reply to be a single parseable JSON object.
    pub fn json_object() -> Self {
        Self {
            format_type: "json_object".to_string(),
        }
    }
}

/// Chat message object.
#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

/// Message content union.
///
/// The two image-bearing shapes are the API-reference "content array"
/// convention (`Tiled`) and the alternate plain-marker convention (`Simple`).
/// The shape is chosen once at build time. Variant order matters for
/// `#[serde(untagged)]`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Tiled(Vec<ContentBlock>),
    Simple(Vec<SimplePart>),
}

/// One content segment in multipart (tiled) message input.
#[derive(Debug, Serialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<ImageUrl>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            block_type: "text".to_string(),
            text: Some(text.into()),
            image_url: None,
        }
    }

    pub fn image(url: String, detail: Detail) -> Self {
        Self {
            block_type: "image_url".to_string(),
            text: None,
            image_url: Some(ImageUrl { url, detail }),
        }
    }
}

/// Image URL wrapper carrying the remote-side resolution hint.
#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
    pub detail: Detail,
}

/// Hint for how much resolution the remote model should spend on an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Detail {
    Low,
    High,
}

/// One part of the non-tiled content sequence: the text string followed by
/// untagged image markers.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SimplePart {
    Text(String),
    Image { image: String },
}

// Streaming response payloads.

/// One server-sent chunk of a streamed chat completion.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}
