//! Data models and structures
//!
//! Defines the emergency classification, the parsed vision analysis, the
//! staged inference report handed back to the watch loop, and runtime
//! configuration loaded from the environment.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of emergency classifications the model may return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emergency {
    FallenPerson,
    Fire,
    MedicalEmergency,
    Other,
    #[default]
    None,
}

impl Emergency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emergency::FallenPerson => "fallen_person",
            Emergency::Fire => "fire",
            Emergency::MedicalEmergency => "medical_emergency",
            Emergency::Other => "other",
            Emergency::None => "none",
        }
    }

    pub fn is_emergency(&self) -> bool {
        !matches!(self, Emergency::None)
    }
}

impl fmt::Display for Emergency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured analysis parsed from the model's JSON reply.
///
/// Every field is defaulted so a sparse but well-formed object still parses;
/// unknown fields (the prompt also asks for an image count) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VisionAnalysis {
    #[serde(default)]
    pub image_contents: String,
    #[serde(default)]
    pub image_contents_localized: String,
    #[serde(default)]
    pub emergency: Emergency,
    #[serde(default)]
    pub help_needed: bool,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

/// Stage of the inference call at which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    RequestSend,
    StreamReceive,
    Parse,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::RequestSend => "request-send",
            FailureStage::StreamReceive => "stream-receive",
            FailureStage::Parse => "parse",
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct StageFailure {
    pub stage: FailureStage,
    pub message: String,
}

/// Outcome of one vision inference call.
///
/// Failures are recorded rather than thrown, and successive stages can each
/// add one: a mid-stream error still leaves partial text worth a parse
/// attempt, so a single report may carry both a stream-receive and a parse
/// failure. Callers must check [`InferenceReport::is_ok`] (or inspect
/// `failures`) before trusting `analysis`.
#[derive(Debug, Clone, Default)]
pub struct InferenceReport {
    pub analysis: Option<VisionAnalysis>,
    pub raw_reply: String,
    pub failures: Vec<StageFailure>,
}

impl InferenceReport {
    pub fn record(&mut self, stage: FailureStage, message: impl Into<String>) {
        self.failures.push(StageFailure {
            stage,
            message: message.into(),
        });
    }

    pub fn failed_at(&self, stage: FailureStage) -> bool {
        self.failures.iter().any(|f| f.stage == stage)
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty() && self.analysis.is_some()
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Only required when the vision service is enabled; the client
    /// constructor validates presence.
    pub ai_api_key: Option<String>,
    pub ai_base_url: String,
    pub vision_model: String,
    pub request_timeout_secs: u64,
    pub localized_language: String,
    pub mqtt_topic_prefix: String,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            ai_api_key: std::env::var("AI_API_KEY").ok(),
            ai_base_url: std::env::var("AI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".to_string()),
            vision_model: std::env::var("VISION_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(111),
            localized_language: std::env::var("LOCALIZED_LANGUAGE")
                .unwrap_or_else(|_| "czech".to_string()),
            mqtt_topic_prefix: std::env::var("MQTT_TOPIC_PREFIX")
                .unwrap_or_else(|_| "home".to_string()),
        })
    }
}
