use super::client::OpenAiHttpClient;
use super::messages::{build_user_message, BuildOptions};
use super::types::{ChatCompletionChunk, ChatCompletionRequest, ChatMessage, MessageContent, ResponseFormat};
use crate::ai::VisionService;
use crate::models::{Config, FailureStage, InferenceReport, VisionAnalysis};
use crate::prompts;
use crate::Error;
use async_trait::async_trait;
use futures_util::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const DEFAULT_TIMEOUT_SECS: u64 = 111;
const MAX_IMAGE_SIZE_PX: u32 = 1024;
const MAX_REPLY_TOKENS: u32 = 500;

/// Vision-language client for the OpenAI chat-completions endpoint.
///
/// One call per invocation, streamed delivery, JSON-object output. Failures
/// at any stage are recorded on the returned [`InferenceReport`] instead of
/// propagating; retry policy, if any, belongs to the caller.
pub struct OpenAiVisionClient {
    http: OpenAiHttpClient,
    model: String,
    localized_language: String,
}

impl OpenAiVisionClient {
    pub fn new(api_key: String, model: String, localized_language: String) -> Self {
        Self {
            http: OpenAiHttpClient::new(api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            model,
            localized_language,
        }
    }

    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let api_key = config
            .ai_api_key
            .clone()
            .ok_or_else(|| Error::Config("AI_API_KEY not set".to_string()))?;

        Ok(Self {
            http: OpenAiHttpClient::new(api_key, Duration::from_secs(config.request_timeout_secs))
                .with_base_url(config.ai_base_url.clone()),
            model: config.vision_model.clone(),
            localized_language: config.localized_language.clone(),
        })
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.http = self.http.with_base_url(base_url);
        self
    }

    fn build_request(&self, image_paths: &[PathBuf], extra_prompt: &str) -> ChatCompletionRequest {
        let user_text = format!(
            "{}\n{}",
            prompts::render(
                prompts::VISION_USER,
                &[("language", &self.localized_language)],
            )
            .trim(),
            extra_prompt
        )
        .trim()
        .to_string();

        let system = ChatMessage {
            role: "system".to_string(),
            content: MessageContent::Text(prompts::VISION_SYSTEM.trim().to_string()),
        };

        // Prior user/assistant turns would splice in here; every call is
        // currently a fresh conversation.
        let history: Vec<ChatMessage> = Vec::new();

        let mut messages = vec![system];
        messages.extend(history);
        messages.extend(build_user_message(
            &user_text,
            image_paths,
            &BuildOptions {
                max_size_px: MAX_IMAGE_SIZE_PX,
                ..Default::default()
            },
        ));

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: 0.0,
            top_p: 0.5,
            max_tokens: MAX_REPLY_TOKENS,
            stream: true,
            response_format: Some(ResponseFormat::json_object()),
        }
    }

    /// Drain the SSE stream, appending text fragments to the report's raw
    /// reply in arrival order. A mid-stream error stops consumption and is
    /// recorded, keeping whatever already accumulated.
    async fn collect_reply(response: reqwest::Response, report: &mut InferenceReport) {
        let mut upstream = response.bytes_stream();
        let mut buffer = String::new();
        let mut chunk_no = 0usize;
        let mut stopped = false;

        'receive: while let Some(next) = upstream.next().await {
            let bytes = match next {
                Ok(bytes) => bytes,
                Err(e) => {
                    report.record(FailureStage::StreamReceive, e.to_string());
                    stopped = true;
                    break;
                }
            };

            let text = match std::str::from_utf8(&bytes) {
                Ok(text) => text,
                Err(e) => {
                    report.record(FailureStage::StreamReceive, e.to_string());
                    stopped = true;
                    break;
                }
            };

            buffer.push_str(text);

            while let Some(index) = buffer.find('\n') {
                let line = buffer[..index].trim().to_owned();
                buffer.drain(..=index);
                if Self::handle_line(&line, report, &mut chunk_no) {
                    stopped = true;
                    break 'receive;
                }
            }
        }

        // Some servers end the stream without a trailing newline; whatever
        // is left in the buffer is then a complete final line that must not
        // be dropped. Skipped after an abnormal stop, where the remainder is
        // a partial line at best.
        if !stopped {
            let tail = buffer.trim();
            if !tail.is_empty() {
                Self::handle_line(tail, report, &mut chunk_no);
            }
        }
    }

    /// Process one SSE line, appending any text fragment it carries.
    /// Returns true when consumption must stop (terminator or bad chunk).
    fn handle_line(line: &str, report: &mut InferenceReport, chunk_no: &mut usize) -> bool {
        if line.is_empty() {
            return false;
        }

        let Some(payload) = line.strip_prefix("data:") else {
            return false;
        };
        let payload = payload.trim();

        if payload == "[DONE]" {
            return true;
        }

        let chunk: ChatCompletionChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                report.record(
                    FailureStage::StreamReceive,
                    format!("undecodable chunk: {}", e),
                );
                return true;
            }
        };

        if let Some(content) = chunk
            .choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
        {
            if !content.is_empty() {
                report.raw_reply.push_str(content);
                tracing::debug!("chunk {}: {}", chunk_no, content);
            }
        }
        *chunk_no += 1;
        false
    }
}

#[async_trait]
impl VisionService for OpenAiVisionClient {
    async fn analyze(&self, image_paths: &[PathBuf], extra_prompt: &str) -> InferenceReport {
        let mut report = InferenceReport::default();

        let start = Instant::now();
        let request = self.build_request(image_paths, extra_prompt);
        tracing::debug!(
            "preparation elapsed: {:.2} seconds",
            start.elapsed().as_secs_f64()
        );

        let start = Instant::now();
        let response = match self.http.post_stream("/v1/chat/completions", &request).await {
            Ok(response) => response,
            Err(e) => {
                // Terminal for this call: no bytes arrived, nothing to parse.
                report.record(FailureStage::RequestSend, e.to_string());
                return report;
            }
        };

        Self::collect_reply(response, &mut report).await;
        tracing::debug!(
            "inference elapsed: {:.2} seconds",
            start.elapsed().as_secs_f64()
        );

        // A truncated stream sometimes still carries the whole object, so the
        // parse runs even after a stream-receive failure.
        match serde_json::from_str::<VisionAnalysis>(&report.raw_reply) {
            Ok(analysis) => report.analysis = Some(analysis),
            Err(e) => report.record(FailureStage::Parse, e.to_string()),
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Emergency;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_body(fragments: &[&str], done: bool) -> String {
        let mut body = String::new();
        for fragment in fragments {
            let chunk = serde_json::json!({
                "choices": [{"delta": {"content": fragment}, "index": 0}]
            });
            body.push_str(&format!("data: {}\n\n", chunk));
        }
        if done {
            body.push_str("data: [DONE]\n\n");
        }
        body
    }

    fn client(base_url: String) -> OpenAiVisionClient {
        OpenAiVisionClient::new(
            "test-key".to_string(),
            "gpt-4o-mini".to_string(),
            "czech".to_string(),
        )
        .with_base_url(base_url)
    }

    #[tokio::test]
    async fn test_fragments_accumulate_in_order_and_parse() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(sse_body(&["{\"a\"", ":1}"], true)),
            )
            .mount(&server)
            .await;

        let report = client(server.uri()).analyze(&[], "").await;

        assert_eq!(report.raw_reply, "{\"a\":1}");
        assert!(report.failures.is_empty());
        let analysis = report.analysis.unwrap();
        assert_eq!(analysis.emergency, Emergency::None);
    }

    #[tokio::test]
    async fn test_reply_without_trailing_newline_is_kept() {
        let server = MockServer::start().await;

        // Final data line arrives with no newline and no [DONE] terminator.
        let chunk = serde_json::json!({
            "choices": [{"delta": {"content": "{\"help_needed\":true}"}, "index": 0}]
        });
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("data: {}", chunk)))
            .mount(&server)
            .await;

        let report = client(server.uri()).analyze(&[], "").await;

        assert_eq!(report.raw_reply, "{\"help_needed\":true}");
        assert!(report.failures.is_empty());
        assert!(report.analysis.unwrap().help_needed);
    }

    #[tokio::test]
    async fn test_full_reply_parses_to_analysis() {
        let server = MockServer::start().await;

        let reply = serde_json::json!({
            "image_count": 1,
            "image_contents": "Flames climbing a curtain",
            "image_contents_localized": "Plameny šplhají po záclonách",
            "emergency": "fire",
            "help_needed": true,
            "explanation": "Open fire spreading indoors",
            "action": "Pull the curtain down and smother the flames"
        })
        .to_string();

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&[reply.as_str()], true)))
            .mount(&server)
            .await;

        let report = client(server.uri()).analyze(&[], "").await;

        assert!(report.is_ok());
        let analysis = report.analysis.unwrap();
        assert_eq!(analysis.emergency, Emergency::Fire);
        assert!(analysis.help_needed);
        assert_eq!(analysis.image_contents, "Flames climbing a curtain");
    }

    #[tokio::test]
    async fn test_request_carries_fixed_sampling_parameters() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_string_contains("\"temperature\":0.0"))
            .and(body_string_contains("\"top_p\":0.5"))
            .and(body_string_contains("\"max_tokens\":500"))
            .and(body_string_contains("\"stream\":true"))
            .and(body_string_contains("\"response_format\":{\"type\":\"json_object\"}"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&["{}"], true)))
            .expect(1)
            .mount(&server)
            .await;

        let report = client(server.uri()).analyze(&[], "").await;
        assert!(report.is_ok());
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = Config {
            ai_api_key: None,
            ai_base_url: "https://api.openai.com".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            request_timeout_secs: 111,
            localized_language: "czech".to_string(),
            mqtt_topic_prefix: "home".to_string(),
        };
        assert!(matches!(
            OpenAiVisionClient::from_config(&config),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_final_turn_is_user_role() {
        let c = client("http://unused".to_string());
        let request = c.build_request(&[], "extra instructions");

        assert!(!request.messages.is_empty());
        assert_eq!(request.messages.first().unwrap().role, "system");
        assert_eq!(request.messages.last().unwrap().role, "user");

        let json = serde_json::to_value(&request).unwrap();
        let user_content = &json["messages"][1]["content"][0];
        assert!(user_content.as_str().unwrap().contains("extra instructions"));
        assert!(user_content.as_str().unwrap().contains("czech"));
    }

    #[tokio::test]
    async fn test_malformed_reply_records_parse_failure_with_raw_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(sse_body(&["{\"emergency\": \"fi"], true)),
            )
            .mount(&server)
            .await;

        let report = client(server.uri()).analyze(&[], "").await;

        assert!(report.failed_at(FailureStage::Parse));
        assert!(report.analysis.is_none());
        assert_eq!(report.raw_reply, "{\"emergency\": \"fi");
    }

    #[tokio::test]
    async fn test_undecodable_chunk_records_stream_failure_but_still_parses() {
        let server = MockServer::start().await;

        let mut body = sse_body(&["{\"help_needed\":true}"], false);
        body.push_str("data: this is not json\n\n");
        body.push_str(&sse_body(&["{\"never\":\"appended\"}"], true));

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let report = client(server.uri()).analyze(&[], "").await;

        // Stream failure recorded, accumulation stopped, partial text parsed.
        assert!(report.failed_at(FailureStage::StreamReceive));
        assert_eq!(report.raw_reply, "{\"help_needed\":true}");
        assert!(report.analysis.unwrap().help_needed);
    }

    #[tokio::test]
    async fn test_connection_refused_records_request_send_failure() {
        // Nothing listens on this port.
        let report = client("http://127.0.0.1:9".to_string()).analyze(&[], "").await;

        assert!(report.failed_at(FailureStage::RequestSend));
        assert!(!report.failed_at(FailureStage::Parse));
        assert!(report.raw_reply.is_empty());
        assert!(report.analysis.is_none());
    }

    #[tokio::test]
    async fn test_api_error_status_is_a_send_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let report = client(server.uri()).analyze(&[], "").await;

        assert!(report.failed_at(FailureStage::RequestSend));
        assert!(report.raw_reply.is_empty());
    }
}
