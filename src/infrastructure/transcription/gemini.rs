//! Gemini API transcription engine adapter

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chrono::Utc;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ports::{
    AudioInput, EngineError, EngineProgress, ProgressSink, TranscriptionEngine,
};
use crate::domain::job::{JobSettings, ProcessingStage, Transcript, TranscriptMetadata};

/// Gemini API model to use
const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

/// Gemini API base URL
const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

const BASE_PROMPT: &str = "Transcribe the spoken audio verbatim. \
Return only the transcript text, without timestamps, speaker labels or commentary.";

// Request types for Gemini API

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: Option<SystemInstruction>,
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
struct TextPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: i32,
}

// Response types for Gemini API

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Gemini API transcription engine
pub struct GeminiEngine {
    api_key: String,
    model: String,
    base_url: String,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl GeminiEngine {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: API_BASE_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// HTTP deadline for one request; an expired request maps to `Timeout`
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Point at a different API root (used by tests against a mock server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self) -> String {
        format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    fn prompt(settings: &JobSettings) -> String {
        if settings.auto_language() {
            BASE_PROMPT.to_string()
        } else {
            format!(
                "{} The audio is in language \"{}\".",
                BASE_PROMPT, settings.language
            )
        }
    }

    fn build_request(mime_type: &str, audio: &[u8], settings: &JobSettings) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: mime_type.to_string(),
                        data: base64::engine::general_purpose::STANDARD.encode(audio),
                    }),
                }],
            }],
            system_instruction: Some(SystemInstruction {
                parts: vec![TextPart {
                    text: Self::prompt(settings),
                }],
            }),
            generation_config: Some(GenerationConfig {
                thinking_config: Some(ThinkingConfig {
                    thinking_budget: 0, // Disable thinking for faster response
                }),
            }),
        }
    }

    fn extract_text(response: &GenerateContentResponse) -> Option<String> {
        let parts: Vec<&str> = response
            .candidates
            .as_ref()?
            .first()?
            .content
            .as_ref()?
            .parts
            .as_ref()?
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(""))
        }
    }

    async fn load_audio(input: &AudioInput) -> Result<Vec<u8>, EngineError> {
        match input {
            AudioInput::File(file) => tokio::fs::read(file.path()).await.map_err(|e| {
                EngineError::Internal(format!("Failed to read {}: {}", file.name(), e))
            }),
            AudioInput::Chunk { data, .. } => Ok(data.clone()),
        }
    }
}

#[async_trait]
impl TranscriptionEngine for GeminiEngine {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn transcribe(
        &self,
        input: &AudioInput,
        settings: &JobSettings,
        on_progress: Option<ProgressSink>,
    ) -> Result<Transcript, EngineError> {
        let report = |stage: ProcessingStage, percent: f64, message: &str| {
            if let Some(sink) = &on_progress {
                sink(EngineProgress {
                    stage,
                    percent: Some(percent),
                    message: Some(message.to_string()),
                    ..Default::default()
                });
            }
        };

        report(ProcessingStage::Preprocessing, 10.0, "Encoding audio");
        let audio = Self::load_audio(input).await?;
        let body = Self::build_request(input.format().mime_type(), &audio, settings);
        drop(audio);

        report(ProcessingStage::Transcribing, 25.0, "Waiting for Gemini");
        debug!(model = %self.model, "sending transcription request");
        let response = self
            .client
            .post(self.api_url())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EngineError::Timeout
                } else {
                    EngineError::EngineUnavailable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, input));
        }

        let response: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| EngineError::Internal(format!("Malformed response: {}", e)))?;

        if let Some(error) = response.error {
            return Err(EngineError::Internal(error.message));
        }

        let text = Self::extract_text(&response)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EngineError::Internal("Empty response".to_string()))?;

        report(ProcessingStage::Saving, 100.0, "Transcription complete");

        Ok(Transcript {
            text,
            metadata: TranscriptMetadata {
                language: settings.language.clone(),
                model_size: settings.model_size,
                timestamp: Utc::now(),
                chunks: 1,
            },
            confidence: None,
        })
    }
}

/// Map a non-success HTTP status onto the engine error taxonomy.
/// Auth and quota failures stay retryable.
fn status_error(status: StatusCode, body: &str, input: &AudioInput) -> EngineError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            EngineError::EngineUnavailable("Invalid API key".to_string())
        }
        StatusCode::TOO_MANY_REQUESTS => EngineError::EngineUnavailable("Rate limited".to_string()),
        StatusCode::UNSUPPORTED_MEDIA_TYPE => {
            EngineError::UnsupportedFormat(input.format().mime_type().to_string())
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => EngineError::Timeout,
        _ => {
            let detail = serde_json::from_str::<GenerateContentResponse>(body)
                .ok()
                .and_then(|r| r.error)
                .map(|e| e.message)
                .unwrap_or_else(|| body.trim().to_string());
            EngineError::Internal(format!("HTTP {}: {}", status, detail))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_request_has_correct_structure() {
        let request = GeminiEngine::build_request("audio/wav", &[1, 2, 3], &JobSettings::default());

        assert_eq!(request.contents.len(), 1);
        assert_eq!(request.contents[0].role, "user");
        let inline = request.contents[0].parts[0].inline_data.as_ref().unwrap();
        assert_eq!(inline.mime_type, "audio/wav");
        assert_eq!(inline.data, "AQID");
        assert!(request.system_instruction.is_some());
        assert!(request.generation_config.is_some());
    }

    #[test]
    fn prompt_mentions_explicit_language() {
        let settings = JobSettings {
            language: "fr".to_string(),
            ..Default::default()
        };
        assert!(GeminiEngine::prompt(&settings).contains("\"fr\""));
        assert_eq!(GeminiEngine::prompt(&JobSettings::default()), BASE_PROMPT);
    }

    #[test]
    fn api_url_contains_model_and_key() {
        let url = GeminiEngine::new("test-api-key").api_url();

        assert!(url.contains("gemini-2.0-flash-lite"));
        assert!(url.contains("test-api-key"));
        assert!(url.contains("generateContent"));
    }

    #[test]
    fn custom_model_and_base_url() {
        let url = GeminiEngine::new("key")
            .with_model("custom-model")
            .with_base_url("http://localhost:9999/")
            .api_url();

        assert_eq!(url, "http://localhost:9999/custom-model:generateContent?key=key");
    }

    #[test]
    fn extract_text_joins_parts() {
        let response = GenerateContentResponse {
            candidates: Some(vec![Candidate {
                content: Some(CandidateContent {
                    parts: Some(vec![
                        ResponsePart {
                            text: Some("Hello ".to_string()),
                        },
                        ResponsePart {
                            text: Some("world".to_string()),
                        },
                    ]),
                }),
            }]),
            error: None,
        };

        assert_eq!(
            GeminiEngine::extract_text(&response),
            Some("Hello world".to_string())
        );
    }

    #[test]
    fn extract_text_empty_response() {
        let response = GenerateContentResponse {
            candidates: None,
            error: None,
        };

        assert!(GeminiEngine::extract_text(&response).is_none());
    }

    #[test]
    fn status_errors_map_onto_engine_errors() {
        let input = AudioInput::Chunk {
            data: Vec::new(),
            format: crate::domain::audio::AudioFormat::Mp3,
            index: 0,
            total: 1,
        };

        assert_eq!(
            status_error(StatusCode::FORBIDDEN, "", &input),
            EngineError::EngineUnavailable("Invalid API key".to_string())
        );
        assert_eq!(
            status_error(StatusCode::UNSUPPORTED_MEDIA_TYPE, "", &input),
            EngineError::UnsupportedFormat("audio/mp3".to_string())
        );
        assert_eq!(
            status_error(StatusCode::GATEWAY_TIMEOUT, "", &input),
            EngineError::Timeout
        );

        let body = r#"{"error": {"message": "quota project missing"}}"#;
        assert_eq!(
            status_error(StatusCode::BAD_REQUEST, body, &input),
            EngineError::Internal("HTTP 400 Bad Request: quota project missing".to_string())
        );
    }
}
