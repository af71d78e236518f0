//! Backend trait and the request/response shapes of the assistant endpoints

use async_trait::async_trait;
use crmai_common::{AssistError, AudioPayload, Result, TRANSCRIPTION_ERROR_MARKER};
use crmai_stream::ByteStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /ai/stream-chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub page_context: String,
}

/// Body of `POST /ai/text-to-speech` responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpeechResponse {
    #[serde(default)]
    pub success: bool,
    /// Base64-encoded audio bytes
    pub audio_data: Option<String>,
    /// Container format of `audio_data`, `wav` when absent
    pub audio_format: Option<String>,
    pub error: Option<String>,
}

impl SpeechResponse {
    pub fn mime_type(&self) -> String {
        format!("audio/{}", self.audio_format.as_deref().unwrap_or("wav"))
    }
}

/// Body of `POST /ai/voice-input` responses
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(default)]
    pub success: bool,
    pub transcription: Option<String>,
    pub error: Option<String>,
}

impl TranscriptionResponse {
    /// The transcribed text, or the server's reason for not having one
    pub fn into_text(self) -> Result<String> {
        let text = self
            .transcription
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        match (self.success, text) {
            (true, Some(text)) => Ok(text),
            _ => Err(AssistError::Transcription(
                self.error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| TRANSCRIPTION_ERROR_MARKER.to_string()),
            )),
        }
    }
}

/// Kinds of canned analysis offered by `GET /ai/quick-analysis`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    #[default]
    General,
    Performance,
    Trends,
    Opportunities,
}

impl AnalysisKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::General => "general",
            AnalysisKind::Performance => "performance",
            AnalysisKind::Trends => "trends",
            AnalysisKind::Opportunities => "opportunities",
        }
    }

    /// Unknown names fall back to a general analysis, as the server does.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "performance" => AnalysisKind::Performance,
            "trends" => AnalysisKind::Trends,
            "opportunities" => AnalysisKind::Opportunities,
            _ => AnalysisKind::General,
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The assistant endpoints a session talks to
#[async_trait]
pub trait AssistantBackend: Send + Sync {
    /// `GET /ai/suggestions?page=<ctx>`
    async fn suggestions(&self, page_context: &str) -> Result<Vec<String>>;

    /// `POST /ai/stream-chat`; the body is returned unparsed.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ByteStream>;

    /// `POST /ai/text-to-speech`
    async fn text_to_speech(&self, text: &str) -> Result<SpeechResponse>;

    /// `POST /ai/voice-input` with one multipart audio field
    async fn voice_input(&self, audio: AudioPayload) -> Result<TranscriptionResponse>;

    /// `GET /ai/quick-analysis?type=<t>&days=<n>`; `None` when the server had nothing.
    async fn quick_analysis(&self, kind: AnalysisKind, days: u32) -> Result<Option<String>>;
}
