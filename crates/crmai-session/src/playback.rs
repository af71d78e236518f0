//! Spoken playback of short assistant replies

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use crmai_client::AssistantBackend;
use crmai_common::{AssistError, Result, char_len};
use std::sync::Arc;
use tracing::{debug, info};

/// Decoded audio ready for an output device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl AudioClip {
    /// Decode the base64 audio of a speech response.
    pub fn from_base64(data: &str, mime_type: impl Into<String>) -> Result<Self> {
        let bytes = general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| AssistError::Playback(format!("invalid audio data: {}", e)))?;
        if bytes.is_empty() {
            return Err(AssistError::Playback("empty audio data".to_string()));
        }
        Ok(Self {
            bytes,
            mime_type: mime_type.into(),
        })
    }
}

/// Audio output device
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play a clip; resolves once playback has ended.
    async fn play(&self, clip: &AudioClip) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Played,
    /// Text was empty or over the length ceiling; nothing was requested
    NotOffered,
    /// The server produced no audio, with its reason when given
    Unavailable(Option<String>),
}

/// Turns short assistant text into played audio
#[derive(Clone)]
pub struct AudioPlayback {
    backend: Arc<dyn AssistantBackend>,
    sink: Option<Arc<dyn AudioSink>>,
    char_limit: usize,
}

impl AudioPlayback {
    pub fn new(
        backend: Arc<dyn AssistantBackend>,
        sink: Option<Arc<dyn AudioSink>>,
        char_limit: usize,
    ) -> Self {
        Self {
            backend,
            sink,
            char_limit,
        }
    }

    /// Whether `text` may be offered for playback at all
    pub fn is_offered(&self, text: &str) -> bool {
        !text.trim().is_empty() && char_len(text) <= self.char_limit
    }

    pub async fn play_text(&self, text: &str) -> Result<PlaybackOutcome> {
        if !self.is_offered(text) {
            debug!("Playback not offered for {} characters", char_len(text));
            return Ok(PlaybackOutcome::NotOffered);
        }
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| AssistError::Playback("no audio output configured".to_string()))?;

        let response = self.backend.text_to_speech(text).await?;
        if !response.success {
            info!("Speech synthesis declined: {:?}", response.error);
            return Ok(PlaybackOutcome::Unavailable(response.error));
        }
        let mime_type = response.mime_type();
        let Some(data) = response.audio_data.as_deref().filter(|d| !d.trim().is_empty()) else {
            return Ok(PlaybackOutcome::Unavailable(response.error));
        };

        let clip = AudioClip::from_base64(data, mime_type)?;
        sink.play(&clip)
            .await
            .map_err(|e| AssistError::Playback(e.to_string()))?;
        // the clip is the only owner of the decoded audio; it goes away here
        drop(clip);

        Ok(PlaybackOutcome::Played)
    }
}
