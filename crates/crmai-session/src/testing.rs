//! In-memory collaborators for session tests

use crate::playback::{AudioClip, AudioSink};
use crate::recording::{AudioCapture, CaptureHandle};
use async_trait::async_trait;
use crmai_client::{
    AnalysisKind, AssistantBackend, ChatRequest, SpeechResponse, TranscriptionResponse,
};
use crmai_common::{AssistError, AudioPayload, Result};
use crmai_stream::ByteStream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

pub(crate) type BodySender = mpsc::UnboundedSender<Result<Vec<u8>>>;

pub(crate) fn record(value: serde_json::Value) -> Vec<u8> {
    format!("data: {}\n", value).into_bytes()
}

pub(crate) fn chunk_line(content: &str) -> Vec<u8> {
    record(json!({"type": "chunk", "content": content}))
}

pub(crate) fn end_line() -> Vec<u8> {
    record(json!({"type": "end", "timestamp": "2024-01-01T00:00:00"}))
}

pub(crate) fn error_line(message: &str) -> Vec<u8> {
    record(json!({"type": "error", "message": message}))
}

enum ChatReply {
    Body(Vec<Vec<u8>>),
    Channel(mpsc::UnboundedReceiver<Result<Vec<u8>>>),
    Fail(AssistError),
}

/// Scripted backend; every call is recorded
#[derive(Default)]
pub(crate) struct MockBackend {
    chat_replies: Mutex<VecDeque<ChatReply>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    suggestions: Mutex<Option<Vec<String>>>,
    suggestion_pages: Mutex<Vec<String>>,
    speech: Mutex<Option<SpeechResponse>>,
    speech_requests: Mutex<Vec<String>>,
    transcription: Mutex<Option<TranscriptionResponse>>,
    uploads: Mutex<Vec<AudioPayload>>,
    analysis: Mutex<Option<Option<String>>>,
    analysis_requests: Mutex<Vec<(AnalysisKind, u32)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        let backend = Self::default();
        *backend.suggestions.lock() = Some(Vec::new());
        backend
    }

    /// Queue a complete response body, delivered as the given fragments.
    pub fn push_body(&self, fragments: Vec<Vec<u8>>) {
        self.chat_replies.lock().push_back(ChatReply::Body(fragments));
    }

    /// Queue a response whose fragments are fed by the test.
    pub fn push_channel(&self) -> BodySender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.chat_replies.lock().push_back(ChatReply::Channel(rx));
        tx
    }

    pub fn push_failure(&self, error: AssistError) {
        self.chat_replies.lock().push_back(ChatReply::Fail(error));
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        self.chat_requests.lock().clone()
    }

    pub fn set_suggestions(&self, items: Vec<&str>) {
        *self.suggestions.lock() = Some(items.into_iter().map(str::to_string).collect());
    }

    pub fn fail_suggestions(&self) {
        *self.suggestions.lock() = None;
    }

    pub fn suggestion_pages(&self) -> Vec<String> {
        self.suggestion_pages.lock().clone()
    }

    pub fn set_speech(&self, response: SpeechResponse) {
        *self.speech.lock() = Some(response);
    }

    pub fn speech_requests(&self) -> Vec<String> {
        self.speech_requests.lock().clone()
    }

    pub fn set_transcription(&self, response: TranscriptionResponse) {
        *self.transcription.lock() = Some(response);
    }

    pub fn uploads(&self) -> Vec<AudioPayload> {
        self.uploads.lock().clone()
    }

    pub fn set_analysis(&self, analysis: Option<&str>) {
        *self.analysis.lock() = Some(analysis.map(str::to_string));
    }

    pub fn analysis_requests(&self) -> Vec<(AnalysisKind, u32)> {
        self.analysis_requests.lock().clone()
    }
}

#[async_trait]
impl AssistantBackend for MockBackend {
    async fn suggestions(&self, page_context: &str) -> Result<Vec<String>> {
        self.suggestion_pages.lock().push(page_context.to_string());
        self.suggestions
            .lock()
            .clone()
            .ok_or_else(|| AssistError::Transport("suggestions unavailable".to_string()))
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<ByteStream> {
        self.chat_requests.lock().push(request.clone());
        let reply = self.chat_replies.lock().pop_front();
        match reply {
            Some(ChatReply::Body(fragments)) => {
                Ok(futures_util::stream::iter(fragments.into_iter().map(Ok)).boxed())
            }
            Some(ChatReply::Channel(rx)) => Ok(UnboundedReceiverStream::new(rx).boxed()),
            Some(ChatReply::Fail(error)) => Err(error),
            None => Err(AssistError::Transport("no response scripted".to_string())),
        }
    }

    async fn text_to_speech(&self, text: &str) -> Result<SpeechResponse> {
        self.speech_requests.lock().push(text.to_string());
        self.speech
            .lock()
            .clone()
            .ok_or_else(|| AssistError::Transport("speech unavailable".to_string()))
    }

    async fn voice_input(&self, audio: AudioPayload) -> Result<TranscriptionResponse> {
        self.uploads.lock().push(audio);
        self.transcription
            .lock()
            .clone()
            .ok_or_else(|| AssistError::Transport("connection reset".to_string()))
    }

    async fn quick_analysis(&self, kind: AnalysisKind, days: u32) -> Result<Option<String>> {
        self.analysis_requests.lock().push((kind, days));
        self.analysis
            .lock()
            .clone()
            .ok_or_else(|| AssistError::Status {
                endpoint: "/ai/quick-analysis".to_string(),
                status: 500,
            })
    }
}

/// Microphone that yields a fixed set of fragments
pub(crate) struct MockCapture {
    fragments: Vec<Vec<u8>>,
    deny: bool,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    opens: AtomicUsize,
    releases: Arc<AtomicUsize>,
}

impl MockCapture {
    pub fn new<F: AsRef<[u8]>>(fragments: impl IntoIterator<Item = F>) -> Self {
        Self {
            fragments: fragments.into_iter().map(|f| f.as_ref().to_vec()).collect(),
            deny: false,
            gate: Mutex::new(None),
            opens: AtomicUsize::new(0),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::new(Vec::<Vec<u8>>::new())
        }
    }

    /// Make the next `open` wait until the returned sender fires.
    pub fn hold_open(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock() = Some(rx);
        tx
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioCapture for MockCapture {
    async fn open(&self) -> anyhow::Result<Box<dyn CaptureHandle>> {
        if self.deny {
            anyhow::bail!("permission denied");
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(Box::new(MockHandle {
            pending: self.fragments.clone().into(),
            releases: self.releases.clone(),
            released: false,
        }))
    }
}

struct MockHandle {
    pending: VecDeque<Vec<u8>>,
    releases: Arc<AtomicUsize>,
    released: bool,
}

impl CaptureHandle for MockHandle {
    fn take_fragments(&mut self) -> Vec<Vec<u8>> {
        self.pending.drain(..).collect()
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Output device that records what it played
#[derive(Default)]
pub(crate) struct MockSink {
    played: Mutex<Vec<AudioClip>>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<AudioClip> {
        self.played.lock().clone()
    }
}

#[async_trait]
impl AudioSink for MockSink {
    async fn play(&self, clip: &AudioClip) -> anyhow::Result<()> {
        self.played.lock().push(clip.clone());
        Ok(())
    }
}

/// Let spawned tasks run until `condition` holds. Does not advance time.
pub(crate) async fn settle(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

pub(crate) fn drain_events(
    rx: &mut tokio::sync::broadcast::Receiver<crate::events::SessionEvent>,
) -> Vec<crate::events::SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
