//! The streaming chat session
//!
//! A [`ChatSession`] owns the conversation log and the Idle/Sending/Recording
//! state machine. At most one send or one recording runs at a time; every
//! change is broadcast as a [`SessionEvent`] while the state lock is held, so
//! subscribers observe changes in the order they happened.

use crate::events::{Intent, SessionEvent};
use crate::log::MessageLog;
use crate::playback::{AudioPlayback, AudioSink, PlaybackOutcome};
use crate::recording::{ActiveRecording, AudioCapture};
use crate::suggestions::SuggestionLoader;
use crmai_client::{AnalysisKind, AssistantBackend, ChatRequest};
use crmai_common::{
    AUDIO_PROCESSING_ERROR_MARKER, AssistError, AudioPayload, MICROPHONE_ALERT, Message,
    MessageId, MessageKind, PageAttributes, RESPONSE_ERROR_MARKER, Result, SessionConfig,
    SessionState, SuggestionSet, truncate_chars, truncate_for_log,
};
use crmai_stream::{EventStream, StreamEvent};
use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

struct SessionCore {
    state: SessionState,
    log: MessageLog,
    suggestions: SuggestionSet,
    suggestions_visible: bool,
    page: PageAttributes,
    recording: Option<ActiveRecording>,
    generation: u64,
    /// The microphone is being opened
    acquiring: bool,
    /// A stop arrived while the microphone was being opened
    stop_requested: bool,
    shut_down: bool,
}

struct Shared {
    config: SessionConfig,
    backend: Arc<dyn AssistantBackend>,
    capture: Option<Arc<dyn AudioCapture>>,
    playback: AudioPlayback,
    suggestions: SuggestionLoader,
    core: Mutex<SessionCore>,
    events: broadcast::Sender<SessionEvent>,
}

impl Shared {
    fn emit(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn set_state(&self, core: &mut SessionCore, state: SessionState) {
        if core.state != state {
            debug!("Session state {} -> {}", core.state, state);
            core.state = state;
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    fn typing(&self, active: bool, status: Option<String>) {
        self.emit(SessionEvent::Typing { active, status });
    }

    fn append(&self, message: Message) {
        let mut core = self.core.lock();
        core.log.push(message.clone());
        self.emit(SessionEvent::MessageAppended(message));
    }

    fn updated(&self, message: &Message) {
        self.emit(SessionEvent::MessageUpdated {
            id: message.id.clone(),
            text: message.text.clone(),
            kind: message.kind,
        });
    }
}

/// Builder for [`ChatSession`]
pub struct SessionBuilder {
    backend: Arc<dyn AssistantBackend>,
    config: SessionConfig,
    page: PageAttributes,
    capture: Option<Arc<dyn AudioCapture>>,
    sink: Option<Arc<dyn AudioSink>>,
}

impl SessionBuilder {
    pub fn new(backend: Arc<dyn AssistantBackend>) -> Self {
        Self {
            backend,
            config: SessionConfig::default(),
            page: PageAttributes::default(),
            capture: None,
            sink: None,
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_page(mut self, page: PageAttributes) -> Self {
        self.page = page;
        self
    }

    pub fn with_capture(mut self, capture: Arc<dyn AudioCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn AudioSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<ChatSession> {
        self.config.validate()?;

        let (events, _) = broadcast::channel(self.config.event_buffer);
        let playback = AudioPlayback::new(
            self.backend.clone(),
            self.sink,
            self.config.playback_char_limit,
        );
        let shared = Shared {
            suggestions: SuggestionLoader::new(self.backend.clone()),
            playback,
            backend: self.backend,
            capture: self.capture,
            core: Mutex::new(SessionCore {
                state: SessionState::Idle,
                log: MessageLog::new(),
                suggestions: SuggestionSet::empty(),
                suggestions_visible: true,
                page: self.page,
                recording: None,
                generation: 0,
                acquiring: false,
                stop_requested: false,
                shut_down: false,
            }),
            events,
            config: self.config,
        };

        Ok(ChatSession {
            shared: Arc::new(shared),
        })
    }
}

/// Resets a send back to Idle however the send ends
struct SendingGuard {
    shared: Arc<Shared>,
    placeholder: MessageId,
}

impl Drop for SendingGuard {
    fn drop(&mut self) {
        let mut core = self.shared.core.lock();
        // a send abandoned mid-stream keeps what it received so far
        if let Some(message) = core.log.finalize(&self.placeholder) {
            self.shared.updated(message);
        }
        if core.state == SessionState::Sending {
            self.shared.set_state(&mut core, SessionState::Idle);
        }
        drop(core);
        self.shared.typing(false, None);
    }
}

/// Clears the acquisition flags however `start_recording` ends
struct AcquireGuard {
    shared: Arc<Shared>,
}

impl Drop for AcquireGuard {
    fn drop(&mut self) {
        let mut core = self.shared.core.lock();
        core.acquiring = false;
        core.stop_requested = false;
    }
}

/// A chat session bound to one page. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ChatSession {
    shared: Arc<Shared>,
}

impl ChatSession {
    pub fn builder(backend: Arc<dyn AssistantBackend>) -> SessionBuilder {
        SessionBuilder::new(backend)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Notifications as a stream; lagging subscribers see `Err` items.
    pub fn event_stream(&self) -> BroadcastStream<SessionEvent> {
        BroadcastStream::new(self.subscribe())
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        self.shared.core.lock().state
    }

    pub fn messages(&self) -> Vec<Message> {
        self.shared.core.lock().log.snapshot()
    }

    pub fn message(&self, id: &MessageId) -> Option<Message> {
        self.shared.core.lock().log.get(id).cloned()
    }

    pub fn suggestions(&self) -> SuggestionSet {
        self.shared.core.lock().suggestions.clone()
    }

    pub fn suggestions_visible(&self) -> bool {
        self.shared.core.lock().suggestions_visible
    }

    pub fn page(&self) -> PageAttributes {
        self.shared.core.lock().page.clone()
    }

    /// Fetch suggestions for the current page context and publish them.
    pub async fn load_suggestions(&self) {
        let page_context = self.shared.core.lock().page.page_context.clone();
        let set = self.shared.suggestions.load(&page_context).await;

        let mut core = self.shared.core.lock();
        if core.page.page_context != page_context {
            debug!("Page context changed while loading suggestions, dropping result");
            return;
        }
        core.suggestions = set.clone();
        self.shared.emit(SessionEvent::SuggestionsChanged(set));
    }

    fn show_suggestions(&self, core: &mut SessionCore, visible: bool) {
        if core.suggestions_visible != visible {
            core.suggestions_visible = visible;
            self.shared.emit(SessionEvent::SuggestionsVisibility(visible));
        }
    }

    /// Send `text` and stream the reply into a new assistant message.
    ///
    /// Returns `false` without any effect when the text is blank or the
    /// session is not Idle. Text longer than the configured maximum is
    /// truncated.
    pub async fn submit_text(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }
        let text = truncate_chars(text, self.shared.config.max_message_length).to_string();

        let (guard, request) = {
            let mut core = self.shared.core.lock();
            if core.shut_down || core.state != SessionState::Idle {
                debug!("Ignoring send while {}", core.state);
                return false;
            }
            self.shared.set_state(&mut core, SessionState::Sending);

            let user = Message::user(text.clone());
            let placeholder = Message::placeholder();
            let guard = SendingGuard {
                shared: self.shared.clone(),
                placeholder: placeholder.id.clone(),
            };

            core.log.push(user.clone());
            self.shared.emit(SessionEvent::MessageAppended(user));
            core.log.push(placeholder.clone());
            self.shared.emit(SessionEvent::MessageAppended(placeholder));
            self.show_suggestions(&mut core, false);

            let request = ChatRequest {
                message: text,
                page_context: core.page.page_context.clone(),
            };
            (guard, request)
        };

        info!(
            "Sending message for '{}': {}",
            request.page_context,
            truncate_for_log(&request.message, 80)
        );
        self.shared.typing(true, None);

        let id = guard.placeholder.clone();
        match self.stream_reply(&id, &request).await {
            Ok(()) => self.complete_reply(&id),
            Err(e) => {
                warn!("Chat response failed: {}", e);
                let mut core = self.shared.core.lock();
                if let Some(message) = core.log.fail(&id, RESPONSE_ERROR_MARKER) {
                    self.shared.updated(message);
                }
            }
        }

        drop(guard);
        true
    }

    async fn stream_reply(&self, id: &MessageId, request: &ChatRequest) -> Result<()> {
        let body = self.shared.backend.stream_chat(request).await?;
        let mut events = EventStream::new(body);

        while let Some(event) = events.next().await {
            match event? {
                StreamEvent::Start(status) => self.shared.typing(true, status),
                StreamEvent::Chunk(content) => {
                    let mut core = self.shared.core.lock();
                    match core.log.append_chunk(id, &content) {
                        Some(message) => self.shared.updated(message),
                        None => debug!("Dropping chunk for detached message {}", id),
                    }
                }
                StreamEvent::End => break,
                StreamEvent::Error(message) => return Err(AssistError::Stream(message)),
            }
        }

        let stats = events.decoder().stats();
        if stats.malformed > 0 {
            warn!("Skipped {} malformed records in chat response", stats.malformed);
        }
        Ok(())
    }

    fn complete_reply(&self, id: &MessageId) {
        let mut core = self.shared.core.lock();
        let Some(message) = core.log.finalize(id) else {
            return;
        };
        self.shared.updated(message);
        if self.shared.playback.is_offered(&message.text) {
            self.shared
                .emit(SessionEvent::PlaybackOffered { id: id.clone() });
        }
    }

    /// Acquire the microphone and start recording.
    ///
    /// Returns `Ok(false)` when the session is busy, or when a stop arrived
    /// while the device was being opened. Acquisition failures raise an
    /// alert and leave the session Idle.
    pub async fn start_recording(&self) -> Result<bool> {
        let _acquiring = {
            let mut core = self.shared.core.lock();
            if core.shut_down || core.acquiring || core.state != SessionState::Idle {
                debug!("Ignoring recording start while {}", core.state);
                return Ok(false);
            }
            core.acquiring = true;
            AcquireGuard {
                shared: self.shared.clone(),
            }
        };

        let opened = match &self.shared.capture {
            Some(capture) => capture.open().await,
            None => Err(anyhow::anyhow!("no capture device configured")),
        };
        let handle = match opened {
            Ok(handle) => handle,
            Err(e) => {
                warn!("Microphone unavailable: {}", e);
                self.shared
                    .emit(SessionEvent::Alert(MICROPHONE_ALERT.to_string()));
                return Err(AssistError::RecordingAcquisition(e.to_string()));
            }
        };

        let mut core = self.shared.core.lock();
        // the state may have moved on while the device was being opened
        if core.shut_down || core.stop_requested || core.state != SessionState::Idle {
            if core.stop_requested {
                info!("Recording stopped before the microphone opened");
            }
            let mut handle = handle;
            handle.release();
            return Ok(false);
        }

        core.generation += 1;
        let generation = core.generation;
        let mut recording = ActiveRecording::new(generation, handle);
        recording.add_timer(self.spawn_ticker(generation));
        recording.add_timer(self.spawn_timeout(generation));
        core.recording = Some(recording);
        self.shared.set_state(&mut core, SessionState::Recording);

        info!("Recording started (generation {})", generation);
        Ok(true)
    }

    fn spawn_ticker(&self, generation: u64) -> tokio::task::AbortHandle {
        let shared = self.shared.clone();
        let period = Duration::from_millis(shared.config.recording_tick_ms);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                let mut core = shared.core.lock();
                let Some(recording) = core
                    .recording
                    .as_mut()
                    .filter(|r| r.generation == generation)
                else {
                    break;
                };
                recording.drain();
                let elapsed_secs = recording.elapsed_secs();
                shared.emit(SessionEvent::RecordingTick { elapsed_secs });
            }
        })
        .abort_handle()
    }

    fn spawn_timeout(&self, generation: u64) -> tokio::task::AbortHandle {
        let session = self.clone();
        let limit = Duration::from_millis(self.shared.config.recording_timeout_ms);
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            // finishing aborts this task at its next await; the upload runs separately
            if let Some(payload) = session.finish_recording(Some(generation)) {
                info!("Recording reached {} ms, stopping", limit.as_millis());
                tokio::spawn(async move { session.transcribe(payload).await });
            }
        })
        .abort_handle()
    }

    /// End the active recording. `expected` restricts this to one generation.
    fn finish_recording(&self, expected: Option<u64>) -> Option<AudioPayload> {
        let mut core = self.shared.core.lock();
        if core.state != SessionState::Recording {
            if expected.is_none() && core.acquiring {
                core.stop_requested = true;
            }
            return None;
        }
        if let Some(generation) = expected {
            if core.recording.as_ref().map(|r| r.generation) != Some(generation) {
                debug!("Ignoring stale recording timer (generation {})", generation);
                return None;
            }
        }

        let payload = core.recording.take().map(ActiveRecording::finish);
        self.shared.set_state(&mut core, SessionState::Idle);
        payload
    }

    /// Stop recording and transcribe what was captured.
    ///
    /// Returns `false` when no recording was active. A stop while the
    /// microphone is still being opened cancels that start instead.
    pub async fn stop_recording(&self) -> bool {
        match self.finish_recording(None) {
            Some(payload) => {
                self.transcribe(payload).await;
                true
            }
            None => false,
        }
    }

    pub async fn toggle_recording(&self) -> Result<bool> {
        let recording = {
            let core = self.shared.core.lock();
            core.state == SessionState::Recording || core.acquiring
        };
        if recording {
            Ok(self.stop_recording().await)
        } else {
            self.start_recording().await
        }
    }

    async fn transcribe(&self, payload: AudioPayload) {
        info!("Uploading {} bytes of audio", payload.len());
        self.shared.typing(true, None);
        let result = match self.shared.backend.voice_input(payload).await {
            Ok(response) => response.into_text(),
            Err(e) => {
                warn!("Voice upload failed: {}", e);
                Err(AssistError::Transcription(
                    AUDIO_PROCESSING_ERROR_MARKER.to_string(),
                ))
            }
        };
        self.shared.typing(false, None);

        match result {
            Ok(text) => {
                if !self.submit_text(&text).await {
                    info!("Transcription arrived while {}, not sent", self.state());
                }
            }
            Err(AssistError::Transcription(reason)) => self.shared.append(Message::error(reason)),
            Err(e) => self.shared.append(Message::error(e.to_string())),
        }
    }

    /// Empty the conversation and show fresh suggestions.
    ///
    /// An in-flight reply keeps streaming, but its message is no longer in the
    /// log so nothing more is shown for it.
    pub async fn clear(&self) {
        {
            let mut core = self.shared.core.lock();
            let removed = core.log.clear();
            debug!("Cleared {} messages", removed);
            core.suggestions = SuggestionSet::empty();
            self.shared.emit(SessionEvent::LogCleared);
            self.shared
                .emit(SessionEvent::SuggestionsChanged(SuggestionSet::empty()));
            self.show_suggestions(&mut core, true);
        }
        self.load_suggestions().await;
    }

    /// Switch page context and reload its suggestions.
    pub async fn set_page_context(&self, page_context: &str) {
        let page_context = page_context.trim();
        if page_context.is_empty() {
            return;
        }
        {
            let mut core = self.shared.core.lock();
            if core.page.page_context == page_context {
                return;
            }
            core.page.page_context = page_context.to_string();
        }
        self.load_suggestions().await;
    }

    /// Request a canned analysis and append it as an assistant message.
    /// Failures are only logged.
    pub async fn quick_analysis(&self, kind: AnalysisKind, days: u32) {
        match self.shared.backend.quick_analysis(kind, days).await {
            Ok(Some(analysis)) => self.shared.append(Message::assistant(analysis)),
            Ok(None) => debug!("Quick analysis '{}' returned nothing", kind),
            Err(e) => warn!("Quick analysis '{}' failed: {}", kind, e),
        }
    }

    /// Speak an assistant message.
    pub async fn play_message(&self, id: &MessageId) -> Result<PlaybackOutcome> {
        let text = {
            let core = self.shared.core.lock();
            match core.log.get(id) {
                Some(message) if message.kind == MessageKind::Normal => message.text.clone(),
                _ => return Ok(PlaybackOutcome::NotOffered),
            }
        };
        self.shared.playback.play_text(&text).await
    }

    /// Release the microphone and stop accepting work. Safe to call repeatedly.
    pub fn shutdown(&self) {
        let mut core = self.shared.core.lock();
        if core.shut_down {
            return;
        }
        core.shut_down = true;
        if let Some(recording) = core.recording.take() {
            debug!("Discarding recording {} on shutdown", recording.generation);
            drop(recording);
        }
        if core.state == SessionState::Recording {
            self.shared.set_state(&mut core, SessionState::Idle);
        }
        info!("Chat session shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.core.lock().shut_down
    }

    /// Carry out one UI intent.
    pub async fn handle_intent(&self, intent: Intent) {
        match intent {
            Intent::SendText(text) => {
                self.submit_text(&text).await;
            }
            Intent::StartRecording => {
                if let Err(e) = self.start_recording().await {
                    warn!("Could not start recording: {}", e);
                }
            }
            Intent::StopRecording => {
                self.stop_recording().await;
            }
            Intent::ToggleRecording => {
                if let Err(e) = self.toggle_recording().await {
                    warn!("Could not toggle recording: {}", e);
                }
            }
            Intent::Clear => self.clear().await,
            Intent::QuickAnalysis { kind, days } => self.quick_analysis(kind, days).await,
            Intent::SetPageContext(page_context) => self.set_page_context(&page_context).await,
            Intent::PlayMessage(id) => match self.play_message(&id).await {
                Ok(outcome) => debug!("Playback of {}: {:?}", id, outcome),
                Err(e) => warn!("Playback of {} failed: {}", id, e),
            },
            Intent::Shutdown => self.shutdown(),
        }
    }
}
