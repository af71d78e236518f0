//! Common constants used across the assistant

/// Default page context when the page does not name one
pub const DEFAULT_PAGE_CONTEXT: &str = "dashboard";

/// Default user role
pub const DEFAULT_USER_ROLE: &str = "viewer";

/// Default visual theme
pub const DEFAULT_THEME: &str = "blue";

/// Path prefix of the assistant endpoints
pub const DEFAULT_API_BASE: &str = "/ai";

/// Maximum characters accepted from a single user message
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 1000;

/// Hard cap on a single voice recording
pub const DEFAULT_RECORDING_TIMEOUT_MS: u64 = 30_000;

/// Interval of the recording elapsed-time counter
pub const DEFAULT_RECORDING_TICK_MS: u64 = 1_000;

/// Responses longer than this are never offered for speech playback
pub const DEFAULT_PLAYBACK_CHAR_LIMIT: usize = 200;

/// Capacity of the session notification channel
pub const DEFAULT_EVENT_BUFFER: usize = 1000;

/// Text shown in place of a failed assistant response
pub const RESPONSE_ERROR_MARKER: &str = "Error in response. Please try again.";

/// Shown when voice input fails without a server-provided reason
pub const TRANSCRIPTION_ERROR_MARKER: &str = "Voice recognition error";

/// Shown when the voice input request itself fails
pub const AUDIO_PROCESSING_ERROR_MARKER: &str = "Audio processing error";

/// Blocking alert raised when the microphone cannot be opened
pub const MICROPHONE_ALERT: &str = "Microphone access error. Check the permissions.";

/// Prefix of an event line in the chat response stream
pub const EVENT_PREFIX: &str = "data:";

/// Endpoint names under the API base
pub mod endpoints {
    pub const SUGGESTIONS: &str = "suggestions";
    pub const STREAM_CHAT: &str = "stream-chat";
    pub const TEXT_TO_SPEECH: &str = "text-to-speech";
    pub const VOICE_INPUT: &str = "voice-input";
    pub const QUICK_ANALYSIS: &str = "quick-analysis";
}

/// Page attribute names read at construction
pub mod attributes {
    pub const PAGE: &str = "data-page";
    pub const USER_ROLE: &str = "data-user-role";
    pub const THEME: &str = "data-theme";
}

/// Default timeout values in seconds
pub mod timeouts {
    pub const DEFAULT_HTTP_TIMEOUT: u64 = 30;
}
