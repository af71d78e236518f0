//! Messages exchanged between a session and its UI layer
//!
//! The UI sends [`Intent`]s into the session; the session broadcasts
//! [`SessionEvent`]s back. Events are emitted in the order the session state
//! changed.

use crmai_client::AnalysisKind;
use crmai_common::{Message, MessageId, MessageKind, SessionState, SuggestionSet};

/// User actions forwarded by the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Send typed text, or a clicked suggestion
    SendText(String),
    StartRecording,
    StopRecording,
    /// Microphone button: stop when recording, start otherwise
    ToggleRecording,
    Clear,
    QuickAnalysis { kind: AnalysisKind, days: u32 },
    SetPageContext(String),
    /// Speak an assistant message that was offered for playback
    PlayMessage(MessageId),
    /// The page is going away
    Shutdown,
}

/// Notifications for the UI
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    MessageAppended(Message),
    /// Full current text of a message after a change
    MessageUpdated {
        id: MessageId,
        text: String,
        kind: MessageKind,
    },
    StateChanged(SessionState),
    /// Typing indicator; `status` is the server's start text when it sent one
    Typing {
        active: bool,
        status: Option<String>,
    },
    SuggestionsChanged(SuggestionSet),
    SuggestionsVisibility(bool),
    LogCleared,
    RecordingTick {
        elapsed_secs: u64,
    },
    /// The finished message is short enough to be spoken
    PlaybackOffered {
        id: MessageId,
    },
    /// Blocking user-facing alert
    Alert(String),
}
