//! Streaming chat session for the CRM assistant
//!
//! A [`ChatSession`] sends text, streams replies into the message log,
//! records and transcribes voice input, and plays short replies aloud.
//! The UI drives it with [`Intent`]s (usually through a [`SessionDriver`])
//! and renders the [`SessionEvent`]s it broadcasts.

pub mod driver;
pub mod events;
pub mod log;
pub mod playback;
pub mod recording;
pub mod session;
pub mod suggestions;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types for convenience
pub use driver::SessionDriver;
pub use events::{Intent, SessionEvent};
pub use log::MessageLog;
pub use playback::{AudioClip, AudioPlayback, AudioSink, PlaybackOutcome};
pub use recording::{AudioCapture, CaptureHandle, RecordingBuffer};
pub use session::{ChatSession, SessionBuilder};
pub use suggestions::SuggestionLoader;
