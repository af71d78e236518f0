//! CRM assistant framework - re-exports all assistant components
//!
//! This meta-crate provides one API surface over the individual crates and
//! wires an HTTP-backed session together.

use std::sync::Arc;

pub use crmai_client as client;
pub use crmai_common as common;
pub use crmai_session as session;
pub use crmai_stream as stream;

// Re-export top-level types for convenience
pub use crmai_client::{AssistantBackend, HttpBackend};
pub use crmai_common::{AssistError, Result};
pub use crmai_session::{ChatSession, Intent, SessionDriver, SessionEvent};

/// Build a session talking to the assistant server described by `client`.
pub fn http_session(
    client: crmai_common::ClientConfig,
    page: crmai_common::PageAttributes,
    config: crmai_common::SessionConfig,
) -> Result<ChatSession> {
    let backend: Arc<dyn AssistantBackend> = Arc::new(HttpBackend::new(client)?);
    ChatSession::builder(backend)
        .with_page(page)
        .with_config(config)
        .build()
}

/// Convenience prelude module for common imports
pub mod prelude {
    // Common types and errors
    pub use crmai_common::{
        AssistError, AudioPayload, ClientConfig, Message, MessageId, MessageKind,
        PageAttributes, Result, Sender, SessionConfig, SessionState, SuggestionSet,
    };

    // Response decoding and rendering
    pub use crmai_stream::{EventStream, StreamDecoder, StreamEvent, render_message};

    // Backend
    pub use crmai_client::{AnalysisKind, AssistantBackend, ChatRequest, HttpBackend};

    // Session, recording and playback
    pub use crmai_session::{
        AudioCapture, AudioClip, AudioSink, CaptureHandle, ChatSession, Intent,
        PlaybackOutcome, SessionBuilder, SessionDriver, SessionEvent,
    };

    pub use crate::http_session;
}
