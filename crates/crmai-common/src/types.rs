//! Common types used across assistant components

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a message in the session log
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sender {
    User,
    Assistant,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Assistant => write!(f, "assistant"),
        }
    }
}

/// Rendering kind of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Final content
    Normal,
    /// Still receiving chunks
    Streaming,
    /// Failure notice shown in place of content
    Error,
}

/// A single entry of the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender: Sender,
    pub text: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            id: MessageId::generate(),
            sender,
            text: text.into(),
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text, MessageKind::Normal)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text, MessageKind::Normal)
    }

    /// Empty assistant message filled while a response streams in
    pub fn placeholder() -> Self {
        Self::new(Sender::Assistant, String::new(), MessageKind::Streaming)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text, MessageKind::Error)
    }

    pub fn is_streaming(&self) -> bool {
        self.kind == MessageKind::Streaming
    }

    /// Append streamed content. Returns false once the message is final.
    pub fn append(&mut self, content: &str) -> bool {
        if !self.is_streaming() {
            return false;
        }
        self.text.push_str(content);
        true
    }

    /// Streaming -> Normal. Returns false if the message was already final.
    pub fn finalize(&mut self) -> bool {
        if !self.is_streaming() {
            return false;
        }
        self.kind = MessageKind::Normal;
        true
    }

    /// Replace the content with a failure marker.
    pub fn fail(&mut self, marker: &str) {
        self.text = marker.to_string();
        self.kind = MessageKind::Error;
    }

    /// Local wall-clock time of creation as `HH:MM`
    pub fn display_time(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%H:%M")
            .to_string()
    }
}

/// Mutually exclusive activity of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Idle,
    Sending,
    Recording,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Sending => write!(f, "sending"),
            SessionState::Recording => write!(f, "recording"),
        }
    }
}

/// Suggested prompts for the current page, in backend order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionSet {
    items: Vec<String>,
}

impl SuggestionSet {
    /// Build from backend strings, dropping blanks and duplicates.
    pub fn new(items: Vec<String>) -> Self {
        let mut unique: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            if !item.trim().is_empty() && !unique.contains(&item) {
                unique.push(item);
            }
        }
        Self { items: unique }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, suggestion: &str) -> bool {
        self.items.iter().any(|s| s == suggestion)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }
}

/// One recorded audio clip ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl AudioPayload {
    pub fn wav(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "audio/wav".to_string(),
            file_name: "recording.wav".to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
