//! Stream event model and its wire representation

use serde::Deserialize;

/// One decoded unit of the chat response stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The server started generating; carries an optional status text
    Start(Option<String>),
    /// Incremental fragment of the response text
    Chunk(String),
    /// Normal end of the response
    End,
    /// The server reported a failure
    Error(String),
}

impl StreamEvent {
    /// End and Error close the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::End | StreamEvent::Error(_))
    }
}

/// JSON object following the event prefix
#[derive(Debug, Deserialize)]
pub(crate) struct WireRecord {
    #[serde(rename = "type")]
    kind: Option<String>,
    content: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

const DEFAULT_STREAM_ERROR: &str = "stream reported an error";

impl WireRecord {
    /// `None` for record types this client does not know.
    pub(crate) fn into_event(self) -> Option<StreamEvent> {
        match self.kind.as_deref() {
            Some("chunk") => Some(StreamEvent::Chunk(self.content.unwrap_or_default())),
            Some("end") => Some(StreamEvent::End),
            Some("error") => Some(StreamEvent::Error(
                self.message
                    .or(self.error)
                    .unwrap_or_else(|| DEFAULT_STREAM_ERROR.to_string()),
            )),
            Some("start") => Some(StreamEvent::Start(self.message)),
            Some(_) => None,
            // validation failures are sent as a bare {"error": "..."}
            None => self.error.map(StreamEvent::Error),
        }
    }
}
