//! Backend client for the CRM assistant
//!
//! [`AssistantBackend`] is the seam between a chat session and the server;
//! [`HttpBackend`] implements it over the `/ai/*` HTTP endpoints.

pub mod backend;
pub mod http;

pub use backend::{
    AnalysisKind, AssistantBackend, ChatRequest, SpeechResponse, TranscriptionResponse,
};
pub use http::HttpBackend;
