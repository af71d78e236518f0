//! Response stream decoding for the CRM assistant
//!
//! This crate turns the line-oriented `data: {...}` body of the chat
//! endpoint into ordered [`StreamEvent`] values and renders message text
//! for display.

pub mod decoder;
pub mod events;
pub mod render;
pub mod stream;

// Re-export key types for convenience
pub use decoder::{DecoderStats, StreamDecoder};
pub use events::StreamEvent;
pub use render::render_message;
pub use stream::{ByteStream, EventStream};
