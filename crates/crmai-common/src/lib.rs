//! CRM Assistant Common - Shared utilities and types
//!
//! This crate provides the error taxonomy, configuration structs,
//! the message/session data model and small utility functions used
//! across all assistant components.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::{ClientConfig, PageAttributes, SessionConfig};
pub use constants::*;
pub use error::{AssistError, Result};
pub use types::{
    AudioPayload, Message, MessageId, MessageKind, Sender, SessionState, SuggestionSet,
};
pub use utils::*;
