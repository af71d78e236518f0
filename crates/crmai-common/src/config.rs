//! Configuration types for the assistant

use crate::constants::{self, attributes, timeouts};
use crate::error::{AssistError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Page-supplied parameters of an assistant instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAttributes {
    /// Free-form page context sent with every chat request
    pub page_context: String,
    /// Free-form role of the signed-in user
    pub user_role: String,
    /// Free-form visual theme name
    pub theme: String,
}

impl Default for PageAttributes {
    fn default() -> Self {
        Self {
            page_context: constants::DEFAULT_PAGE_CONTEXT.to_string(),
            user_role: constants::DEFAULT_USER_ROLE.to_string(),
            theme: constants::DEFAULT_THEME.to_string(),
        }
    }
}

impl PageAttributes {
    /// Build from page attributes (`data-page`, `data-user-role`, `data-theme`).
    ///
    /// When `data-page` is missing, the last segment of `page_path` names the
    /// context before falling back to the default.
    pub fn from_attributes(attrs: &HashMap<String, String>, page_path: Option<&str>) -> Self {
        let lookup = |key: &str| {
            attrs
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let path_context = page_path.and_then(|path| {
            path.split('/')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .last()
                .map(str::to_string)
        });

        let defaults = Self::default();
        Self {
            page_context: lookup(attributes::PAGE)
                .or(path_context)
                .unwrap_or(defaults.page_context),
            user_role: lookup(attributes::USER_ROLE).unwrap_or(defaults.user_role),
            theme: lookup(attributes::THEME).unwrap_or(defaults.theme),
        }
    }
}

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Origin of the CRM server, e.g. `http://localhost:5000`
    pub base_url: String,
    /// Path prefix of the assistant endpoints
    pub api_base: String,
    /// Request timeout in seconds (applies to non-streaming calls)
    pub request_timeout_seconds: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            api_base: constants::DEFAULT_API_BASE.to_string(),
            request_timeout_seconds: Some(timeouts::DEFAULT_HTTP_TIMEOUT),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Full URL of an endpoint under the API base
    pub fn endpoint(&self, name: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let api = self.api_base.trim_matches('/');
        if api.is_empty() {
            format!("{}/{}", base, name)
        } else {
            format!("{}/{}/{}", base, api, name)
        }
    }
}

/// Tunables of a chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Submitted text is capped to this many characters
    pub max_message_length: usize,
    /// Recording is stopped automatically after this long
    pub recording_timeout_ms: u64,
    /// Elapsed-time counter interval while recording
    pub recording_tick_ms: u64,
    /// Responses above this many characters are not offered for playback
    pub playback_char_limit: usize,
    /// Capacity of the notification channel
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_message_length: constants::DEFAULT_MAX_MESSAGE_LENGTH,
            recording_timeout_ms: constants::DEFAULT_RECORDING_TIMEOUT_MS,
            recording_tick_ms: constants::DEFAULT_RECORDING_TICK_MS,
            playback_char_limit: constants::DEFAULT_PLAYBACK_CHAR_LIMIT,
            event_buffer: constants::DEFAULT_EVENT_BUFFER,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_message_length == 0 {
            return Err(AssistError::Config(
                "max_message_length must be greater than zero".to_string(),
            ));
        }
        if self.recording_timeout_ms == 0 || self.recording_tick_ms == 0 {
            return Err(AssistError::Config(
                "recording timers must be greater than zero".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(AssistError::Config(
                "event_buffer must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_page_attribute_defaults() {
        let page = PageAttributes::from_attributes(&HashMap::new(), None);
        assert_eq!(page, PageAttributes::default());
        assert_eq!(page.page_context, "dashboard");
        assert_eq!(page.user_role, "viewer");
        assert_eq!(page.theme, "blue");
    }

    #[test]
    fn test_page_attributes_from_page() {
        let page = PageAttributes::from_attributes(
            &attrs(&[
                ("data-page", "appointments"),
                ("data-user-role", "dealer"),
                ("data-theme", "green"),
            ]),
            Some("/crm/clients"),
        );
        assert_eq!(page.page_context, "appointments");
        assert_eq!(page.user_role, "dealer");
        assert_eq!(page.theme, "green");
    }

    #[test]
    fn test_page_context_falls_back_to_path() {
        let page =
            PageAttributes::from_attributes(&attrs(&[("data-page", "  ")]), Some("/crm/clients/"));
        assert_eq!(page.page_context, "clients");

        let page = PageAttributes::from_attributes(&HashMap::new(), Some("/"));
        assert_eq!(page.page_context, "dashboard");
    }

    #[test]
    fn test_endpoint_urls() {
        let config = ClientConfig::new("http://crm.local/");
        assert_eq!(config.endpoint("stream-chat"), "http://crm.local/ai/stream-chat");

        let config = ClientConfig {
            api_base: String::new(),
            ..ClientConfig::new("http://crm.local")
        };
        assert_eq!(config.endpoint("suggestions"), "http://crm.local/suggestions");
    }

    #[test]
    fn test_session_config_validation() {
        assert!(SessionConfig::default().validate().is_ok());

        let config = SessionConfig {
            recording_timeout_ms: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(AssistError::Config(_))));
    }
}
