//! Page-specific suggestion loading

use crmai_client::AssistantBackend;
use crmai_common::SuggestionSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetches suggested prompts for a page context.
///
/// Suggestions are optional: any failure yields an empty set.
#[derive(Clone)]
pub struct SuggestionLoader {
    backend: Arc<dyn AssistantBackend>,
}

impl SuggestionLoader {
    pub fn new(backend: Arc<dyn AssistantBackend>) -> Self {
        Self { backend }
    }

    pub async fn load(&self, page_context: &str) -> SuggestionSet {
        match self.backend.suggestions(page_context).await {
            Ok(items) => {
                let set = SuggestionSet::new(items);
                debug!("Loaded {} suggestions for '{}'", set.len(), page_context);
                set
            }
            Err(e) => {
                warn!("Could not load suggestions for '{}': {}", page_context, e);
                SuggestionSet::empty()
            }
        }
    }
}
