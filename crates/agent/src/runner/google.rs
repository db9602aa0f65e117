//! Google search mode: a single, non-streamed answer grounded on web
//! search results. Needs a search API key and a custom search engine id,
//! taken from the per-mode keys first and the configuration second.

use async_trait::async_trait;
use parley_core::cancel::CancelFlag;
use parley_core::error::{Error, ProviderError};
use parley_core::event::StateSink;
use parley_core::message::{Conversation, Message};
use parley_core::mode::{ChatModeId, GOOGLE_API_KEY, GOOGLE_CSE_ID, find_mode_key};
use parley_core::provider::{SearchRequest, SearchService};
use std::sync::Arc;
use tracing::debug;

use super::{ChatModeRunner, ExchangeFailure, RunParams};

pub struct GoogleRunner {
    search: Arc<dyn SearchService>,
    default_api_key: Option<String>,
    default_cse_id: Option<String>,
}

impl GoogleRunner {
    pub fn new(search: Arc<dyn SearchService>) -> Self {
        Self {
            search,
            default_api_key: None,
            default_cse_id: None,
        }
    }

    /// Credentials used when the user supplied none for this mode.
    pub fn with_default_credentials(
        mut self,
        api_key: impl Into<String>,
        cse_id: impl Into<String>,
    ) -> Self {
        self.default_api_key = Some(api_key.into());
        self.default_cse_id = Some(cse_id.into());
        self
    }

    fn credential(&self, params: &RunParams, key: &str) -> Result<String, ProviderError> {
        let fallback = match key {
            GOOGLE_API_KEY => self.default_api_key.as_deref(),
            _ => self.default_cse_id.as_deref(),
        };
        find_mode_key(&params.mode_keys, ChatModeId::GoogleSearch, key)
            .or(fallback.filter(|v| !v.trim().is_empty()))
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::AuthenticationFailed(format!("{key} is required for Google Search"))
            })
    }
}

#[async_trait]
impl ChatModeRunner for GoogleRunner {
    fn mode(&self) -> ChatModeId {
        ChatModeId::GoogleSearch
    }

    async fn execute(
        &self,
        params: &RunParams,
        cancel: &CancelFlag,
        _sink: &dyn StateSink,
    ) -> Result<Conversation, ExchangeFailure> {
        let fail = |e: Error| ExchangeFailure::new(params.conversation.clone(), e);

        let search_api_key = self.credential(params, GOOGLE_API_KEY).map_err(|e| fail(e.into()))?;
        let search_engine_id = self.credential(params, GOOGLE_CSE_ID).map_err(|e| fail(e.into()))?;

        if cancel.take() {
            return Err(fail(Error::Aborted));
        }

        let body = &params.body;
        let request = SearchRequest {
            model: body.model.clone(),
            messages: body.messages.clone(),
            api_key: body.key.clone(),
            prompt: body.prompt.clone(),
            temperature: body.temperature,
            search_api_key,
            search_engine_id,
        };

        debug!(
            conversation_id = %params.conversation.id,
            service = self.search.name(),
            "Searching"
        );
        let answer = self.search.answer(request).await.map_err(|e| fail(e.into()))?;
        Ok(params.conversation.with_message(Message::assistant(answer)))
    }
}
