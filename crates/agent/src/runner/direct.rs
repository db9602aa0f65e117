//! Direct mode: one streamed completion.

use async_trait::async_trait;
use parley_core::cancel::CancelFlag;
use parley_core::error::Error;
use parley_core::event::{StatePatch, StateSink};
use parley_core::message::Conversation;
use parley_core::mode::ChatModeId;
use parley_core::provider::{CompletionRequest, CompletionService};
use parley_core::tokenizer::Tokenizer;
use std::sync::Arc;
use tracing::debug;

use super::{ChatModeRunner, ExchangeFailure, RunParams};
use crate::context::{build_window, default_tokenizer};
use crate::stream::{StreamOutcome, StreamReconstructor};

pub struct DirectRunner {
    completion: Arc<dyn CompletionService>,
    tokenizer: Arc<dyn Tokenizer>,
    reserved_for_completion: usize,
}

impl DirectRunner {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self {
            completion,
            tokenizer: default_tokenizer(),
            reserved_for_completion: 1000,
        }
    }

    pub fn with_tokenizer(mut self, tokenizer: Arc<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// Tokens kept free for the reply when fitting the history.
    pub fn with_reserved_for_completion(mut self, reserved: usize) -> Self {
        self.reserved_for_completion = reserved;
        self
    }

    fn request(&self, params: &RunParams) -> CompletionRequest {
        let body = &params.body;
        let window = build_window(
            self.tokenizer.as_ref(),
            &body.model,
            &body.prompt,
            self.reserved_for_completion,
            &body.messages,
        );
        debug!(
            conversation_id = %params.conversation.id,
            sent = window.messages.len(),
            total = body.messages.len(),
            max_tokens = window.max_tokens,
            "Built context window"
        );
        CompletionRequest {
            model: body.model.clone(),
            system_prompt: body.prompt.clone(),
            temperature: body.temperature,
            api_key: body.key.clone(),
            messages: window.messages,
            max_tokens: window.max_tokens,
        }
    }
}

#[async_trait]
impl ChatModeRunner for DirectRunner {
    fn mode(&self) -> ChatModeId {
        ChatModeId::Direct
    }

    async fn execute(
        &self,
        params: &RunParams,
        cancel: &CancelFlag,
        sink: &dyn StateSink,
    ) -> Result<Conversation, ExchangeFailure> {
        let mut stream = match self.completion.stream(self.request(params)).await {
            Ok(stream) => stream,
            Err(e) => return Err(ExchangeFailure::new(params.conversation.clone(), e)),
        };
        sink.dispatch(StatePatch::Loading(false));

        let mut reconstructor = StreamReconstructor::new(params.conversation.clone());
        let outcome = reconstructor.run(&mut stream, cancel, sink).await;
        cancel.reset();

        let conversation = reconstructor.into_conversation();
        match outcome {
            Ok(StreamOutcome::Completed) => Ok(conversation),
            Ok(StreamOutcome::Aborted) => Err(ExchangeFailure::new(conversation, Error::Aborted)),
            Err(e) => Err(ExchangeFailure::new(conversation, e)),
        }
    }
}
