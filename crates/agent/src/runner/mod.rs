//! Chat-mode runners.
//!
//! Every mode turns one outgoing user message into an updated conversation
//! through the same lifecycle:
//!
//! 1. `on_mutate` runs before any I/O: names a fresh conversation and marks
//!    it in flight
//! 2. `execute` does the mode-specific work
//! 3. exactly one of `on_success` / `on_error` reports the end
//!
//! [`ChatModeRunner::run`] enforces that order. Runners never keep a
//! conversation between calls; the updated copy comes back in the
//! [`ExchangeOutcome`] for the host to persist.

pub mod agent;
pub mod direct;
pub mod dispatcher;
pub mod google;

pub use agent::{AgentRunner, PlanningSettings};
pub use direct::DirectRunner;
pub use dispatcher::{MessageSender, ModeDispatcher, SendOptions};
pub use google::GoogleRunner;

use async_trait::async_trait;
use parley_core::cancel::CancelFlag;
use parley_core::error::{Error, ErrorKind};
use parley_core::event::{StatePatch, StateSink};
use parley_core::message::{Conversation, Message, conversation_name_from_message};
use parley_core::mode::{ChatModeId, ChatModeKey};
use parley_core::model::ModelSpec;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// The request body an exchange is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub model: ModelSpec,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub prompt: String,
    pub temperature: f32,
}

/// Everything a runner needs for one exchange.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub body: ChatBody,

    /// The conversation with the outgoing message already appended
    pub conversation: Conversation,

    /// The outgoing user message
    pub message: Message,

    /// Tools enabled for agent modes
    pub tools: Vec<String>,

    /// Per-mode credentials
    pub mode_keys: Vec<ChatModeKey>,
}

/// A failed exchange and the conversation as far as it got.
#[derive(Debug)]
pub struct ExchangeFailure {
    pub conversation: Conversation,
    pub error: Error,
}

impl ExchangeFailure {
    pub fn new(conversation: Conversation, error: impl Into<Error>) -> Self {
        Self {
            conversation,
            error: error.into(),
        }
    }
}

/// The result of one [`ChatModeRunner::run`].
#[derive(Debug)]
pub struct ExchangeOutcome {
    pub mode: ChatModeId,
    pub conversation: Conversation,
    pub error: Option<Error>,
}

impl ExchangeOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_aborted(&self) -> bool {
        self.error.as_ref().is_some_and(Error::is_abort)
    }

    /// The single message to show for a failed exchange.
    pub fn user_message(&self) -> Option<String> {
        self.error.as_ref().map(Error::user_message)
    }

    /// The text of the final assistant message, if the exchange produced one.
    pub fn reply(&self) -> Option<&str> {
        self.conversation
            .last_message()
            .filter(|m| m.role == parley_core::message::Role::Assistant)
            .map(|m| m.content.as_str())
    }
}

/// One chat mode's strategy behind the shared lifecycle.
#[async_trait]
pub trait ChatModeRunner: Send + Sync {
    fn mode(&self) -> ChatModeId;

    /// Mark the exchange in flight. Fires before any I/O.
    fn on_mutate(&self, params: &mut RunParams, sink: &dyn StateSink) {
        if params.conversation.messages.len() == 1 {
            params.conversation.name = conversation_name_from_message(&params.message.content);
        }
        sink.dispatch(StatePatch::SelectedConversation(params.conversation.clone()));
        sink.dispatch(StatePatch::Loading(true));
        sink.dispatch(StatePatch::MessageIsStreaming(true));
    }

    /// The mode-specific work. Returns the finalized conversation.
    async fn execute(
        &self,
        params: &RunParams,
        cancel: &CancelFlag,
        sink: &dyn StateSink,
    ) -> Result<Conversation, ExchangeFailure>;

    fn on_success(&self, conversation: &Conversation, sink: &dyn StateSink) {
        sink.dispatch(StatePatch::SelectedConversation(conversation.clone()));
        sink.dispatch(StatePatch::Loading(false));
        sink.dispatch(StatePatch::MessageIsStreaming(false));
    }

    fn on_error(&self, error: &Error, sink: &dyn StateSink) {
        sink.dispatch(StatePatch::Loading(false));
        sink.dispatch(StatePatch::MessageIsStreaming(false));
        match error.kind() {
            ErrorKind::AbortedByUser => info!(mode = %self.mode(), "Exchange stopped by user"),
            kind => warn!(mode = %self.mode(), ?kind, error = %error, "Exchange failed"),
        }
    }

    /// Run one exchange through the full lifecycle.
    async fn run(
        &self,
        mut params: RunParams,
        cancel: &CancelFlag,
        sink: &dyn StateSink,
    ) -> ExchangeOutcome {
        self.on_mutate(&mut params, sink);
        match self.execute(&params, cancel, sink).await {
            Ok(conversation) => {
                self.on_success(&conversation, sink);
                ExchangeOutcome {
                    mode: self.mode(),
                    conversation,
                    error: None,
                }
            }
            Err(failure) => {
                self.on_error(&failure.error, sink);
                ExchangeOutcome {
                    mode: self.mode(),
                    conversation: failure.conversation,
                    error: Some(failure.error),
                }
            }
        }
    }
}
