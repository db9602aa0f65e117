//! The Parley conversation engine.
//!
//! Turns one outgoing user message into an updated conversation:
//!
//! 1. **Select** a runner for the active chat mode ([`ModeDispatcher`])
//! 2. **Fit** the history into the model's token budget ([`build_window`])
//! 3. **Stream** the reply into the conversation ([`StreamReconstructor`]),
//!    or **plan** with remote tools until an answer arrives ([`PlanningLoop`])
//! 4. **Report** success, failure, or a user stop through [`StatePatch`]es
//!
//! [`StatePatch`]: parley_core::event::StatePatch

pub mod context;
pub mod planning;
pub mod runner;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use context::{
    BpeTokenizer, ContextWindow, EstimatingTokenizer, build_window, default_tokenizer,
    serialize_messages,
};
pub use planning::{PlanningInput, PlanningLoop, PlanningOutcome};
pub use runner::{
    AgentRunner, ChatBody, ChatModeRunner, DirectRunner, ExchangeFailure, ExchangeOutcome,
    GoogleRunner, MessageSender, ModeDispatcher, PlanningSettings, RunParams, SendOptions,
};
pub use stream::{StreamOutcome, StreamReconstructor};
