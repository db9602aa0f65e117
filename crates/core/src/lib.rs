//! # Parley Core
//!
//! Domain types, service contracts, and error definitions for the Parley
//! conversation engine. Nothing in here talks to the network; remote model,
//! planning, search, and tool services are traits implemented in
//! `parley-providers` and faked in tests.
//!
//! ## Layout
//!
//! - [`message`] and [`model`]: the conversation value objects
//! - [`provider`], [`planning`], [`tool`]: remote service contracts
//! - [`mode`]: the chat-mode catalogue
//! - [`tokenizer`]: the token counting contract
//! - [`event`] and [`cancel`]: how an exchange reports progress and is stopped

pub mod cancel;
pub mod error;
pub mod event;
pub mod message;
pub mod mode;
pub mod model;
pub mod planning;
pub mod provider;
pub mod tokenizer;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use cancel::CancelFlag;
pub use error::{Error, ErrorKind, ProviderError, Result, ToolError};
pub use event::{EngineEvent, EventBus, RecordingSink, StatePatch, StateSink};
pub use message::{Conversation, ConversationId, Message, Role};
pub use mode::{ChatModeId, ChatModeKey};
pub use model::{ModelLimits, ModelSpec};
pub use planning::{
    Action, Answer, PlanningMode, PlanningRequest, PlanningResponse, PlanningService,
    PlanningStep, ToolResult,
};
pub use provider::{
    ChunkSender, ChunkStream, CompletionRequest, CompletionService, SearchRequest, SearchService,
};
pub use tokenizer::Tokenizer;
pub use tool::{
    InvocationContext, RunToolRequest, ToolCatalog, ToolInvoker, ToolService, ToolSummary,
};
