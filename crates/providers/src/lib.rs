//! Remote service implementations for Parley.
//!
//! Each service implements one of the `parley_core` contracts over HTTP.
//! The router builds the full set from configuration.

pub mod agent_api;
pub mod google;
mod http;
pub mod openai_compat;
pub mod router;

pub use agent_api::AgentApiClient;
pub use google::GoogleSearchService;
pub use openai_compat::{Endpoint, OpenAiCompletionService};
pub use router::{Services, build_from_config};
