//! Fitting conversations into a model's token budget.
//!
//! | Piece | Role |
//! |-------|------|
//! | [`BpeTokenizer`] | cl100k_base counts, chat markers included |
//! | [`EstimatingTokenizer`] | Byte-length estimate used when the vocabulary is unavailable |
//! | [`serialize_messages`] | Chat-transcript text the budget is measured on |
//! | [`build_window`] | Greedy newest-first selection under `token_limit - reserved` |

pub mod token;
pub mod window;

pub use token::{BpeTokenizer, EstimatingTokenizer, default_tokenizer, estimate_tokens};
pub use window::{ContextWindow, build_window, serialize_messages};
