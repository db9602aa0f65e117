//! Tool execution for Parley.
//!
//! Tools run remotely; this crate decides whether a planned action may run
//! at all and bounds how long it may take. It also carries the text helpers
//! tool results are prepared with.

pub mod invoker;
pub mod text;

pub use invoker::RemoteToolInvoker;
pub use text::{chunk_text_by_token_size, clean_source_text, extract_url, slice_by_token_size};
