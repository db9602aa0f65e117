//! Completion service contracts.
//!
//! A [`CompletionService`] turns a request into a lazy, finite,
//! non-restartable [`ChunkStream`] of byte chunks. A [`SearchService`]
//! answers a request in one piece after consulting a web search engine.
//!
//! Implementations: OpenAI / Azure OpenAI streaming, search-augmented
//! completion endpoint, and scripted stubs in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::message::Message;
use crate::model::ModelSpec;

/// A streaming chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub model: ModelSpec,

    pub system_prompt: String,

    pub temperature: f32,

    /// Per-request key; the service falls back to its configured key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Messages already fitted to the model's token budget.
    pub messages: Vec<Message>,

    pub max_tokens: usize,
}

/// A search-augmented completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub model: ModelSpec,

    pub messages: Vec<Message>,

    #[serde(rename = "key", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub prompt: String,

    pub temperature: f32,

    #[serde(rename = "googleAPIKey")]
    pub search_api_key: String,

    #[serde(rename = "googleCSEId")]
    pub search_engine_id: String,
}

/// One item read from a [`ChunkStream`].
pub type ChunkResult = std::result::Result<Vec<u8>, ProviderError>;

/// Receiving half of a completion stream.
///
/// `next_chunk` yields `None` at end-of-stream. Calling [`ChunkStream::abort`]
/// tells the producer to stop reading from the network.
#[derive(Debug)]
pub struct ChunkStream {
    rx: mpsc::Receiver<ChunkResult>,
    abort: CancellationToken,
}

/// Producing half of a completion stream.
#[derive(Clone)]
pub struct ChunkSender {
    tx: mpsc::Sender<ChunkResult>,
    abort: CancellationToken,
}

impl ChunkStream {
    /// Create a connected sender/stream pair.
    pub fn channel(buffer: usize) -> (ChunkSender, ChunkStream) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let abort = CancellationToken::new();
        (
            ChunkSender {
                tx,
                abort: abort.clone(),
            },
            ChunkStream { rx, abort },
        )
    }

    /// A stream that replays the given items and then ends.
    pub fn from_items(items: Vec<ChunkResult>) -> ChunkStream {
        let (sender, stream) = Self::channel(items.len());
        for item in items {
            // capacity equals item count, so this never fails
            let _ = sender.tx.try_send(item);
        }
        stream
    }

    /// Read the next chunk. `None` means the producer finished.
    pub async fn next_chunk(&mut self) -> Option<ChunkResult> {
        if self.abort.is_cancelled() {
            return None;
        }
        self.rx.recv().await
    }

    /// Signal the producer to stop.
    pub fn abort(&self) {
        self.abort.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }
}

impl ChunkSender {
    /// Send one item. Returns `false` once the stream was aborted or dropped.
    pub async fn send(&self, item: ChunkResult) -> bool {
        if self.abort.is_cancelled() {
            return false;
        }
        tokio::select! {
            sent = self.tx.send(item) => sent.is_ok(),
            _ = self.abort.cancelled() => false,
        }
    }

    /// Resolves when the consumer aborts the stream.
    pub async fn aborted(&self) {
        self.abort.cancelled().await
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }
}

/// Streaming chat completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// A human-readable name for this service (e.g., "openai", "azure").
    fn name(&self) -> &str;

    /// Start a completion and return its chunk stream.
    ///
    /// Errors returned here happened before the first byte (bad status,
    /// refused connection); errors after that arrive inside the stream.
    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<ChunkStream, ProviderError>;
}

/// Search-augmented, non-streaming completion backend.
#[async_trait]
pub trait SearchService: Send + Sync {
    fn name(&self) -> &str;

    /// Answer the conversation using web search results.
    async fn answer(&self, request: SearchRequest) -> std::result::Result<String, ProviderError>;
}
