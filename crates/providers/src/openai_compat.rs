//! OpenAI-compatible streaming completion service.
//!
//! Talks to either OpenAI directly (`{host}/v1/chat/completions`, bearer
//! token, optional organization header) or an Azure OpenAI deployment
//! (`{host}/openai/deployments/{id}/chat/completions?api-version=..`,
//! `api-key` header). The SSE response is parsed on a background task and
//! each content delta is forwarded as raw UTF-8 bytes on a [`ChunkStream`].

use async_trait::async_trait;
use futures::StreamExt;
use parley_core::error::ProviderError;
use parley_core::message::Message;
use parley_core::provider::{ChunkSender, ChunkStream, CompletionRequest, CompletionService};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

use crate::http;

/// Chunks buffered between the network task and the consumer.
const STREAM_BUFFER: usize = 64;

/// Where and how to reach the completion API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    OpenAi {
        host: String,
        organization: Option<String>,
    },
    Azure {
        host: String,
        deployment_id: String,
        api_version: String,
    },
}

impl Endpoint {
    /// The chat completions URL for this endpoint.
    pub fn completions_url(&self) -> String {
        match self {
            Endpoint::OpenAi { host, .. } => {
                format!("{}/v1/chat/completions", host.trim_end_matches('/'))
            }
            Endpoint::Azure {
                host,
                deployment_id,
                api_version,
            } => format!(
                "{}/openai/deployments/{deployment_id}/chat/completions?api-version={api_version}",
                host.trim_end_matches('/')
            ),
        }
    }
}

/// Deadlines for a streamed completion. There is no overall deadline: a
/// reply may run as long as chunks keep arriving within `idle` of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTimeouts {
    pub connect: Duration,
    pub idle: Duration,
}

impl Default for StreamTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(120),
            idle: Duration::from_secs(60),
        }
    }
}

/// Streaming completions against OpenAI or Azure OpenAI.
pub struct OpenAiCompletionService {
    endpoint: Endpoint,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompletionService {
    pub fn new(endpoint: Endpoint, api_key: Option<String>, timeouts: StreamTimeouts) -> Self {
        Self {
            endpoint,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client: http::streaming_client(timeouts.connect, timeouts.idle),
        }
    }

    /// OpenAI at its public host.
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(
            Endpoint::OpenAi {
                host: "https://api.openai.com".into(),
                organization: None,
            },
            Some(api_key.into()),
            StreamTimeouts::default(),
        )
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn body(&self, request: &CompletionRequest) -> ApiRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ApiMessage::from(&Message::system(request.system_prompt.clone())));
        messages.extend(request.messages.iter().map(ApiMessage::from));

        ApiRequest {
            model: match self.endpoint {
                Endpoint::OpenAi { .. } => Some(request.model.id.clone()),
                // the deployment selects the model
                Endpoint::Azure { .. } => None,
            },
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: true,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionService {
    fn name(&self) -> &str {
        match self.endpoint {
            Endpoint::OpenAi { .. } => "openai",
            Endpoint::Azure { .. } => "azure",
        }
    }

    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<ChunkStream, ProviderError> {
        let key = request
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.api_key.clone())
            .ok_or_else(|| {
                ProviderError::AuthenticationFailed(
                    "No API key set. Add one in the configuration or pass it with the request."
                        .into(),
                )
            })?;

        let url = self.endpoint.completions_url();
        let body = self.body(&request);

        debug!(
            service = self.name(),
            model = %request.model.id,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "Sending streaming completion request"
        );

        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream");
        builder = match &self.endpoint {
            Endpoint::OpenAi { organization, .. } => {
                let builder = builder.header("Authorization", format!("Bearer {key}"));
                match organization.as_deref().filter(|o| !o.is_empty()) {
                    Some(org) => builder.header("OpenAI-Organization", org),
                    None => builder,
                }
            }
            Endpoint::Azure { .. } => builder.header("api-key", key),
        };

        let response = builder
            .json(&body)
            .send()
            .await
            .map_err(http::transport_error)?;

        if !response.status().is_success() {
            return Err(http::status_error(self.name(), response).await);
        }

        let (sender, stream) = ChunkStream::channel(STREAM_BUFFER);
        let service = self.name().to_string();
        tokio::spawn(pump_sse(service, response, sender));
        Ok(stream)
    }
}

/// Read the SSE body and forward content deltas until done, error, or abort.
async fn pump_sse(service: String, response: reqwest::Response, sender: ChunkSender) {
    let mut byte_stream = response.bytes_stream();
    let mut lines = LineBuffer::default();

    loop {
        let next = tokio::select! {
            next = byte_stream.next() => next,
            _ = sender.aborted() => {
                debug!(service = %service, "Stream aborted by consumer");
                return;
            }
        };

        let bytes = match next {
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                sender
                    .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                    .await;
                return;
            }
            // connection closed without [DONE]
            None => return,
        };

        for line in lines.push(&bytes) {
            match parse_sse_line(&line) {
                SseLine::Skip => {}
                SseLine::Done => return,
                SseLine::Content(text) => {
                    if !sender.send(Ok(text.into_bytes())).await {
                        return; // consumer went away
                    }
                }
                SseLine::Error(message) => {
                    sender
                        .send(Err(ProviderError::ApiError {
                            status_code: 200,
                            message,
                        }))
                        .await;
                    return;
                }
                SseLine::Unparsed(data) => {
                    trace!(service = %service, data = %data, "Ignoring unparseable SSE chunk");
                }
            }
        }
    }
}

/// Splits a byte stream into lines. Bytes are held until their line is
/// complete, so a character split across network reads is decoded whole.
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(end) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line[..end]);
            lines.push(text.trim_end_matches('\r').to_string());
        }
        lines
    }
}

/// What one SSE line means for the consumer.
#[derive(Debug, PartialEq, Eq)]
enum SseLine {
    Skip,
    Done,
    Content(String),
    Error(String),
    Unparsed(String),
}

fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Skip;
    }
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }

    match serde_json::from_str::<StreamResponse>(data) {
        Ok(StreamResponse {
            error: Some(error), ..
        }) => SseLine::Error(error.message),
        Ok(resp) => match resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|c| !c.is_empty())
        {
            Some(content) => SseLine::Content(content),
            None => SseLine::Skip,
        },
        Err(_) => SseLine::Unparsed(data.to_string()),
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<ApiMessage>,
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

impl From<&Message> for ApiMessage {
    fn from(m: &Message) -> Self {
        Self {
            role: m.role.as_str().into(),
            content: m.content.clone(),
        }
    }
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    #[serde(default)]
    message: String,
}
