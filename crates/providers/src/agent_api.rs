//! HTTP client for the planning and tool-execution service.
//!
//! Endpoints, relative to the configured base URL:
//! - `POST /api/planning`: single-shot planning
//! - `POST /api/planningconv`: transcript-aware planning
//! - `POST /api/runplugin`: execute one planned action
//! - `POST /api/plugins`: list available tools

use async_trait::async_trait;
use parley_core::error::ProviderError;
use parley_core::planning::{
    PlanningMode, PlanningRequest, PlanningResponse, PlanningService, ToolResult,
};
use parley_core::tool::{RunToolRequest, ToolService, ToolSummary};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::http;

/// Client for the remote planner and tool runner.
pub struct AgentApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl AgentApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: http::client(timeout),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn planning_path(mode: PlanningMode) -> &'static str {
        match mode {
            PlanningMode::SingleShot => "/api/planning",
            PlanningMode::Conversational => "/api/planningconv",
        }
    }

    async fn post<B, R>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> std::result::Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let mut builder = self
            .client
            .post(&url)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(http::transport_error)?;
        if !response.status().is_success() {
            return Err(http::status_error("agent", response).await);
        }

        let text = response.text().await.map_err(http::transport_error)?;
        serde_json::from_str(&text).map_err(|e| {
            ProviderError::MalformedResponse(format!("{path} returned unexpected data: {e}"))
        })
    }
}

#[async_trait]
impl PlanningService for AgentApiClient {
    async fn plan(
        &self,
        mode: PlanningMode,
        request: PlanningRequest,
    ) -> std::result::Result<PlanningResponse, ProviderError> {
        debug!(
            ?mode,
            task_id = request.task_id.as_deref().unwrap_or("-"),
            tool_results = request.tool_results.len(),
            "Requesting planning step"
        );
        self.post(Self::planning_path(mode), Some(&request)).await
    }
}

#[async_trait]
impl ToolService for AgentApiClient {
    async fn run(&self, request: RunToolRequest) -> std::result::Result<ToolResult, ProviderError> {
        debug!(
            task_id = %request.task_id,
            tool = request.action.tool_name(),
            "Running tool"
        );
        self.post("/api/runplugin", Some(&request)).await
    }

    async fn list(&self) -> std::result::Result<Vec<ToolSummary>, ProviderError> {
        self.post::<(), _>("/api/plugins", None).await
    }
}
