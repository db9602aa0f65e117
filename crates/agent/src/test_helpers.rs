//! Scripted stand-ins for the remote services.

use async_trait::async_trait;
use parley_core::cancel::CancelFlag;
use parley_core::error::{ProviderError, ToolError};
use parley_core::planning::{
    Action, Answer, PlanningMode, PlanningRequest, PlanningResponse, PlanningService, PlanningStep,
    ToolResult,
};
use parley_core::provider::{
    ChunkStream, CompletionRequest, CompletionService, SearchRequest, SearchService,
};
use parley_core::tool::{InvocationContext, RunToolRequest, ToolInvoker, ToolService, ToolSummary};
use std::sync::Mutex;
use std::time::Duration;

pub fn action_step(tool: &str, input: &str) -> PlanningStep {
    PlanningStep::Action(Action {
        thought: format!("I should use {tool}"),
        tool: ToolSummary::named(tool, ""),
        tool_input: input.into(),
    })
}

pub fn answer_step(text: &str) -> PlanningStep {
    PlanningStep::Answer(Answer { text: text.into() })
}

/// A planner that replays a fixed script of steps and records requests.
///
/// Every response carries the task id `task-1`.
pub struct ScriptedPlanner {
    script: Mutex<Vec<PlanningStep>>,
    failure: Option<ProviderError>,
    delay: Duration,
    requests: Mutex<Vec<(PlanningMode, PlanningRequest)>>,
}

impl ScriptedPlanner {
    pub fn new(script: Vec<PlanningStep>) -> Self {
        Self {
            script: Mutex::new(script),
            failure: None,
            delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<PlanningRequest> {
        self.requests.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn modes(&self) -> Vec<PlanningMode> {
        self.requests.lock().unwrap().iter().map(|(m, _)| *m).collect()
    }
}

#[async_trait]
impl PlanningService for ScriptedPlanner {
    async fn plan(
        &self,
        mode: PlanningMode,
        request: PlanningRequest,
    ) -> Result<PlanningResponse, ProviderError> {
        self.requests.lock().unwrap().push((mode, request));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return Err(ProviderError::MalformedResponse("planner script exhausted".into()));
        }
        Ok(PlanningResponse {
            task_id: "task-1".into(),
            result: script.remove(0),
        })
    }
}

/// Answers every action with `tool(input)`.
pub struct EchoInvoker {
    failure: Option<ToolError>,
    cancel: Option<CancelFlag>,
    calls: Mutex<Vec<(InvocationContext, Action)>>,
}

impl EchoInvoker {
    pub fn new() -> Self {
        Self {
            failure: None,
            cancel: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: ToolError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new()
        }
    }

    /// Request cancellation while running each tool.
    pub fn cancelling(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn calls(&self) -> Vec<(InvocationContext, Action)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolInvoker for EchoInvoker {
    async fn invoke(
        &self,
        context: &InvocationContext,
        action: &Action,
    ) -> Result<String, ToolError> {
        self.calls.lock().unwrap().push((context.clone(), action.clone()));
        if let Some(cancel) = &self.cancel {
            cancel.request();
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(format!("{}({})", action.tool_name(), action.tool_input)),
        }
    }
}

/// A remote tool service that echoes `tool(input)`.
/// Lists nothing unless built with [`EchoToolService::offering`].
#[derive(Default)]
pub struct EchoToolService {
    runs: Mutex<Vec<RunToolRequest>>,
    offered: Vec<ToolSummary>,
    list_error: Option<ProviderError>,
    list_calls: Mutex<usize>,
}

impl EchoToolService {
    pub fn offering(tools: Vec<ToolSummary>) -> Self {
        Self {
            offered: tools,
            ..Self::default()
        }
    }

    pub fn failing_list(error: ProviderError) -> Self {
        Self {
            list_error: Some(error),
            ..Self::default()
        }
    }

    pub fn runs(&self) -> Vec<RunToolRequest> {
        self.runs.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        *self.list_calls.lock().unwrap()
    }
}

#[async_trait]
impl ToolService for EchoToolService {
    async fn run(&self, request: RunToolRequest) -> Result<ToolResult, ProviderError> {
        self.runs.lock().unwrap().push(request.clone());
        Ok(ToolResult {
            result: format!("{}({})", request.action.tool_name(), request.input),
            action: request.action,
        })
    }

    async fn list(&self) -> Result<Vec<ToolSummary>, ProviderError> {
        *self.list_calls.lock().unwrap() += 1;
        match &self.list_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.offered.clone()),
        }
    }
}

/// Streams a fixed list of chunks for every request.
pub struct ScriptedCompletion {
    chunks: Vec<Result<Vec<u8>, ProviderError>>,
    refusal: Option<ProviderError>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletion {
    pub fn new(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| Ok(c.as_bytes().to_vec())).collect(),
            refusal: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Fail before streaming starts.
    pub fn refusing(error: ProviderError) -> Self {
        Self {
            refusal: Some(error),
            ..Self::new(&[])
        }
    }

    /// Stream `chunks` and then fail with `error`.
    pub fn breaking(chunks: &[&str], error: ProviderError) -> Self {
        let mut scripted = Self::new(chunks);
        scripted.chunks.push(Err(error));
        scripted
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<ChunkStream, ProviderError> {
        self.requests.lock().unwrap().push(request);
        if let Some(error) = &self.refusal {
            return Err(error.clone());
        }
        Ok(ChunkStream::from_items(self.chunks.clone()))
    }
}

/// Answers every search with a fixed text.
pub struct ScriptedSearch {
    reply: Result<String, ProviderError>,
    requests: Mutex<Vec<SearchRequest>>,
}

impl ScriptedSearch {
    pub fn new(reply: Result<String, ProviderError>) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchService for ScriptedSearch {
    fn name(&self) -> &str {
        "scripted-search"
    }

    async fn answer(&self, request: SearchRequest) -> Result<String, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.reply.clone()
    }
}
