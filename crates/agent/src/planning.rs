//! The plan → act → observe loop.
//!
//! Each iteration sends the transcript, the enabled tool names and every
//! tool result so far to the remote planner. An [`Action`] runs one tool
//! and the loop goes round again; an [`Answer`](parley_core::planning::Answer)
//! ends it. Tools run strictly one after another.
//!
//! The loop stops early when:
//! - the cancel flag is observed (checked before every planner and tool call)
//! - a tool fails (the exchange is aborted, the failure is not fed back)
//! - the planner errors or exceeds its per-call timeout
//! - `max_iterations` planner calls produced no answer

use chrono::Utc;
use parley_core::cancel::CancelFlag;
use parley_core::error::{Error, ProviderError, Result};
use parley_core::event::{EngineEvent, EventBus};
use parley_core::message::Message;
use parley_core::model::ModelSpec;
use parley_core::planning::{
    Action, PlanningMode, PlanningRequest, PlanningService, PlanningStep, ToolResult,
};
use parley_core::tool::{InvocationContext, ToolInvoker};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Input for one planning run.
#[derive(Debug, Clone)]
pub struct PlanningInput {
    pub mode: PlanningMode,
    pub model: ModelSpec,
    pub key: Option<String>,
    pub messages: Vec<Message>,
    pub enabled_tools: Vec<String>,
}

/// A finished planning run.
#[derive(Debug, Clone)]
pub struct PlanningOutcome {
    /// The planner's final answer, unchanged
    pub answer: String,

    /// Continuity handle of the last planner response
    pub task_id: Option<String>,

    /// Every tool result, in call order
    pub tool_results: Vec<ToolResult>,

    /// Planner calls made
    pub iterations: u32,
}

/// Drives a remote planner and a tool invoker until an answer arrives.
pub struct PlanningLoop {
    planner: Arc<dyn PlanningService>,
    invoker: Arc<dyn ToolInvoker>,

    /// Maximum planner calls per run
    max_iterations: u32,

    /// Deadline for each planner call
    planning_timeout: Duration,

    events: Option<Arc<EventBus>>,
}

impl PlanningLoop {
    pub fn new(planner: Arc<dyn PlanningService>, invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            planner,
            invoker,
            max_iterations: 10,
            planning_timeout: Duration::from_secs(60),
            events: None,
        }
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_planning_timeout(mut self, timeout: Duration) -> Self {
        self.planning_timeout = timeout;
        self
    }

    /// Publish `ActionPlanned` / `ToolExecuted` events on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub async fn run(&self, input: PlanningInput, cancel: &CancelFlag) -> Result<PlanningOutcome> {
        info!(
            mode = ?input.mode,
            model = %input.model.id,
            messages = input.messages.len(),
            tools = input.enabled_tools.len(),
            "Starting planning run"
        );

        let mut task_id: Option<String> = None;
        let mut tool_results: Vec<ToolResult> = Vec::new();

        for iteration in 1..=self.max_iterations {
            if cancel.take() {
                info!(iteration, "Planning cancelled");
                return Err(Error::Aborted);
            }

            let request = PlanningRequest {
                task_id: task_id.clone(),
                model: input.model.clone(),
                key: input.key.clone(),
                messages: input.messages.clone(),
                enabled_tool_names: input.enabled_tools.clone(),
                tool_results: tool_results.clone(),
            };

            debug!(iteration, results = tool_results.len(), "Planning step");
            let response = match tokio::time::timeout(
                self.planning_timeout,
                self.planner.plan(input.mode, request),
            )
            .await
            {
                Ok(response) => response?,
                Err(_) => {
                    warn!(
                        iteration,
                        timeout_secs = self.planning_timeout.as_secs(),
                        "Planner timed out"
                    );
                    return Err(ProviderError::Timeout(format!(
                        "planning step {iteration} took longer than {}s",
                        self.planning_timeout.as_secs()
                    ))
                    .into());
                }
            };
            task_id = Some(response.task_id.clone());

            let action = match response.result {
                PlanningStep::Answer(answer) => {
                    info!(
                        iterations = iteration,
                        tool_calls = tool_results.len(),
                        "Planning finished"
                    );
                    return Ok(PlanningOutcome {
                        answer: answer.text,
                        task_id,
                        tool_results,
                        iterations: iteration,
                    });
                }
                PlanningStep::Action(action) => action,
            };

            self.publish(EngineEvent::ActionPlanned {
                tool_name: action.tool_name().to_string(),
                iteration,
                timestamp: Utc::now(),
            });

            if iteration == self.max_iterations {
                // no planner call left to consume this tool's result
                break;
            }

            if cancel.take() {
                info!(iteration, tool = action.tool_name(), "Planning cancelled before tool run");
                return Err(Error::Aborted);
            }

            let context = InvocationContext {
                task_id: response.task_id,
                model: input.model.clone(),
                key: input.key.clone(),
            };
            let result = self.run_tool(&context, &action).await?;
            tool_results.push(ToolResult { action, result });
        }

        warn!(iterations = self.max_iterations, "Planning exhausted without an answer");
        Err(Error::PlanningExhausted {
            iterations: self.max_iterations,
        })
    }

    async fn run_tool(&self, context: &InvocationContext, action: &Action) -> Result<String> {
        let started = Instant::now();
        let outcome = self.invoker.invoke(context, action).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.publish(EngineEvent::ToolExecuted {
            tool_name: action.tool_name().to_string(),
            success: outcome.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });

        outcome.map_err(|e| {
            warn!(tool = action.tool_name(), error = %e, "Tool failed, aborting exchange");
            Error::Tool(e)
        })
    }

    fn publish(&self, event: EngineEvent) {
        if let Some(bus) = &self.events {
            bus.publish(event);
        }
    }
}
