//! Agent modes: the planning loop with remote tools.
//!
//! The single-shot agent plans from the outgoing message alone; the
//! conversational agent hands the planner the whole transcript.

use async_trait::async_trait;
use parley_core::cancel::CancelFlag;
use parley_core::event::{EventBus, StateSink};
use parley_core::message::{Conversation, Message};
use parley_core::mode::ChatModeId;
use parley_core::planning::{PlanningMode, PlanningService};
use parley_core::tool::{ToolCatalog, ToolService};
use parley_tools::RemoteToolInvoker;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{ChatModeRunner, ExchangeFailure, RunParams};
use crate::planning::{PlanningInput, PlanningLoop};

/// Limits applied to every planning run.
#[derive(Debug, Clone, Copy)]
pub struct PlanningSettings {
    pub max_iterations: u32,
    pub planning_timeout: Duration,
    pub tool_timeout: Duration,
}

impl Default for PlanningSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            planning_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
        }
    }
}

pub struct AgentRunner {
    mode: PlanningMode,
    planner: Arc<dyn PlanningService>,
    tools: Arc<dyn ToolService>,
    settings: PlanningSettings,
    events: Option<Arc<EventBus>>,
}

impl AgentRunner {
    /// The agent that only sees the current message.
    pub fn single_shot(planner: Arc<dyn PlanningService>, tools: Arc<dyn ToolService>) -> Self {
        Self::new(PlanningMode::SingleShot, planner, tools)
    }

    /// The agent that sees the whole transcript.
    pub fn conversational(planner: Arc<dyn PlanningService>, tools: Arc<dyn ToolService>) -> Self {
        Self::new(PlanningMode::Conversational, planner, tools)
    }

    fn new(
        mode: PlanningMode,
        planner: Arc<dyn PlanningService>,
        tools: Arc<dyn ToolService>,
    ) -> Self {
        Self {
            mode,
            planner,
            tools,
            settings: PlanningSettings::default(),
            events: None,
        }
    }

    pub fn with_settings(mut self, settings: PlanningSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Tools the service offers right now. `None` when it lists nothing or
    /// cannot be reached; enabled tools are then sent without checking.
    async fn catalog(&self) -> Option<ToolCatalog> {
        match tokio::time::timeout(self.settings.tool_timeout, self.tools.list()).await {
            Ok(Ok(tools)) if !tools.is_empty() => Some(tools.into_iter().collect()),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!(error = %e, "Could not list tools, skipping the catalog check");
                None
            }
            Err(_) => {
                warn!("Listing tools timed out, skipping the catalog check");
                None
            }
        }
    }

    fn planning_loop(&self, params: &RunParams, catalog: Option<ToolCatalog>) -> PlanningLoop {
        let invoker = RemoteToolInvoker::new(
            self.tools.clone(),
            params.tools.iter().cloned(),
            self.settings.tool_timeout,
        );
        let invoker = match catalog {
            Some(catalog) => invoker.with_catalog(catalog),
            None => invoker,
        };
        let planning = PlanningLoop::new(self.planner.clone(), Arc::new(invoker))
            .with_max_iterations(self.settings.max_iterations)
            .with_planning_timeout(self.settings.planning_timeout);
        match &self.events {
            Some(bus) => planning.with_events(bus.clone()),
            None => planning,
        }
    }

    fn planning_messages(&self, params: &RunParams) -> Vec<Message> {
        match self.mode {
            PlanningMode::SingleShot => vec![params.message.clone()],
            PlanningMode::Conversational => params.body.messages.clone(),
        }
    }
}

#[async_trait]
impl ChatModeRunner for AgentRunner {
    fn mode(&self) -> ChatModeId {
        match self.mode {
            PlanningMode::SingleShot => ChatModeId::Agent,
            PlanningMode::Conversational => ChatModeId::ConversationalAgent,
        }
    }

    async fn execute(
        &self,
        params: &RunParams,
        cancel: &CancelFlag,
        _sink: &dyn StateSink,
    ) -> Result<Conversation, ExchangeFailure> {
        let input = PlanningInput {
            mode: self.mode,
            model: params.body.model.clone(),
            key: params.body.key.clone(),
            messages: self.planning_messages(params),
            enabled_tools: params.tools.clone(),
        };

        let catalog = if params.tools.is_empty() {
            None
        } else {
            self.catalog().await
        };

        let outcome = self
            .planning_loop(params, catalog)
            .run(input, cancel)
            .await
            .map_err(|e| ExchangeFailure::new(params.conversation.clone(), e))?;

        debug!(
            conversation_id = %params.conversation.id,
            iterations = outcome.iterations,
            tool_calls = outcome.tool_results.len(),
            "Agent answered"
        );
        Ok(params.conversation.with_message(Message::assistant(outcome.answer)))
    }
}
