//! Mode selection and message sending.

use chrono::Utc;
use parley_config::AppConfig;
use parley_core::cancel::CancelFlag;
use parley_core::event::{EngineEvent, EventBus, StateSink};
use parley_core::message::{Conversation, Message};
use parley_core::mode::{ChatModeId, ChatModeKey};
use parley_providers::Services;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::agent::PlanningSettings;
use super::{
    AgentRunner, ChatBody, ChatModeRunner, DirectRunner, ExchangeOutcome, GoogleRunner, RunParams,
};

/// Holds one runner per chat mode.
pub struct ModeDispatcher {
    direct: Arc<dyn ChatModeRunner>,
    google: Arc<dyn ChatModeRunner>,
    agent: Arc<dyn ChatModeRunner>,
    conversational: Arc<dyn ChatModeRunner>,
}

impl ModeDispatcher {
    pub fn new(
        direct: Arc<dyn ChatModeRunner>,
        google: Arc<dyn ChatModeRunner>,
        agent: Arc<dyn ChatModeRunner>,
        conversational: Arc<dyn ChatModeRunner>,
    ) -> Self {
        Self {
            direct,
            google,
            agent,
            conversational,
        }
    }

    /// Wire every runner to `services` with limits from `config`.
    pub fn from_services(
        services: &Services,
        config: &AppConfig,
        events: Option<Arc<EventBus>>,
    ) -> Self {
        let engine = &config.engine;
        let direct = DirectRunner::new(services.completion.clone())
            .with_reserved_for_completion(engine.reserved_for_completion);

        let mut google = GoogleRunner::new(services.search.clone());
        if let Some((api_key, cse_id)) = config.google_credentials() {
            google = google.with_default_credentials(api_key, cse_id);
        }

        let settings = PlanningSettings {
            max_iterations: engine.max_planning_iterations,
            planning_timeout: Duration::from_secs(engine.planning_timeout_secs),
            tool_timeout: Duration::from_secs(engine.tool_timeout_secs),
        };
        let agent_runner = |runner: AgentRunner| {
            let runner = runner.with_settings(settings);
            match &events {
                Some(bus) => runner.with_events(bus.clone()),
                None => runner,
            }
        };
        let agent = agent_runner(AgentRunner::single_shot(
            services.planner.clone(),
            services.tools.clone(),
        ));
        let conversational = agent_runner(AgentRunner::conversational(
            services.planner.clone(),
            services.tools.clone(),
        ));

        Self::new(
            Arc::new(direct),
            Arc::new(google),
            Arc::new(agent),
            Arc::new(conversational),
        )
    }

    /// The runner for `mode`; no mode means [`ChatModeId::Direct`].
    pub fn select(&self, mode: Option<ChatModeId>) -> Arc<dyn ChatModeRunner> {
        match mode.unwrap_or_default() {
            ChatModeId::Direct => self.direct.clone(),
            ChatModeId::GoogleSearch => self.google.clone(),
            ChatModeId::Agent => self.agent.clone(),
            ChatModeId::ConversationalAgent => self.conversational.clone(),
        }
    }
}

/// How one message is sent.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    /// Trailing messages to drop before appending, for edits and regenerations
    pub delete_count: usize,

    pub mode: Option<ChatModeId>,

    /// Tools enabled for agent modes
    pub tools: Vec<String>,
}

/// Turns a user message into an exchange on the selected conversation.
pub struct MessageSender {
    dispatcher: Arc<ModeDispatcher>,
    api_key: Option<String>,
    mode_keys: Vec<ChatModeKey>,
    events: Option<Arc<EventBus>>,
}

impl MessageSender {
    pub fn new(dispatcher: Arc<ModeDispatcher>) -> Self {
        Self {
            dispatcher,
            api_key: None,
            mode_keys: Vec::new(),
            events: None,
        }
    }

    /// The user's API key, sent with every request.
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_mode_keys(mut self, keys: Vec<ChatModeKey>) -> Self {
        self.mode_keys = keys;
        self
    }

    /// Publish an `ExchangeFinished` event after every send.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Build the exchange parameters without running anything.
    pub fn prepare(
        &self,
        selected: &Conversation,
        message: Message,
        options: &SendOptions,
    ) -> RunParams {
        let conversation = selected.with_user_message(message.clone(), options.delete_count);
        RunParams {
            body: ChatBody {
                model: conversation.model.clone(),
                messages: conversation.messages.clone(),
                key: self.api_key.clone(),
                prompt: selected.prompt.clone(),
                temperature: selected.temperature,
            },
            conversation,
            message,
            tools: options.tools.clone(),
            mode_keys: self.mode_keys.clone(),
        }
    }

    pub async fn send(
        &self,
        selected: &Conversation,
        message: Message,
        options: SendOptions,
        cancel: &CancelFlag,
        sink: &dyn StateSink,
    ) -> ExchangeOutcome {
        let runner = self.dispatcher.select(options.mode);
        let params = self.prepare(selected, message, &options);
        info!(
            conversation_id = %selected.id,
            mode = %runner.mode(),
            messages = params.conversation.messages.len(),
            delete_count = options.delete_count,
            "Sending message"
        );

        let outcome = runner.run(params, cancel, sink).await;

        if let Some(bus) = &self.events {
            bus.publish(EngineEvent::ExchangeFinished {
                mode: outcome.mode,
                success: outcome.is_success(),
                aborted: outcome.is_aborted(),
                timestamp: Utc::now(),
            });
        }
        outcome
    }
}
