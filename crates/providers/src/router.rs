//! Service wiring: build every remote service from configuration.

use parley_config::{ApiType, AppConfig};
use parley_core::planning::PlanningService;
use parley_core::provider::{CompletionService, SearchService};
use parley_core::tool::ToolService;
use std::sync::Arc;
use std::time::Duration;

use crate::agent_api::AgentApiClient;
use crate::google::GoogleSearchService;
use crate::openai_compat::{Endpoint, OpenAiCompletionService, StreamTimeouts};

/// All remote collaborators of one engine.
#[derive(Clone)]
pub struct Services {
    pub completion: Arc<dyn CompletionService>,
    pub planner: Arc<dyn PlanningService>,
    pub tools: Arc<dyn ToolService>,
    pub search: Arc<dyn SearchService>,
}

/// The completion endpoint described by `config`.
pub fn endpoint_from_config(config: &AppConfig) -> Endpoint {
    match config.api_type {
        ApiType::OpenAi => Endpoint::OpenAi {
            host: config.api_host.clone(),
            organization: config.organization.clone(),
        },
        ApiType::Azure => Endpoint::Azure {
            host: config.api_host.clone(),
            deployment_id: config.azure_deployment_id.clone().unwrap_or_default(),
            api_version: config.api_version.clone(),
        },
    }
}

/// Build services from configuration.
pub fn build_from_config(config: &AppConfig) -> Services {
    let request_timeout = Duration::from_secs(config.engine.request_timeout_secs);

    let completion = Arc::new(OpenAiCompletionService::new(
        endpoint_from_config(config),
        config.api_key.clone(),
        StreamTimeouts {
            connect: request_timeout,
            idle: Duration::from_secs(config.engine.stream_idle_timeout_secs),
        },
    ));

    // per-call deadlines are enforced by the engine; this only bounds the socket
    let agent = Arc::new(AgentApiClient::new(&config.agent.base_url, request_timeout));

    let search_base = config
        .google
        .base_url
        .clone()
        .unwrap_or_else(|| config.agent.base_url.clone());
    let search = Arc::new(GoogleSearchService::new(search_base, request_timeout));

    tracing::debug!(
        completion = completion.name(),
        agent = agent.base_url(),
        "Services configured"
    );

    Services {
        completion,
        planner: agent.clone(),
        tools: agent,
        search,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_endpoint_from_default_config() {
        let config = AppConfig::default();
        let endpoint = endpoint_from_config(&config);
        assert_eq!(
            endpoint.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn azure_endpoint_from_config() {
        let config = AppConfig {
            api_type: ApiType::Azure,
            api_host: "https://corp.openai.azure.com".into(),
            azure_deployment_id: Some("chat".into()),
            ..AppConfig::default()
        };
        assert!(
            endpoint_from_config(&config)
                .completions_url()
                .contains("/openai/deployments/chat/")
        );
    }

    #[test]
    fn build_from_default_config() {
        let services = build_from_config(&AppConfig::default());
        assert_eq!(services.completion.name(), "openai");
        assert_eq!(services.search.name(), "google");
    }
}
