//! Tool abstractions.
//!
//! Tools are remote capabilities the planner can ask for (web search,
//! page fetching, ...). The engine knows them by [`ToolSummary`] and runs
//! them through a [`ToolInvoker`], which in turn talks to a [`ToolService`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ProviderError, ToolError};
use crate::model::ModelSpec;
use crate::planning::{Action, ToolResult};

/// Describes a tool to both the user and the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSummary {
    pub name_for_human: String,
    pub name_for_model: String,
    pub description_for_model: String,
    pub description_for_human: String,
    #[serde(default)]
    pub display_for_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

impl ToolSummary {
    /// A summary whose human and model facing fields match.
    pub fn named(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        let description = description.into();
        Self {
            name_for_human: name.clone(),
            name_for_model: name,
            description_for_model: description.clone(),
            description_for_human: description,
            display_for_user: true,
            logo_url: None,
        }
    }
}

/// Request to execute one planned action remotely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunToolRequest {
    pub task_id: String,
    pub model: ModelSpec,
    pub input: String,
    #[serde(with = "crate::planning::tagged_action")]
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// Everything an invoker needs besides the action itself.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub task_id: String,
    pub model: ModelSpec,
    pub key: Option<String>,
}

/// The remote tool runner.
#[async_trait]
pub trait ToolService: Send + Sync {
    /// Execute the action's tool and return the executed action with its result.
    async fn run(&self, request: RunToolRequest) -> std::result::Result<ToolResult, ProviderError>;

    /// Tools the service can run.
    async fn list(&self) -> std::result::Result<Vec<ToolSummary>, ProviderError> {
        Ok(Vec::new())
    }
}

/// Executes a single named tool with textual input.
///
/// No retries happen at this level; the planning loop owns retry policy.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn invoke(
        &self,
        context: &InvocationContext,
        action: &Action,
    ) -> std::result::Result<String, ToolError>;
}

/// The set of tools available to a conversation, keyed by model-facing name.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: BTreeMap<String, ToolSummary>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: ToolSummary) {
        self.tools.insert(tool.name_for_model.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&ToolSummary> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Model-facing names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl FromIterator<ToolSummary> for ToolCatalog {
    fn from_iter<I: IntoIterator<Item = ToolSummary>>(iter: I) -> Self {
        let mut catalog = ToolCatalog::new();
        for tool in iter {
            catalog.register(tool);
        }
        catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_register_and_lookup() {
        let mut catalog = ToolCatalog::new();
        catalog.register(ToolSummary::named("search", "Search the web"));
        assert!(catalog.contains("search"));
        assert!(catalog.get("nonexistent").is_none());
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn catalog_names_are_sorted_and_deduplicated() {
        let catalog: ToolCatalog = vec![
            ToolSummary::named("wikipedia", "Encyclopedia"),
            ToolSummary::named("calculator", "Math"),
            ToolSummary::named("wikipedia", "Encyclopedia, again"),
        ]
        .into_iter()
        .collect();
        assert_eq!(catalog.names(), vec!["calculator", "wikipedia"]);
        assert_eq!(
            catalog.get("wikipedia").unwrap().description_for_model,
            "Encyclopedia, again"
        );
    }

    #[test]
    fn summary_wire_format() {
        let json = serde_json::to_value(ToolSummary::named("search", "Search")).unwrap();
        assert_eq!(json["nameForModel"], "search");
        assert_eq!(json["displayForUser"], true);
        assert!(json.get("logoUrl").is_none());
    }
}
