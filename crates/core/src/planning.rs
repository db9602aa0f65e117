//! Planning service contract and the plan/act/observe wire types.
//!
//! A remote planner receives the transcript, the enabled tool names and the
//! results of every tool run so far, and answers with one [`PlanningStep`]:
//! either an [`Action`] to execute or a final [`Answer`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::model::ModelSpec;
use crate::tool::ToolSummary;

/// The planner wants a tool to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    pub thought: String,

    /// The tool to run
    #[serde(rename = "plugin")]
    pub tool: ToolSummary,

    /// Free-form input for the tool
    #[serde(rename = "pluginInput")]
    pub tool_input: String,
}

impl Action {
    /// The model-facing name of the tool this action targets.
    pub fn tool_name(&self) -> &str {
        &self.tool.name_for_model
    }
}

/// The planner is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(rename = "answer")]
    pub text: String,
}

/// One planner decision. Terminal state is [`PlanningStep::Answer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlanningStep {
    Action(Action),
    Answer(Answer),
}

/// An executed action and the text its tool produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    #[serde(with = "tagged_action")]
    pub action: Action,
    pub result: String,
}

/// Serializes an [`Action`] outside a [`PlanningStep`] with its
/// `"type": "action"` tag, the shape remote services expect.
pub(crate) mod tagged_action {
    use super::Action;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct Tagged<'a> {
        #[serde(rename = "type")]
        kind: &'static str,
        #[serde(flatten)]
        action: &'a Action,
    }

    pub fn serialize<S: Serializer>(action: &Action, serializer: S) -> Result<S::Ok, S::Error> {
        Tagged {
            kind: "action",
            action,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Action, D::Error> {
        Action::deserialize(deserializer)
    }
}

/// Which planner endpoint to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanningMode {
    /// Plans from the latest user message only.
    SingleShot,
    /// Plans with the whole transcript as context.
    Conversational,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningRequest {
    /// Continuity handle returned by the previous step, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    pub model: ModelSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    pub messages: Vec<Message>,

    pub enabled_tool_names: Vec<String>,

    /// Every tool result so far, in call order
    #[serde(rename = "pluginResults")]
    pub tool_results: Vec<ToolResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningResponse {
    pub task_id: String,
    pub result: PlanningStep,
}

/// The remote planner.
#[async_trait]
pub trait PlanningService: Send + Sync {
    async fn plan(
        &self,
        mode: PlanningMode,
        request: PlanningRequest,
    ) -> std::result::Result<PlanningResponse, ProviderError>;
}
