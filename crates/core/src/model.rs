//! Model descriptors and the built-in model catalogue.

use serde::{Deserialize, Serialize};

/// Identifier of the model used when a conversation names an unknown one.
pub const FALLBACK_MODEL_ID: &str = "gpt-3.5-turbo";

/// A chat model and its limits.
///
/// `token_limit` bounds prompt plus completion tokens and is always > 0.
/// `max_length` is the maximum input length in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub id: String,
    pub name: String,
    pub max_length: usize,
    pub token_limit: usize,
}

/// The budget-relevant subset of a [`ModelSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelLimits {
    pub token_limit: usize,
    pub max_input_length: usize,
}

impl ModelSpec {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        max_length: usize,
        token_limit: usize,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            max_length,
            token_limit,
        }
    }

    pub fn limits(&self) -> ModelLimits {
        ModelLimits {
            token_limit: self.token_limit,
            max_input_length: self.max_length,
        }
    }

    /// Whether the model speaks the chat-transcript format.
    pub fn is_chat(&self) -> bool {
        let id = self.id.as_str();
        id.contains("gpt-3.5-turbo") || id.contains("gpt-35-turbo") || id.contains("gpt-4")
    }

    /// Look up a model in the built-in catalogue.
    pub fn known(id: &str) -> Option<Self> {
        catalogue().into_iter().find(|m| m.id == id)
    }

    /// Look up a model, falling back to [`FALLBACK_MODEL_ID`].
    pub fn resolve(id: &str) -> Self {
        Self::known(id).unwrap_or_else(Self::fallback)
    }

    pub fn fallback() -> Self {
        Self::new(FALLBACK_MODEL_ID, "GPT-3.5", 12000, 4000)
    }
}

/// All models the engine knows the limits of.
pub fn catalogue() -> Vec<ModelSpec> {
    vec![
        ModelSpec::new("gpt-3.5-turbo", "GPT-3.5", 12000, 4000),
        ModelSpec::new("gpt-35-turbo", "GPT-3.5", 12000, 4000),
        ModelSpec::new("gpt-4", "GPT-4", 24000, 8000),
        ModelSpec::new("gpt-4-32k", "GPT-4-32K", 96000, 32000),
    ]
}
