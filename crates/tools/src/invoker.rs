//! Remote tool invoker.
//!
//! Resolves the tool an [`Action`] names against the tools known to the
//! service and the tools enabled for the current exchange, then runs it
//! remotely under a deadline. Every failure carries the tool name. There
//! are no retries here.

use async_trait::async_trait;
use parley_core::error::ToolError;
use parley_core::planning::Action;
use parley_core::tool::{InvocationContext, RunToolRequest, ToolCatalog, ToolInvoker, ToolService};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct RemoteToolInvoker {
    service: Arc<dyn ToolService>,
    enabled: BTreeSet<String>,
    catalog: Option<ToolCatalog>,
    timeout: Duration,
}

impl RemoteToolInvoker {
    /// An invoker that may run exactly the `enabled` tools.
    pub fn new<I, S>(service: Arc<dyn ToolService>, enabled: I, timeout: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service,
            enabled: enabled.into_iter().map(Into::into).collect(),
            catalog: None,
            timeout,
        }
    }

    /// Reject tools the service does not offer with [`ToolError::NotFound`]
    /// instead of [`ToolError::Disabled`].
    pub fn with_catalog(mut self, catalog: ToolCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Names of the enabled tools, sorted.
    pub fn enabled_names(&self) -> Vec<String> {
        self.enabled.iter().cloned().collect()
    }

    fn check(&self, name: &str) -> Result<(), ToolError> {
        if name.trim().is_empty() {
            return Err(ToolError::NotFound("(unnamed)".into()));
        }
        if let Some(catalog) = &self.catalog {
            if !catalog.contains(name) {
                return Err(ToolError::NotFound(name.into()));
            }
        }
        if !self.enabled.contains(name) {
            return Err(ToolError::Disabled(name.into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ToolInvoker for RemoteToolInvoker {
    async fn invoke(
        &self,
        context: &InvocationContext,
        action: &Action,
    ) -> Result<String, ToolError> {
        let name = action.tool_name();
        self.check(name)?;

        let request = RunToolRequest {
            task_id: context.task_id.clone(),
            model: context.model.clone(),
            input: action.tool_input.clone(),
            action: action.clone(),
            key: context.key.clone(),
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.service.run(request)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Err(_) => {
                warn!(tool = name, timeout_secs = self.timeout.as_secs(), "Tool timed out");
                Err(ToolError::Timeout {
                    tool_name: name.into(),
                    timeout_secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) => {
                warn!(tool = name, error = %e, "Tool failed");
                Err(ToolError::ExecutionFailed {
                    tool_name: name.into(),
                    reason: e
                        .service_message()
                        .map(str::to_string)
                        .unwrap_or_else(|| e.to_string()),
                })
            }
            Ok(Ok(result)) => {
                debug!(tool = name, elapsed_ms, bytes = result.result.len(), "Tool finished");
                Ok(result.result)
            }
        }
    }
}
