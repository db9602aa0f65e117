//! `parley tools`: list the tools the agent service can run.

use parley_config::AppConfig;
use parley_core::tool::{ToolCatalog, ToolSummary};
use tracing::debug;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let services = parley_providers::build_from_config(&config);

    let tools = services
        .tools
        .list()
        .await
        .map_err(|e| format!("Failed to list tools from {}: {e}", config.agent.base_url))?;
    debug!(count = tools.len(), base_url = %config.agent.base_url, "Listed tools");

    if tools.is_empty() {
        println!("  No tools available at {}", config.agent.base_url);
        return Ok(());
    }
    for line in describe(&tools, &config.agent.default_tools) {
        println!("{line}");
    }
    Ok(())
}

/// One line per tool; default tools are starred, unknown defaults flagged.
fn describe(tools: &[ToolSummary], defaults: &[String]) -> Vec<String> {
    let catalog: ToolCatalog = tools.iter().cloned().collect();

    let mut lines: Vec<String> = catalog
        .names()
        .into_iter()
        .filter_map(|name| {
            let tool = catalog.get(&name)?;
            let marker = if defaults.contains(&name) { '*' } else { ' ' };
            Some(format!("{marker} {:<24} {}", name, tool.description_for_human))
        })
        .collect();

    for missing in defaults.iter().filter(|d| !catalog.contains(d)) {
        lines.push(format!("  warning: default tool '{missing}' is not offered by the service"));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stars_default_tools() {
        let tools = vec![
            ToolSummary::named("web-search", "Search the web"),
            ToolSummary::named("calculator", "Do arithmetic"),
        ];
        let lines = describe(&tools, &["calculator".to_string()]);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("* calculator"));
        assert!(lines[1].starts_with("  web-search"));
        assert!(lines[1].ends_with("Search the web"));
    }

    #[test]
    fn flags_defaults_the_service_lacks() {
        let tools = vec![ToolSummary::named("calculator", "Do arithmetic")];
        let lines = describe(&tools, &["weather".to_string()]);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("'weather'"));
    }
}
