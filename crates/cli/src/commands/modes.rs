//! `parley modes`: list chat modes and the keys they need.

use parley_config::AppConfig;
use parley_core::mode::ChatModeId;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    for line in describe(&config) {
        println!("{line}");
    }
    Ok(())
}

fn describe(config: &AppConfig) -> Vec<String> {
    ChatModeId::ALL
        .iter()
        .map(|mode| {
            let keys = mode.required_keys();
            let needs = if keys.is_empty() {
                String::new()
            } else {
                let status = if config.google_credentials().is_some() {
                    "configured"
                } else {
                    "missing"
                };
                format!("  requires {} ({status})", keys.join(", "))
            };
            format!("  {:<22} {:<22}{needs}", mode.as_str(), mode.name())
        })
        .collect()
}
