//! `parley config`: configuration commands.

use parley_config::{ApiType, AppConfig};

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", config.redacted_toml());
    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
}

pub fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   warning: {w}");
        }
    }

    println!();
    println!("   API:      {} ({})", config.api_host, api_type_name(config.api_type));
    println!("   Model:    {}", config.default_model_spec().id);
    println!("   Agent:    {}", config.agent.base_url);
    println!(
        "   Limits:   {} reserved tokens, {} planning steps",
        config.engine.reserved_for_completion, config.engine.max_planning_iterations
    );
    Ok(())
}

fn api_type_name(api_type: ApiType) -> &'static str {
    match api_type {
        ApiType::OpenAi => "openai",
        ApiType::Azure => "azure",
    }
}

/// Problems that do not stop Parley from starting.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.has_api_key() {
        warnings.push("No API key set (set PARLEY_API_KEY or OPENAI_API_KEY)".to_string());
    }
    if parley_core::model::ModelSpec::known(&config.default_model).is_none() {
        warnings.push(format!(
            "Unknown default_model '{}', falling back to {}",
            config.default_model,
            config.default_model_spec().id
        ));
    }
    if config.google_credentials().is_none() {
        warnings.push("Google Search needs GOOGLE_API_KEY and GOOGLE_CSE_ID".to_string());
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_path_is_valid() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.to_str().unwrap().contains("config.toml"));
    }

    #[test]
    fn defaults_warn_about_missing_keys() {
        let w = warnings(&AppConfig::default());
        assert!(w.iter().any(|w| w.contains("No API key")));
        assert!(w.iter().any(|w| w.contains("Google Search")));
    }

    #[test]
    fn unknown_model_is_flagged() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk".into());
        config.default_model = "gpt-9".into();
        let w = warnings(&config);
        assert_eq!(w.len(), 2);
        assert!(w[0].contains("gpt-9"));
    }
}
