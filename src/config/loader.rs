// Configuration loader
// Merges defaults <- ~/.civica/config.toml <- environment variables

use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

use super::settings::{Config, TomlConfig};

/// Load configuration. A missing config file is fine: defaults plus
/// environment overrides always produce a runnable config.
pub fn load_config() -> Result<Config> {
    let mut config = Config::default();

    if let Some(path) = config_path() {
        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let toml_config: TomlConfig = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            toml_config.apply(&mut config);
            tracing::info!(path = %path.display(), "Loaded configuration file");
        }
    }

    apply_env(&mut config);

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".civica").join("config.toml"))
}

/// Environment variables win over the config file.
fn apply_env(config: &mut Config) {
    if let Ok(v) = std::env::var("CIVICA_BIND_ADDR") {
        if !v.is_empty() {
            config.bind_address = v;
        }
    }
    if let Ok(v) = std::env::var("CIVICA_GATEWAY_BIND_ADDR") {
        if !v.is_empty() {
            config.gateway_bind_address = v;
        }
    }
    if let Ok(v) = std::env::var("CIVICA_GATEWAY_URL") {
        if !v.is_empty() {
            config.gateway_url = v;
        }
    }
    if let Ok(v) = std::env::var("CIVICA_DB_PATH") {
        if !v.is_empty() {
            config.db_path = PathBuf::from(v);
        }
    }
    if let Ok(v) = std::env::var("CIVICA_METRICS_DIR") {
        if !v.is_empty() {
            config.metrics_dir = PathBuf::from(v);
        }
    }
    if let Ok(v) = std::env::var("ANTHROPIC_API_KEY") {
        if !v.is_empty() {
            config.anthropic_api_key = Some(v);
        }
    }
    if let Ok(v) = std::env::var("CIVICA_CHAT_MODEL") {
        if !v.is_empty() {
            config.chat_model = v;
        }
    }
    if let Ok(v) = std::env::var("CIVICA_TOTAL_BUDGET") {
        if let Ok(parsed) = v.parse() {
            config.total_budget = parsed;
        }
    }
}
