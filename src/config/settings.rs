// Configuration structs

use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::Deserialize;

use super::constants::*;

#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address for the public API server
    pub bind_address: String,

    /// Bind address for the analysis gateway
    pub gateway_bind_address: String,

    /// URL the API server uses to reach the gateway
    pub gateway_url: String,

    /// Path to the SQLite domain store
    pub db_path: PathBuf,

    /// Directory for JSONL request metrics
    pub metrics_dir: PathBuf,

    /// Anthropic API key; when absent the provider worker answers with the
    /// local engine only
    pub anthropic_api_key: Option<String>,

    /// Claude model name for provider requests
    pub chat_model: String,

    /// Maximum tokens per provider request
    pub max_tokens: u32,

    /// Sampling temperature for provider requests
    pub temperature: f32,

    /// Concurrent provider requests allowed in flight
    pub max_concurrent_requests: usize,

    /// HTTP timeout for outbound calls, in seconds
    pub request_timeout_secs: u64,

    /// Largest accepted upload, in bytes
    pub max_file_size: usize,

    /// Budget used to translate priority scores into absolute amounts
    pub total_budget: f64,

    /// Sustained request rate per client IP
    pub rate_limit_rps: f64,

    /// Burst capacity per client IP
    pub rate_limit_burst: f64,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let base = home.join(".civica");
        Self {
            bind_address: DEFAULT_API_ADDR.to_string(),
            gateway_bind_address: DEFAULT_GATEWAY_ADDR.to_string(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            db_path: base.join("civica.db"),
            metrics_dir: base.join("metrics"),
            anthropic_api_key: None,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            total_budget: DEFAULT_TOTAL_BUDGET,
            rate_limit_rps: DEFAULT_RATE_LIMIT_RPS,
            rate_limit_burst: DEFAULT_RATE_LIMIT_BURST,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            bail!("bind_address is not a valid socket address: {}", self.bind_address);
        }
        if self
            .gateway_bind_address
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            bail!(
                "gateway_bind_address is not a valid socket address: {}",
                self.gateway_bind_address
            );
        }
        if !self.gateway_url.starts_with("http://") && !self.gateway_url.starts_with("https://") {
            bail!("gateway_url must be http(s): {}", self.gateway_url);
        }
        if self.max_concurrent_requests == 0 {
            bail!("max_concurrent_requests must be at least 1");
        }
        if self.total_budget <= 0.0 {
            bail!("total_budget must be positive");
        }
        if self.rate_limit_rps <= 0.0 || self.rate_limit_burst < 1.0 {
            bail!("rate limit settings must be positive");
        }
        Ok(())
    }
}

/// On-disk TOML shape. Every field is optional; absent fields keep defaults.
#[derive(Debug, Default, Deserialize)]
pub(super) struct TomlConfig {
    pub bind_address: Option<String>,
    pub gateway_bind_address: Option<String>,
    pub gateway_url: Option<String>,
    pub db_path: Option<PathBuf>,
    pub metrics_dir: Option<PathBuf>,
    pub anthropic_api_key: Option<String>,
    pub chat_model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub max_concurrent_requests: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub max_file_size: Option<usize>,
    pub total_budget: Option<f64>,
    pub rate_limit_rps: Option<f64>,
    pub rate_limit_burst: Option<f64>,
}

impl TomlConfig {
    pub(super) fn apply(self, config: &mut Config) {
        if let Some(v) = self.bind_address {
            config.bind_address = v;
        }
        if let Some(v) = self.gateway_bind_address {
            config.gateway_bind_address = v;
        }
        if let Some(v) = self.gateway_url {
            config.gateway_url = v;
        }
        if let Some(v) = self.db_path {
            config.db_path = v;
        }
        if let Some(v) = self.metrics_dir {
            config.metrics_dir = v;
        }
        if let Some(v) = self.anthropic_api_key {
            config.anthropic_api_key = Some(v);
        }
        if let Some(v) = self.chat_model {
            config.chat_model = v;
        }
        if let Some(v) = self.max_tokens {
            config.max_tokens = v;
        }
        if let Some(v) = self.temperature {
            config.temperature = v;
        }
        if let Some(v) = self.max_concurrent_requests {
            config.max_concurrent_requests = v;
        }
        if let Some(v) = self.request_timeout_secs {
            config.request_timeout_secs = v;
        }
        if let Some(v) = self.max_file_size {
            config.max_file_size = v;
        }
        if let Some(v) = self.total_budget {
            config.total_budget = v;
        }
        if let Some(v) = self.rate_limit_rps {
            config.rate_limit_rps = v;
        }
        if let Some(v) = self.rate_limit_burst {
            config.rate_limit_burst = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_bind_address_rejected() {
        let mut config = Config::default();
        config.bind_address = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_gateway_url_rejected() {
        let mut config = Config::default();
        config.gateway_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_overrides_apply() {
        let toml: TomlConfig = toml::from_str(
            r#"
            bind_address = "0.0.0.0:9000"
            chat_model = "claude-3-opus-20240229"
            total_budget = 1000000.0
            "#,
        )
        .unwrap();

        let mut config = Config::default();
        toml.apply(&mut config);
        assert_eq!(config.bind_address, "0.0.0.0:9000");
        assert_eq!(config.chat_model, "claude-3-opus-20240229");
        assert!((config.total_budget - 1_000_000.0).abs() < 1e-9);
        // Untouched fields keep their defaults
        assert_eq!(config.max_tokens, DEFAULT_MAX_TOKENS);
    }
}
