use std::path::PathBuf;

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid {name}: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Upstream chat-completions endpoint. Must end in `chat/completions`
    /// so the models URL can be derived from it.
    pub upstream_url: String,
    /// Fallback key when the client sends no `Authorization` header.
    pub upstream_api_key: String,
    /// Directory for per-request SSE capture files; `None` disables capture.
    pub sse_log_dir: Option<PathBuf>,
    pub log_level: String,
}

const DEFAULT_UPSTREAM_URL: &str = "https://llm.chutes.ai/v1/chat/completions";
const CHAT_COMPLETIONS_SUFFIX: &str = "chat/completions";

fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            upstream_api_key: String::new(),
            sse_log_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Derive the upstream models URL from the completions URL.
    #[must_use]
    pub fn upstream_models_url(&self) -> String {
        let base = &self.upstream_url[..self.upstream_url.len() - CHAT_COMPLETIONS_SUFFIX.len()];
        format!("{base}models")
    }
}

/// Load configuration from the environment and validate it.
///
/// Recognized variables: `UPSTREAM_URL`, `UPSTREAM_API_KEY`, `HOST`, `PORT`,
/// `SSELOG_DIR`, `LOG_LEVEL`.
///
/// # Errors
///
/// Returns [`ConfigError`] when a variable fails to parse or semantic
/// validation fails.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let config = AppConfig {
        host: env_or("HOST", default_host),
        port: parse_port(std::env::var("PORT").ok())?,
        upstream_url: env_or("UPSTREAM_URL", || DEFAULT_UPSTREAM_URL.to_string()),
        upstream_api_key: std::env::var("UPSTREAM_API_KEY").unwrap_or_default(),
        sse_log_dir: std::env::var("SSELOG_DIR")
            .ok()
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from),
        log_level: env_or("LOG_LEVEL", default_log_level),
    };
    validate_config(&config)?;
    Ok(config)
}

fn env_or(name: &str, default: impl FnOnce() -> String) -> String {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => default(),
    }
}

fn parse_port(raw: Option<String>) -> Result<u16, ConfigError> {
    match raw {
        None => Ok(default_port()),
        Some(value) if value.is_empty() => Ok(default_port()),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name: "PORT",
            value,
        }),
    }
}

fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if !config.upstream_url.starts_with("http://") && !config.upstream_url.starts_with("https://") {
        return Err(ConfigError::Validation(format!(
            "UPSTREAM_URL must be an http(s) URL, got '{}'",
            config.upstream_url
        )));
    }
    if !config.upstream_url.ends_with(CHAT_COMPLETIONS_SUFFIX) {
        return Err(ConfigError::Validation(format!(
            "UPSTREAM_URL must end with '{CHAT_COMPLETIONS_SUFFIX}', got '{}'",
            config.upstream_url
        )));
    }
    Ok(())
}
