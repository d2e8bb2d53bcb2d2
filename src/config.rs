use std::env;
use std::path::PathBuf;

pub const APP_NAME: &str = "Careloop";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default bind address for the HTTP API.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8590";

/// Application data directory, created on first use by the caller.
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("careloop")
}

pub fn database_path() -> PathBuf {
    app_data_dir().join("careloop.db")
}

/// Connection settings for the chat-completion endpoint, read from the
/// environment at startup.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            api_key: String::new(),
            model: "gpt-4o-mini".into(),
            timeout_secs: 90,
        }
    }
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env::var("CARELOOP_LLM_URL").unwrap_or(defaults.base_url),
            api_key: env::var("CARELOOP_LLM_API_KEY").unwrap_or(defaults.api_key),
            model: env::var("CARELOOP_LLM_MODEL").unwrap_or(defaults.model),
            timeout_secs: env::var("CARELOOP_LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_dir_ends_with_app_folder() {
        assert!(app_data_dir().ends_with("careloop"));
    }

    #[test]
    fn database_path_is_inside_data_dir() {
        assert!(database_path().starts_with(app_data_dir()));
        assert_eq!(
            database_path().file_name().and_then(|n| n.to_str()),
            Some("careloop.db")
        );
    }

    #[test]
    fn default_config_has_sane_timeout() {
        let config = LlmConfig::default();
        assert!(config.timeout_secs > 0);
        assert!(!config.base_url.is_empty());
    }
}
