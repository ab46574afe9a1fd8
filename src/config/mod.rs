//! Configuration management.
//!
//! Configuration is read from a TOML file and overridden by environment
//! variables prefixed with `DEEPSEARCH_` (nested keys separated by `__`).
//!
//! ```toml
//! [api_keys]
//! gemini = "your-api-key"
//!
//! [agent]
//! query_generator_model = "gemini-2.5-flash-preview-05-20"
//! reflection_model = "gemini-2.5-flash-preview-05-20"
//! answer_model = "gemini-2.5-pro-preview-05-06"
//! number_of_initial_queries = 3
//! max_research_loops = 2
//!
//! [gemini]
//! timeout_seconds = 120
//! max_retries = 2
//!
//! [cache]
//! enabled = true
//! ttl_seconds = 3600
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8000
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::agent::AgentConfiguration;
use crate::llm::GEMINI_API_BASE;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "DEEPSEARCH";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeys,

    /// Research agent settings
    #[serde(default)]
    pub agent: AgentConfiguration,

    /// Gemini API client settings
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Result cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Copy of the configuration with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.api_keys.gemini = config.api_keys.gemini.as_deref().map(mask_secret);
        config
    }
}

fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}

/// API keys for external services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeys {
    /// Gemini API key (falls back to GEMINI_API_KEY, then GOOGLE_API_KEY)
    #[serde(default = "gemini_key_from_env")]
    pub gemini: Option<String>,
}

impl Default for ApiKeys {
    fn default() -> Self {
        Self {
            gemini: gemini_key_from_env(),
        }
    }
}

fn gemini_key_from_env() -> Option<String> {
    ["GEMINI_API_KEY", "GOOGLE_API_KEY"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.trim().is_empty())
}

/// Gemini API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Base URL of the Generative Language API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries for transient failures (rate limits, 5xx, network)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    GEMINI_API_BASE.to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    2
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether deep search results are cached on disk
    #[serde(default)]
    pub enabled: bool,

    /// Cache directory (platform cache directory when unset)
    #[serde(default)]
    pub directory: Option<PathBuf>,

    /// Time to live for cached results
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: None,
            ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    3600 // 1 hour
}

/// Default cache directory
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("deepsearch-mcp"))
        .unwrap_or_else(|| PathBuf::from(".cache/deepsearch-mcp"))
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load configuration from a file, with environment overrides
pub fn load_config(path: &Path) -> Result<Config, config::ConfigError> {
    build_config(Some(path), env_source())
}

/// Configuration from defaults and environment overrides only
pub fn get_config() -> Result<Config, config::ConfigError> {
    build_config(None, env_source())
}

fn build_config(
    path: Option<&Path>,
    env: config::Environment,
) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    builder.add_source(env).build()?.try_deserialize()
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Find a configuration file in the default locations
///
/// Checks `./deepsearch.toml`, then `<config dir>/deepsearch-mcp/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("deepsearch.toml");
    if local.is_file() {
        return Some(local);
    }

    default_config_path().filter(|path| path.is_file())
}

/// Default location of the user configuration file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("deepsearch-mcp").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl_seconds, 3600);
        assert_eq!(config.gemini.max_retries, 2);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.agent.number_of_initial_queries, 3);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_load_config_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deepsearch.toml");

        std::fs::write(
            &path,
            r#"
[api_keys]
gemini = "file-key"

[agent]
answer_model = "gemini-custom"
max_research_loops = 4

[cache]
enabled = true
ttl_seconds = 60

[logging]
level = "debug"
format = "json"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.api_keys.gemini.as_deref(), Some("file-key"));
        assert_eq!(config.agent.answer_model, "gemini-custom");
        assert_eq!(config.agent.max_research_loops, 4);
        assert_eq!(
            config.agent.query_generator_model,
            "gemini-2.5-flash-preview-05-20"
        );
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_seconds, 60);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    fn env_with(vars: &[(&str, &str)]) -> config::Environment {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env_source().source(Some(map))
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        let env = env_with(&[
            ("DEEPSEARCH_CACHE__ENABLED", "true"),
            ("DEEPSEARCH_SERVER__PORT", "9123"),
            ("DEEPSEARCH_AGENT__ANSWER_MODEL", "m-x"),
        ]);

        let config = build_config(None, env).unwrap();
        assert!(config.cache.enabled);
        assert_eq!(config.server.port, 9123);
        assert_eq!(config.agent.answer_model, "m-x");
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_env_overrides_win_over_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deepsearch.toml");
        std::fs::write(&path, "[server]\nport = 9000\n\n[logging]\nlevel = \"warn\"\n").unwrap();

        let env = env_with(&[("DEEPSEARCH_SERVER__PORT", "9500")]);
        let config = build_config(Some(&path), env).unwrap();
        assert_eq!(config.server.port, 9500);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_load_config_nonexistent() {
        let result = load_config(Path::new("/nonexistent/deepsearch.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_settings() {
        let mut config = Config::default();
        config.api_keys.gemini = Some("secret-key".to_string());
        config.server.port = 9100;

        let rendered = config.to_toml().unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.server.port, 9100);
        assert_eq!(parsed.api_keys.gemini.as_deref(), Some("secret-key"));
    }

    #[test]
    fn test_redacted_masks_api_key() {
        let mut config = Config::default();
        config.api_keys.gemini = Some("AIzaSyExample".to_string());
        assert_eq!(config.redacted().api_keys.gemini.as_deref(), Some("AIza****"));
    }
}
