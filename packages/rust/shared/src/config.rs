//! Application configuration for Researcher.
//!
//! User config lives at `~/.researcher/researcher.toml`.
//! CLI flags override the `OLLAMA_HOST` env var, which overrides config file
//! values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ResearcherError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "researcher.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".researcher";

/// Env var consulted for the Ollama host, same name the Ollama CLI uses.
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

// ---------------------------------------------------------------------------
// Config structs (matching researcher.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Inference backend settings.
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Web search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Time-aware prompting settings.
    #[serde(default)]
    pub temporal: TemporalConfig,
}

/// `[inference]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Base URL of the Ollama server.
    #[serde(default = "default_host")]
    pub host: String,

    /// Model name passed with every chat request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout. Local models can be slow on first load.
    #[serde(default = "default_inference_timeout")]
    pub timeout_secs: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            model: default_model(),
            timeout_secs: default_inference_timeout(),
        }
    }
}

fn default_host() -> String {
    "http://127.0.0.1:11434".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_inference_timeout() -> u64 {
    120
}

/// What to do when the search backend fails during a web-augmented request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchFailurePolicy {
    /// Log the failure and answer without web context.
    #[default]
    Degrade,
    /// Fail the request with the search error.
    Propagate,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// DuckDuckGo HTML endpoint.
    #[serde(default = "default_search_url")]
    pub base_url: String,

    /// Number of results requested per query.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Request timeout.
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    /// Behaviour when the search backend errors.
    #[serde(default)]
    pub on_failure: SearchFailurePolicy,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_url(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
            on_failure: SearchFailurePolicy::default(),
        }
    }
}

fn default_search_url() -> String {
    "https://html.duckduckgo.com/html/".into()
}
fn default_max_results() -> usize {
    5
}
fn default_search_timeout() -> u64 {
    10
}

/// `[temporal]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemporalConfig {
    /// Prefix web answers with "As of <year>, " when they omit the current year.
    #[serde(default)]
    pub annotate_answers: bool,
}

impl AppConfig {
    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup(OLLAMA_HOST_ENV).filter(|h| !h.trim().is_empty()) {
            tracing::debug!(%host, "using Ollama host from environment");
            self.inference.host = normalize_host(&host);
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|name| std::env::var(name).ok());
    }
}

/// Turn `host:port` into `http://host:port` and drop a trailing slash.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.researcher/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ResearcherError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.researcher/researcher.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk and apply env overrides.
/// Falls back to defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    let mut config = if path.exists() {
        load_config_from(&path)?
    } else {
        tracing::debug!(?path, "config file not found, using defaults");
        AppConfig::default()
    };

    config.apply_env_overrides();
    Ok(config)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ResearcherError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ResearcherError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ResearcherError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ResearcherError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ResearcherError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that endpoints parse as URLs and numeric settings are usable.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    Url::parse(&config.inference.host).map_err(|e| {
        ResearcherError::config(format!(
            "invalid inference host '{}': {e}",
            config.inference.host
        ))
    })?;
    Url::parse(&config.search.base_url).map_err(|e| {
        ResearcherError::config(format!(
            "invalid search base_url '{}': {e}",
            config.search.base_url
        ))
    })?;

    if config.inference.model.trim().is_empty() {
        return Err(ResearcherError::config("inference.model must not be empty"));
    }
    if config.search.max_results == 0 {
        return Err(ResearcherError::config("search.max_results must be at least 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("llama3.2"));
        assert!(toml_str.contains("html.duckduckgo.com"));
        assert!(toml_str.contains(r#"on_failure = "degrade""#));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let toml_str = r#"
[inference]
model = "mistral"

[search]
on_failure = "propagate"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.inference.model, "mistral");
        assert_eq!(config.inference.host, "http://127.0.0.1:11434");
        assert_eq!(config.search.max_results, 5);
        assert_eq!(config.search.on_failure, SearchFailurePolicy::Propagate);
        assert!(!config.temporal.annotate_answers);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let toml_str = "[search]\non_failure = \"retry\"\n";
        let parsed: std::result::Result<AppConfig, _> = toml::from_str(toml_str);
        assert!(parsed.is_err());
    }

    #[test]
    fn env_override_normalizes_host() {
        let mut config = AppConfig::default();
        config.apply_env_overrides_from(|name| {
            (name == OLLAMA_HOST_ENV).then(|| "gpu-box:11434".to_string())
        });
        assert_eq!(config.inference.host, "http://gpu-box:11434");
    }

    #[test]
    fn blank_env_override_is_ignored() {
        let mut config = AppConfig::default();
        config.apply_env_overrides_from(|_| Some("  ".into()));
        assert_eq!(config.inference.host, "http://127.0.0.1:11434");
    }

    #[test]
    fn normalize_host_variants() {
        assert_eq!(normalize_host("localhost:11434"), "http://localhost:11434");
        assert_eq!(normalize_host("https://llm.lan/"), "https://llm.lan");
        assert_eq!(normalize_host("http://127.0.0.1:11434"), "http://127.0.0.1:11434");
    }

    #[test]
    fn validation_catches_bad_values() {
        assert!(validate_config(&AppConfig::default()).is_ok());

        let mut config = AppConfig::default();
        config.search.max_results = 0;
        assert!(validate_config(&config).unwrap_err().to_string().contains("max_results"));

        let mut config = AppConfig::default();
        config.inference.host = "not a url".into();
        assert!(validate_config(&config).unwrap_err().to_string().contains("inference host"));
    }
}
