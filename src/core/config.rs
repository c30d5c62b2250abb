//! Configuration management for hello-agent
//!
//! Supports config files, environment variables, and runtime overrides.
//! Defaults are constants; the environment is read only by [`Config::load`]
//! and the resulting value is passed explicitly to whatever needs it.
//!
//! Config file location: ~/.config/hello-agent/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::agent::AgentSettings;
use crate::core::error::{AgentError, Result};

/// Main configuration for hello-agent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Language-model endpoint configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Built-in tool configuration
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// OpenAI-compatible endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the API, e.g. https://api.openai.com/v1
    pub base_url: String,
    /// API key sent as a bearer token
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Sampling temperature
    pub temperature: f32,
}

/// Agent loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum model invocations per run
    /// Default: 30
    pub max_iterations: usize,
    /// Optional wall-clock limit for a whole run
    pub timeout_secs: Option<u64>,
    /// Run independent tool calls of one round concurrently
    pub parallel_tools: bool,
    /// System prompt seeded into every run
    pub system_prompt: Option<String>,
}

/// Built-in tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Root directory for the filesystem tools
    pub workspace: PathBuf,
    /// SerpApi key; `web_search` is only registered when set
    pub serpapi_api_key: Option<String>,
    /// SerpApi endpoint
    pub serpapi_url: String,
    /// Search country
    pub search_country: String,
    /// Search interface language
    pub search_language: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 60,
            temperature: 0.0,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            timeout_secs: None,
            parallel_tools: true,
            system_prompt: None,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            serpapi_api_key: None,
            serpapi_url: "https://serpapi.com/search".to_string(),
            search_country: "us".to_string(),
            search_language: "en".to_string(),
        }
    }
}

impl LlmConfig {
    /// Check that the client can be constructed from this configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(AgentError::config("model id is not set (LLM_MODEL_ID)"));
        }
        if self.api_key.trim().is_empty() {
            return Err(AgentError::config("API key is not set (LLM_API_KEY)"));
        }
        if self.base_url.trim().is_empty() {
            return Err(AgentError::config("base URL is not set (LLM_BASE_URL)"));
        }
        url::Url::parse(&self.base_url).map_err(|e| {
            AgentError::config(format!("invalid base URL '{}': {}", self.base_url, e))
        })?;
        Ok(())
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AgentConfig {
    /// Loop settings derived from this configuration
    pub fn settings(&self, temperature: f32) -> AgentSettings {
        AgentSettings {
            max_iterations: self.max_iterations,
            timeout: self.timeout_secs.map(Duration::from_secs),
            parallel_tools: self.parallel_tools,
            temperature: Some(temperature),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hello-agent")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from defaults, config file, `.env` and environment.
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut config = if Self::config_file().exists() {
            Self::load_from_file()?
        } else {
            Self::default()
        };

        config.apply_vars(|key| env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        let content = fs::read_to_string(&config_path)
            .map_err(|e| AgentError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| AgentError::config(format!("Failed to parse config: {}", e)))
    }

    /// Overlay variables from `lookup` onto this configuration.
    ///
    /// Each setting accepts its primary name first, then a legacy alias.
    pub fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |keys: &[&str]| first_var(&lookup, keys);

        if let Some(model) = var(&["LLM_MODEL_ID", "MODEL_NAME"]) {
            self.llm.model = model;
        }
        if let Some(key) = var(&["LLM_API_KEY", "OPENAI_API_KEY", "API_KEY"]) {
            self.llm.api_key = key;
        }
        if let Some(url) = var(&["LLM_BASE_URL", "BASE_URL"]) {
            self.llm.base_url = url;
        }
        if let Some(secs) = var(&["LLM_TIMEOUT"]).and_then(|v| v.parse().ok()) {
            self.llm.timeout_secs = secs;
        }
        if let Some(n) = var(&["AGENT_MAX_ITERATIONS"]).and_then(|v| v.parse().ok()) {
            self.agent.max_iterations = n;
        }
        if let Some(secs) = var(&["AGENT_TIMEOUT_SECS"]).and_then(|v| v.parse().ok()) {
            self.agent.timeout_secs = Some(secs);
        }
        if let Some(key) = var(&["SERPAPI_API_KEY"]) {
            self.tools.serpapi_api_key = Some(key);
        }
        if let Some(dir) = var(&["AGENT_WORKSPACE"]) {
            self.tools.workspace = PathBuf::from(dir);
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .map_err(|e| AgentError::config(format!("Failed to create config dir: {}", e)))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| AgentError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(Self::config_file(), content)
            .map_err(|e| AgentError::config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

/// First non-blank value among `keys`
fn first_var<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .find_map(|key| lookup(key).filter(|v| !v.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.agent.max_iterations, 30);
        assert!(config.agent.parallel_tools);
        assert!(config.agent.timeout_secs.is_none());
        assert!(config.tools.serpapi_api_key.is_none());
    }

    #[test]
    fn test_env_overlay_prefers_primary_names() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("LLM_MODEL_ID", "qwen-plus"),
            ("MODEL_NAME", "ignored"),
            ("OPENAI_API_KEY", "sk-test"),
            ("BASE_URL", "https://example.com/v1"),
            ("AGENT_MAX_ITERATIONS", "5"),
            ("AGENT_TIMEOUT_SECS", "90"),
            ("LLM_TIMEOUT", "not-a-number"),
        ]);

        let mut config = Config::default();
        config.apply_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.llm.model, "qwen-plus");
        assert_eq!(config.llm.api_key, "sk-test");
        assert_eq!(config.llm.base_url, "https://example.com/v1");
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.agent.max_iterations, 5);
        assert_eq!(config.agent.timeout_secs, Some(90));
    }

    #[test]
    fn test_validate_requires_api_key() {
        let config = LlmConfig::default();
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));

        let config = LlmConfig {
            api_key: "sk-test".to_string(),
            ..LlmConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = LlmConfig {
            api_key: "sk-test".to_string(),
            base_url: "not a url".to_string(),
            ..LlmConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml(
            r#"
            [agent]
            max_iterations = 4
            parallel_tools = false
            "#,
        )
        .unwrap();
        assert_eq!(config.agent.max_iterations, 4);
        assert!(!config.agent.parallel_tools);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = Config::default_config_toml();
        assert!(toml_str.contains("max_iterations"));
        assert!(toml_str.contains("base_url"));
    }

    #[test]
    fn test_settings_from_config() {
        let agent = AgentConfig {
            timeout_secs: Some(12),
            ..AgentConfig::default()
        };
        let settings = agent.settings(0.2);
        assert_eq!(settings.timeout, Some(Duration::from_secs(12)));
        assert_eq!(settings.temperature, Some(0.2));
    }
}
