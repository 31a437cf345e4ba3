use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::llm::GenerationParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Search backend configuration
    pub search: SearchConfig,
    /// Generation backend configuration
    pub llm: LlmConfig,
    /// Question-answering behaviour
    pub agent: AgentConfig,
    /// Optional JSON file replacing the built-in expansion table
    pub expansions_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// "elasticsearch" or "local"
    pub backend: String,
    /// Elasticsearch node URL
    pub host: Option<String>,
    /// Elasticsearch API key (sent as `Authorization: ApiKey ...`)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    pub rules_index: String,
    pub definitions_index: String,
    /// Root directory of the local tantivy indexes
    pub data_dir: PathBuf,
    /// Rules JSON indexed into an empty local index at startup
    pub seed_rules: Option<PathBuf>,
    /// Definitions JSON indexed into an empty local index at startup
    pub seed_definitions: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: "elasticsearch".to_string(),
            host: None,
            api_key: None,
            timeout_secs: 10,
            rules_index: "waterpolo-rules".to_string(),
            definitions_index: "waterpolo-definitions".to_string(),
            data_dir: PathBuf::from("./data"),
            seed_rules: None,
            seed_definitions: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "gemini", "vertex", "openai" or "ollama"
    pub provider: String,
    /// Override of the provider's default endpoint
    pub base_url: Option<String>,
    pub model: String,
    /// API key, or bearer token for Vertex AI
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Google Cloud project (Vertex AI only)
    pub project_id: Option<String>,
    /// Google Cloud region (Vertex AI only)
    pub location: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Per-call timeout in seconds
    pub timeout_secs: u64,
    /// Extra attempts on transient failures (0 = none)
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            base_url: None,
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            project_id: None,
            location: "us-central1".to_string(),
            temperature: 0.2,
            max_output_tokens: 2048,
            timeout_secs: 60,
            max_retries: 0,
        }
    }
}

impl LlmConfig {
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hits retrieved for `ask` when the caller gives no `maxContext`
    pub default_max_context: usize,
    /// Hits returned by keyword search when the caller gives no `maxResults`
    pub default_max_results: usize,
    /// Character budget of the context block (None = unbounded)
    pub context_char_budget: Option<usize>,
    /// Articles narrated by the fallback answer
    pub fallback_articles: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_max_context: 10,
            default_max_results: 5,
            context_char_budget: Some(24_000),
            fallback_articles: 3,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3001".to_string(),
            search: SearchConfig::default(),
            llm: LlmConfig::default(),
            agent: AgentConfig::default(),
            expansions_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = var("RULES_AGENT_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(path) = var("EXPANSIONS_FILE") {
            config.expansions_file = Some(PathBuf::from(path));
        }

        // Search backend
        if let Some(backend) = var("SEARCH_BACKEND") {
            config.search.backend = backend.to_lowercase();
        }
        config.search.host = var("ELASTICSEARCH_HOST");
        config.search.api_key = var("ELASTICSEARCH_API_KEY");
        if let Some(v) = var("SEARCH_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.search.timeout_secs = v;
        }
        if let Some(index) = var("RULES_INDEX") {
            config.search.rules_index = index;
        }
        if let Some(index) = var("DEFINITIONS_INDEX") {
            config.search.definitions_index = index;
        }
        if let Some(dir) = var("RULES_AGENT_DATA_DIR") {
            config.search.data_dir = PathBuf::from(dir);
        }
        config.search.seed_rules = var("RULES_SEED_FILE").map(PathBuf::from);
        config.search.seed_definitions = var("DEFINITIONS_SEED_FILE").map(PathBuf::from);

        // Generation backend
        if let Some(provider) = var("LLM_PROVIDER") {
            config.llm.provider = provider.to_lowercase();
        }
        config.llm.base_url = var("LLM_BASE_URL");
        if let Some(model) = var("LLM_MODEL") {
            config.llm.model = model;
        }
        config.llm.api_key = var("LLM_API_KEY");
        config.llm.project_id = var("GOOGLE_CLOUD_PROJECT_ID");
        if let Some(location) = var("GOOGLE_CLOUD_LOCATION") {
            config.llm.location = location;
        }
        if let Some(v) = var("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            config.llm.temperature = v;
        }
        if let Some(v) = var("LLM_MAX_OUTPUT_TOKENS").and_then(|v| v.parse().ok()) {
            config.llm.max_output_tokens = v;
        }
        if let Some(v) = var("LLM_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.llm.timeout_secs = v;
        }
        if let Some(v) = var("LLM_MAX_RETRIES").and_then(|v| v.parse::<u32>().ok()) {
            config.llm.max_retries = v.min(5); // Cap at 5
        }

        // Agent
        if let Some(v) = var("AGENT_MAX_CONTEXT").and_then(|v| v.parse().ok()) {
            config.agent.default_max_context = v;
        }
        if let Some(v) = var("SEARCH_MAX_RESULTS").and_then(|v| v.parse().ok()) {
            config.agent.default_max_results = v;
        }
        if let Some(v) = var("CONTEXT_CHAR_BUDGET").and_then(|v| v.parse::<usize>().ok()) {
            config.agent.context_char_budget = (v > 0).then_some(v);
        }
        if let Some(v) = var("FALLBACK_ARTICLES").and_then(|v| v.parse().ok()) {
            config.agent.fallback_articles = v;
        }

        config
    }

    /// Report every missing required setting at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut missing = Vec::new();

        match self.search.backend.as_str() {
            "elasticsearch" => {
                if self.search.host.is_none() {
                    missing.push("ELASTICSEARCH_HOST".to_string());
                }
                if self.search.api_key.is_none() {
                    missing.push("ELASTICSEARCH_API_KEY".to_string());
                }
            }
            "local" => {}
            _ => missing.push("SEARCH_BACKEND (elasticsearch|local)".to_string()),
        }

        match self.llm.provider.as_str() {
            "vertex" => {
                if self.llm.project_id.is_none() {
                    missing.push("GOOGLE_CLOUD_PROJECT_ID".to_string());
                }
            }
            "gemini" | "openai" | "ollama" => {}
            _ => missing.push("LLM_PROVIDER (gemini|vertex|openai|ollama)".to_string()),
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Missing(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.bind_addr, "127.0.0.1:3001");
        assert_eq!(config.search.rules_index, "waterpolo-rules");
        assert_eq!(config.agent.default_max_context, 10);
        assert_eq!(config.agent.default_max_results, 5);
        assert_eq!(config.agent.fallback_articles, 3);
        assert_eq!(config.llm.params(), GenerationParams::default());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("SEARCH_BACKEND", "Local"),
            ("LLM_PROVIDER", "ollama"),
            ("LLM_MODEL", "llama3.2"),
            ("LLM_MAX_RETRIES", "42"),
            ("CONTEXT_CHAR_BUDGET", "0"),
            ("AGENT_MAX_CONTEXT", "4"),
        ]);
        assert_eq!(config.search.backend, "local");
        assert_eq!(config.llm.provider, "ollama");
        assert_eq!(config.llm.model, "llama3.2");
        assert_eq!(config.llm.max_retries, 5);
        assert_eq!(config.agent.context_char_budget, None);
        assert_eq!(config.agent.default_max_context, 4);
    }

    #[test]
    fn test_unparseable_numbers_keep_defaults() {
        let config = from_pairs(&[("AGENT_MAX_CONTEXT", "lots")]);
        assert_eq!(config.agent.default_max_context, 10);
    }

    #[test]
    fn test_validate_reports_all_missing() {
        let config = from_pairs(&[("LLM_PROVIDER", "vertex")]);
        match config.validate() {
            Err(ConfigError::Missing(missing)) => {
                assert_eq!(
                    missing,
                    vec![
                        "ELASTICSEARCH_HOST",
                        "ELASTICSEARCH_API_KEY",
                        "GOOGLE_CLOUD_PROJECT_ID"
                    ]
                );
            }
            other => panic!("expected missing config, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_local_backend() {
        let config = from_pairs(&[("SEARCH_BACKEND", "local")]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = from_pairs(&[("ELASTICSEARCH_HOST", "  ")]);
        assert!(config.search.host.is_none());
    }
}
