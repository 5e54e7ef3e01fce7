use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::MagpieError;

fn default_discord_bot_token() -> String {
    String::new()
}
fn default_api_key() -> String {
    String::new()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_temperature() -> f64 {
    1.0
}
fn default_summary_model() -> String {
    "gpt-4".into()
}
fn default_cost_rates() -> HashMap<String, f64> {
    HashMap::from([("gpt-4".into(), 0.04), ("gpt-3.5-turbo".into(), 0.002)])
}
fn default_context_capacity() -> usize {
    5
}
fn default_chunk_size() -> usize {
    2000
}
fn default_fetch_base_url() -> String {
    "https://async.scraperapi.com".into()
}
fn default_search_base_url() -> String {
    "https://api.search.brave.com".into()
}
fn default_poll_interval_secs() -> u64 {
    10
}
fn default_max_poll_attempts() -> u32 {
    90
}
fn default_poll_timeout_secs() -> u64 {
    900
}
fn default_http_timeout_secs() -> u64 {
    120
}
fn default_persona() -> String {
    "You are a helpful assistant with concise and accurate responses. \
     The current time is {time}, and the person messaging you is {sender}."
        .into()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_discord_bot_token")]
    pub discord_bot_token: String,
    /// Channel allowlist by channel ID (empty = respond in all channels).
    #[serde(default)]
    pub discord_allowed_channels: Vec<u64>,
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_llm_base_url")]
    pub llm_base_url: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_temperature")]
    pub default_temperature: f64,
    /// Model used for page-summary completions (stateless, outside any chat context).
    #[serde(default = "default_summary_model")]
    pub summary_model: String,
    /// USD per 1K tokens, keyed by model name. Completions against a model
    /// missing from this table fail instead of being billed at a guessed rate.
    #[serde(default = "default_cost_rates")]
    pub cost_rates: HashMap<String, f64>,
    #[serde(default = "default_context_capacity")]
    pub context_capacity: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_api_key")]
    pub scraper_api_key: String,
    #[serde(default = "default_fetch_base_url")]
    pub fetch_base_url: String,
    #[serde(default = "default_api_key")]
    pub search_api_key: String,
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// System-prompt template seeded into each new conversation.
    /// `{time}` and `{sender}` are interpolated at seeding time.
    #[serde(default = "default_persona")]
    pub persona: String,
}

impl Config {
    pub fn resolve_config_path() -> Result<Option<PathBuf>, MagpieError> {
        // 1. Check MAGPIE_CONFIG env var for custom path
        if let Ok(custom) = std::env::var("MAGPIE_CONFIG") {
            if std::path::Path::new(&custom).exists() {
                return Ok(Some(PathBuf::from(custom)));
            }
            return Err(MagpieError::Config(format!(
                "MAGPIE_CONFIG points to non-existent file: {custom}"
            )));
        }

        if std::path::Path::new("./magpie.config.yaml").exists() {
            return Ok(Some(PathBuf::from("./magpie.config.yaml")));
        }
        if std::path::Path::new("./magpie.config.yml").exists() {
            return Ok(Some(PathBuf::from("./magpie.config.yml")));
        }
        Ok(None)
    }

    /// Load config from YAML file.
    pub fn load() -> Result<Self, MagpieError> {
        let yaml_path = Self::resolve_config_path()?;

        if let Some(path) = yaml_path {
            let path_str = path.to_string_lossy().to_string();
            let content = std::fs::read_to_string(&path)
                .map_err(|e| MagpieError::Config(format!("Failed to read {path_str}: {e}")))?;
            let mut config: Config = serde_yaml::from_str(&content)
                .map_err(|e| MagpieError::Config(format!("Failed to parse {path_str}: {e}")))?;
            config.post_deserialize()?;
            return Ok(config);
        }

        Err(MagpieError::Config(
            "No magpie.config.yaml found. Copy magpie.config.example.yaml and fill in your keys."
                .into(),
        ))
    }

    /// Apply post-deserialization normalization and validation.
    pub(crate) fn post_deserialize(&mut self) -> Result<(), MagpieError> {
        // Trim trailing slashes so endpoint formatting can always join with '/'
        self.llm_base_url = self.llm_base_url.trim().trim_end_matches('/').to_string();
        self.fetch_base_url = self.fetch_base_url.trim().trim_end_matches('/').to_string();
        self.search_base_url = self.search_base_url.trim().trim_end_matches('/').to_string();

        if self.llm_base_url.is_empty() {
            self.llm_base_url = default_llm_base_url();
        }
        if self.fetch_base_url.is_empty() {
            self.fetch_base_url = default_fetch_base_url();
        }
        if self.search_base_url.is_empty() {
            self.search_base_url = default_search_base_url();
        }
        if self.default_model.trim().is_empty() {
            self.default_model = default_model();
        }
        if self.summary_model.trim().is_empty() {
            self.summary_model = default_summary_model();
        }
        if self.persona.trim().is_empty() {
            self.persona = default_persona();
        }
        if self.context_capacity == 0 {
            self.context_capacity = default_context_capacity();
        }
        if self.chunk_size == 0 {
            self.chunk_size = default_chunk_size();
        }
        if self.poll_interval_secs == 0 {
            self.poll_interval_secs = default_poll_interval_secs();
        }
        if self.max_poll_attempts == 0 {
            self.max_poll_attempts = default_max_poll_attempts();
        }
        if self.poll_timeout_secs == 0 {
            self.poll_timeout_secs = default_poll_timeout_secs();
        }
        if self.http_timeout_secs == 0 {
            self.http_timeout_secs = default_http_timeout_secs();
        }

        // Validate required fields
        if self.discord_bot_token.is_empty() {
            return Err(MagpieError::Config("discord_bot_token is required".into()));
        }
        if self.api_key.is_empty() {
            return Err(MagpieError::Config("api_key is required".into()));
        }
        if self.scraper_api_key.is_empty() {
            return Err(MagpieError::Config("scraper_api_key is required".into()));
        }
        if self.search_api_key.is_empty() {
            return Err(MagpieError::Config("search_api_key is required".into()));
        }

        // Both default models must have a billing rate; per-message overrides are
        // checked at request time instead.
        for model in [&self.default_model, &self.summary_model] {
            if !self.cost_rates.contains_key(model) {
                return Err(MagpieError::Config(format!(
                    "cost_rates has no entry for '{model}'"
                )));
            }
        }

        Ok(())
    }
}
