//! Harness configuration.
//!
//! One explicit [`HarnessConfig`] is built at startup (TOML file, then env
//! overrides) and passed by reference to every stage. Nothing reads config
//! state globally.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Chat API connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bearer token for the chat endpoint.
    pub api_key: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.deepseek.com/v1".into(),
            model: "DeepSeek-R1".into(),
            timeout_seconds: 600,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Stage artifact paths. Defaults mirror the pipeline's historical file names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Newline-delimited topics (input to generation).
    pub topics: PathBuf,
    /// Generated candidate prompts (JSON).
    pub prompts: PathBuf,
    /// Filtered one-per-topic prompts (JSON).
    pub filtered_prompts: PathBuf,
    /// Metadata catalog CSV.
    pub metadata: PathBuf,
    /// Prompt/response transcript (plain text).
    pub transcript: PathBuf,
    /// Rubric evaluation results (JSON).
    pub evaluation: PathBuf,
    /// Optional per-prompt score table (CSV).
    pub scores: Option<PathBuf>,
    /// Human/LLM ratings sheet for agreement computation (CSV).
    pub ratings: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            topics: "topics.txt".into(),
            prompts: "prompts_noisy.json".into(),
            filtered_prompts: "prompts_noisy_filtered.json".into(),
            metadata: "current_metadata_official_urls_new.csv".into(),
            transcript: "prompt_output_noisy.txt".into(),
            evaluation: "output_evaluation_noisy_with_json_metadata.json".into(),
            scores: Some("output_evaluation_scores_noisy_with_json_metadata.csv".into()),
            ratings: "review.csv".into(),
        }
    }
}

/// Full harness configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub api: ApiConfig,
    pub paths: PathsConfig,
}

impl HarnessConfig {
    /// Load from a TOML file, then apply `RUBRIC_*` env overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: HarnessConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.apply_env();
        Ok(config)
    }

    /// Build from env vars alone (no config file present).
    ///
    /// The API key is not required here; stages that never touch the
    /// network (tally, agreement) run without one. The gateway checks for
    /// it at construction.
    pub fn from_env() -> Self {
        let mut config = HarnessConfig::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("RUBRIC_API_KEY") {
            self.api.api_key = key;
        }
        if let Ok(url) = std::env::var("RUBRIC_BASE_URL") {
            self.api.base_url = url;
        }
        if let Ok(model) = std::env::var("RUBRIC_MODEL") {
            self.api.model = model;
        }
        if let Ok(secs) = std::env::var("RUBRIC_TIMEOUT_SECONDS") {
            if let Ok(parsed) = secs.parse() {
                self.api.timeout_seconds = parsed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: HarnessConfig = toml::from_str(
            r#"
            [api]
            api_key = "sk-test"
            base_url = "http://localhost:9000/v1"

            [paths]
            topics = "my_topics.txt"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.api_key, "sk-test");
        assert_eq!(config.api.base_url, "http://localhost:9000/v1");
        assert_eq!(config.api.model, "DeepSeek-R1");
        assert_eq!(config.paths.topics, PathBuf::from("my_topics.txt"));
        assert_eq!(config.paths.prompts, PathBuf::from("prompts_noisy.json"));
    }

    #[test]
    fn default_api_key_is_empty() {
        let config = HarnessConfig::default();
        assert!(config.api.api_key.is_empty());
    }

    #[test]
    fn env_overrides_beat_file_values() {
        std::env::set_var("RUBRIC_MODEL", "DeepSeek-V3");
        std::env::set_var("RUBRIC_TIMEOUT_SECONDS", "30");

        let mut config: HarnessConfig = toml::from_str(
            r#"
            [api]
            model = "DeepSeek-R1"
            timeout_seconds = 600
            "#,
        )
        .unwrap();
        config.apply_env();

        std::env::remove_var("RUBRIC_MODEL");
        std::env::remove_var("RUBRIC_TIMEOUT_SECONDS");

        assert_eq!(config.api.model, "DeepSeek-V3");
        assert_eq!(config.api.timeout_seconds, 30);
    }

    #[test]
    fn timeout_conversion() {
        let mut api = ApiConfig::default();
        api.timeout_seconds = 42;
        assert_eq!(api.timeout(), Duration::from_secs(42));
    }
}
