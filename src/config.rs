//! Application configuration
//!
//! Loaded from a TOML file and then overridden by environment variables with
//! the `NEWS_DIGEST__` prefix, e.g. `NEWS_DIGEST__SUMMARIZER__DEADLINE_MS=30000`.

use crate::categorizer::CategorizerConfig;
use crate::error::{DigestError, Result};
use crate::oracle::OracleConfig;
use crate::summarizer::SummarizerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "NEWS_DIGEST_CONFIG";

const ENV_PREFIX: &str = "NEWS_DIGEST";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub summarizer: SummarizerConfig,

    #[serde(default)]
    pub categorizer: CategorizerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Digest result cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_cache_entries")]
    pub max_entries: u64,
}

fn default_cache_enabled() -> bool { true }
fn default_cache_ttl() -> u64 { 600 }
fn default_cache_entries() -> u64 { 1000 }

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_entries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(env_source())
            .build()
            .map_err(|e| DigestError::Configuration(e.to_string()))?;

        Self::finish(settings)
    }

    /// Parse from TOML text, then apply environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .add_source(env_source())
            .build()
            .map_err(|e| DigestError::Configuration(e.to_string()))?;

        Self::finish(settings)
    }

    /// Load `.env`, then the file named by `NEWS_DIGEST_CONFIG` if set,
    /// falling back to defaults; well-known oracle variables such as
    /// `ORACLE_SERVICE_URL` are applied last
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::from_toml_str("")?,
        };
        config.oracle = config.oracle.from_env();
        config.validate()?;
        Ok(config)
    }

    fn finish(settings: config::Config) -> Result<Self> {
        let config: Config = settings
            .try_deserialize()
            .map_err(|e| DigestError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.oracle
            .validate()
            .map_err(DigestError::Configuration)?;
        self.summarizer
            .validate()
            .map_err(|e| DigestError::Configuration(format!("summarizer: {}", e)))?;
        self.categorizer
            .validate()
            .map_err(DigestError::Configuration)?;

        if self.summarizer.max_tokens_per_chunk >= self.oracle.max_input_tokens {
            return Err(DigestError::Configuration(format!(
                "summarizer.max_tokens_per_chunk ({}) must leave room for the prefix under oracle.max_input_tokens ({})",
                self.summarizer.max_tokens_per_chunk, self.oracle.max_input_tokens
            )));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(DigestError::Configuration(
                "cache.max_entries must be positive when the cache is enabled".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::TokenizerKind;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.summarizer.max_tokens_per_chunk, 450);
        assert_eq!(config.cache.ttl_secs, 600);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_toml_str() {
        let toml = r#"
            [oracle]
            service_url = "http://models:8500"
            model = "news-t5-base"
            max_input_tokens = 1024
            tokenizer = "cl100k_base"

            [summarizer]
            max_tokens_per_chunk = 900
            overlap_tokens = 100
            max_parallel_chunks = 4
            deadline_ms = 45000

            [categorizer]
            labels = ["Business", "Sports"]

            [cache]
            enabled = false

            [logging]
            level = "debug"
            json = true
        "#;

        let config = Config::from_toml_str(toml).unwrap();
        assert_eq!(config.oracle.model, "news-t5-base");
        assert_eq!(config.oracle.max_input_tokens, 1024);
        assert_eq!(config.oracle.tokenizer, TokenizerKind::Cl100kBase);
        assert_eq!(config.summarizer.stride(), 800);
        assert_eq!(config.summarizer.max_parallel_chunks, 4);
        assert_eq!(config.summarizer.deadline_ms, Some(45000));
        assert_eq!(config.summarizer.prefix, "summarize: ");
        assert_eq!(config.categorizer.labels, vec!["Business", "Sports"]);
        assert!(!config.cache.enabled);
        assert!(config.logging.json);
    }

    #[test]
    fn test_window_must_fit_oracle_limit() {
        let toml = r#"
            [oracle]
            max_input_tokens = 400
        "#;
        assert!(matches!(
            Config::from_toml_str(toml),
            Err(DigestError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_summarizer_section_rejected() {
        let toml = r#"
            [summarizer]
            overlap_tokens = 500
        "#;
        assert!(Config::from_toml_str(toml).is_err());
    }
}
