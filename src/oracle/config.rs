//! Configuration for the model server connection

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Where token ids come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    /// Ask the model server (`/tokenize`, `/detokenize`)
    #[default]
    Remote,
    Cl100kBase,
    P50kBase,
    R50kBase,
}

impl FromStr for TokenizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote" | "server" => Ok(Self::Remote),
            "cl100k_base" | "cl100k" => Ok(Self::Cl100kBase),
            "p50k_base" | "p50k" => Ok(Self::P50kBase),
            "r50k_base" | "r50k" | "gpt2" => Ok(Self::R50kBase),
            other => Err(format!("unknown tokenizer '{}'", other)),
        }
    }
}

/// Model server client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Model server URL
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// API key (read from env ORACLE_API_KEY if not set)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Path or identifier of the fine-tuned weights
    #[serde(default = "default_model")]
    pub model: String,

    /// Model to use when the server does not serve `model`
    #[serde(default = "default_fallback_model")]
    pub fallback_model: Option<String>,

    /// Hard input limit of one generation call
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    #[serde(default)]
    pub tokenizer: TokenizerKind,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum generation requests in flight
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_generations: usize,

    /// Retries for transient transport failures
    #[serde(default)]
    pub retry_attempts: usize,

    /// Base backoff in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Circuit breaker failure threshold
    #[serde(default = "default_breaker_failures")]
    pub circuit_breaker_failures: usize,

    /// Circuit breaker reset timeout in seconds
    #[serde(default = "default_breaker_reset")]
    pub circuit_breaker_reset_secs: u64,
}

fn default_service_url() -> String { "http://localhost:8500".to_string() }
fn default_model() -> String { "./my-fine-tuned-model".to_string() }
fn default_fallback_model() -> Option<String> { Some("t5-small".to_string()) }
fn default_max_input_tokens() -> usize { 512 }
fn default_timeout_ms() -> u64 { 120_000 }
fn default_max_concurrent() -> usize { 1 }
fn default_retry_backoff_ms() -> u64 { 200 }
fn default_breaker_failures() -> usize { 5 }
fn default_breaker_reset() -> u64 { 30 }

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            api_key: None,
            model: default_model(),
            fallback_model: default_fallback_model(),
            max_input_tokens: default_max_input_tokens(),
            tokenizer: TokenizerKind::default(),
            timeout_ms: default_timeout_ms(),
            max_concurrent_generations: default_max_concurrent(),
            retry_attempts: 0,
            retry_backoff_ms: default_retry_backoff_ms(),
            circuit_breaker_failures: default_breaker_failures(),
            circuit_breaker_reset_secs: default_breaker_reset(),
        }
    }
}

impl OracleConfig {
    /// Override fields from well-known environment variables
    pub fn from_env(mut self) -> Self {
        if let Ok(val) = std::env::var("ORACLE_SERVICE_URL") {
            self.service_url = val;
        }

        if let Ok(val) = std::env::var("ORACLE_API_KEY") {
            self.api_key = Some(val);
        }

        if let Ok(val) = std::env::var("SUMMARIZER_MODEL") {
            self.model = val;
        }

        if let Ok(val) = std::env::var("SUMMARIZER_FALLBACK_MODEL") {
            self.fallback_model = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var("ORACLE_MAX_INPUT_TOKENS") {
            if let Ok(max) = val.parse() {
                self.max_input_tokens = max;
            }
        }

        if let Ok(val) = std::env::var("ORACLE_TOKENIZER") {
            if let Ok(kind) = val.parse() {
                self.tokenizer = kind;
            }
        }

        if let Ok(val) = std::env::var("ORACLE_TIMEOUT_MS") {
            if let Ok(timeout) = val.parse() {
                self.timeout_ms = timeout;
            }
        }

        if let Ok(val) = std::env::var("ORACLE_MAX_CONCURRENT") {
            if let Ok(max) = val.parse() {
                self.max_concurrent_generations = max;
            }
        }

        if let Ok(val) = std::env::var("ORACLE_MAX_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.retry_attempts = retries;
            }
        }

        self
    }

    /// Check that the values can drive a client
    pub fn validate(&self) -> Result<(), String> {
        if self.service_url.trim().is_empty() {
            return Err("oracle.service_url must not be empty".to_string());
        }
        if self.model.trim().is_empty() {
            return Err("oracle.model must not be empty".to_string());
        }
        if self.max_input_tokens == 0 {
            return Err("oracle.max_input_tokens must be positive".to_string());
        }
        if self.max_concurrent_generations == 0 {
            return Err("oracle.max_concurrent_generations must be positive".to_string());
        }
        Ok(())
    }

    /// Service URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.service_url.trim_end_matches('/')
    }

    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get circuit breaker reset timeout as Duration
    pub fn breaker_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_reset_secs)
    }

    /// Get retry backoff as Duration
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
