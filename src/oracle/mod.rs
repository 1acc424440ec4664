//! Sequence model oracle
//!
//! The summarizer treats the sequence-to-sequence model as a black box that
//! can tokenize, decode, and generate a bounded summary from a bounded input.
//! `RemoteOracle` is the production implementation; it talks to a model
//! server over HTTP and can optionally tokenize locally with a BPE vocabulary.

pub mod bpe;
pub mod circuit_breaker;
pub mod config;
pub mod remote;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use bpe::BpeTokenizer;
pub use circuit_breaker::{BreakerState, BreakerStats, CircuitBreaker, CircuitBreakerConfig};
pub use config::{OracleConfig, TokenizerKind};
pub use remote::RemoteOracle;

/// Identifier of a single token in the oracle's vocabulary
pub type TokenId = u32;

/// Length bounds for one generation call, in generated tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationBounds {
    pub min_new_tokens: usize,
    pub max_new_tokens: usize,
}

impl GenerationBounds {
    pub const fn new(min_new_tokens: usize, max_new_tokens: usize) -> Self {
        Self {
            min_new_tokens,
            max_new_tokens,
        }
    }
}

/// Capability consumed by the summarizer
///
/// Implementations must be safe to share across concurrent summarization
/// calls. Generation is always deterministic (greedy decoding).
#[async_trait]
pub trait SequenceOracle: Send + Sync {
    /// Tokenize text. The same text always yields the same sequence.
    async fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, OracleError>;

    /// Decode tokens back to text, skipping special tokens
    async fn decode(&self, tokens: &[TokenId]) -> Result<String, OracleError>;

    /// Generate a summary of `tokens` within `bounds`
    ///
    /// Fails with [`OracleError::InputTooLong`] when `tokens` is longer than
    /// [`SequenceOracle::max_input_tokens`].
    async fn generate_summary(
        &self,
        tokens: &[TokenId],
        bounds: GenerationBounds,
    ) -> Result<String, OracleError>;

    /// Hard limit on the input sequence length of one generation call
    fn max_input_tokens(&self) -> usize;
}

/// Oracle error types
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Circuit breaker is open: {0}")]
    CircuitOpen(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Upstream error: status {status}: {body}")]
    UpstreamError { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Input of {len} tokens exceeds oracle limit of {limit} tokens")]
    InputTooLong { len: usize, limit: usize },

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
}

impl OracleError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            OracleError::RequestFailed(_) | OracleError::Timeout(_) => true,
            OracleError::UpstreamError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
