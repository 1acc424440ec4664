//! Chunking and generation parameters

use crate::oracle::GenerationBounds;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters of the recursive chunked summarizer
///
/// Defaults target a t5-small class model with a 512-token input limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Largest token sequence sent to the oracle in one call
    #[serde(default = "default_max_tokens_per_chunk")]
    pub max_tokens_per_chunk: usize,

    /// Tokens repeated between adjacent windows
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,

    /// Task prefix prepended to every unit of text
    #[serde(default = "default_prefix")]
    pub prefix: String,

    #[serde(default = "default_final_min_tokens")]
    pub final_min_tokens: usize,

    #[serde(default = "default_final_max_tokens")]
    pub final_max_tokens: usize,

    #[serde(default = "default_chunk_min_tokens")]
    pub chunk_min_tokens: usize,

    #[serde(default = "default_chunk_max_tokens")]
    pub chunk_max_tokens: usize,

    /// Map-reduce passes allowed before giving up
    #[serde(default = "default_max_reduce_passes")]
    pub max_reduce_passes: usize,

    /// Chunk summaries generated concurrently within one pass
    #[serde(default = "default_max_parallel_chunks")]
    pub max_parallel_chunks: usize,

    /// Deadline for one whole `summarize` call, in milliseconds
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

fn default_max_tokens_per_chunk() -> usize { 450 }
fn default_overlap_tokens() -> usize { 50 }
fn default_prefix() -> String { "summarize: ".to_string() }
fn default_final_min_tokens() -> usize { 40 }
fn default_final_max_tokens() -> usize { 150 }
fn default_chunk_min_tokens() -> usize { 20 }
fn default_chunk_max_tokens() -> usize { 75 }
fn default_max_reduce_passes() -> usize { 8 }
fn default_max_parallel_chunks() -> usize { 1 }

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_chunk: default_max_tokens_per_chunk(),
            overlap_tokens: default_overlap_tokens(),
            prefix: default_prefix(),
            final_min_tokens: default_final_min_tokens(),
            final_max_tokens: default_final_max_tokens(),
            chunk_min_tokens: default_chunk_min_tokens(),
            chunk_max_tokens: default_chunk_max_tokens(),
            max_reduce_passes: default_max_reduce_passes(),
            max_parallel_chunks: default_max_parallel_chunks(),
            deadline_ms: None,
        }
    }
}

impl SummarizerConfig {
    /// Advance between the starts of consecutive windows
    pub fn stride(&self) -> usize {
        self.max_tokens_per_chunk.saturating_sub(self.overlap_tokens)
    }

    /// Bounds for the single terminal generation call
    pub fn final_bounds(&self) -> GenerationBounds {
        GenerationBounds::new(self.final_min_tokens, self.final_max_tokens)
    }

    /// Bounds for map-step generation calls
    pub fn chunk_bounds(&self) -> GenerationBounds {
        GenerationBounds::new(self.chunk_min_tokens, self.chunk_max_tokens)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    /// Validate that the parameters are consistent with each other
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens_per_chunk == 0 {
            return Err("max_tokens_per_chunk must be positive".to_string());
        }
        if self.overlap_tokens >= self.max_tokens_per_chunk {
            return Err(format!(
                "overlap_tokens ({}) must be smaller than max_tokens_per_chunk ({})",
                self.overlap_tokens, self.max_tokens_per_chunk
            ));
        }
        if self.final_min_tokens > self.final_max_tokens {
            return Err(format!(
                "final_min_tokens ({}) exceeds final_max_tokens ({})",
                self.final_min_tokens, self.final_max_tokens
            ));
        }
        if self.chunk_min_tokens > self.chunk_max_tokens {
            return Err(format!(
                "chunk_min_tokens ({}) exceeds chunk_max_tokens ({})",
                self.chunk_min_tokens, self.chunk_max_tokens
            ));
        }
        if self.chunk_max_tokens >= self.stride() {
            // Otherwise a pass cannot be relied on to shrink the text
            return Err(format!(
                "chunk_max_tokens ({}) must be smaller than the stride ({})",
                self.chunk_max_tokens,
                self.stride()
            ));
        }
        if self.max_reduce_passes == 0 {
            return Err("max_reduce_passes must be positive".to_string());
        }
        if self.max_parallel_chunks == 0 {
            return Err("max_parallel_chunks must be positive".to_string());
        }
        if self.deadline_ms == Some(0) {
            return Err("deadline_ms must be positive when set".to_string());
        }
        Ok(())
    }
}
