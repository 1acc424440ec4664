//! Recursive map-reduce summarization under a fixed token budget
//!
//! Text that fits in one oracle call is summarized directly. Longer text is
//! split into overlapping token windows, each window is summarized on its
//! own (map), the window summaries are joined (combine), and the joined text
//! goes around again (reduce) until it fits.

use super::config::SummarizerConfig;
use super::error::{Stage, SummarizerError};
use super::window::plan_windows;
use crate::metrics::METRICS;
use crate::oracle::{SequenceOracle, TokenId};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub struct RecursiveSummarizer {
    oracle: Arc<dyn SequenceOracle>,
    config: SummarizerConfig,
}

impl RecursiveSummarizer {
    /// Create a summarizer over a loaded oracle
    ///
    /// Fails if the configuration is inconsistent, or if the window size plus
    /// the prefix would not fit under the oracle's input limit.
    pub async fn new(
        oracle: Arc<dyn SequenceOracle>,
        config: SummarizerConfig,
    ) -> Result<Self, SummarizerError> {
        config
            .validate()
            .map_err(SummarizerError::InvalidConfiguration)?;

        let prefix_tokens = oracle
            .tokenize(&config.prefix)
            .await
            .map_err(SummarizerError::OracleUnavailable)?
            .len();

        let limit = oracle.max_input_tokens();
        if config.max_tokens_per_chunk + prefix_tokens > limit {
            return Err(SummarizerError::InvalidConfiguration(format!(
                "max_tokens_per_chunk ({}) plus prefix ({} tokens) exceeds the oracle limit of {} tokens",
                config.max_tokens_per_chunk, prefix_tokens, limit
            )));
        }

        Ok(Self { oracle, config })
    }

    pub fn config(&self) -> &SummarizerConfig {
        &self.config
    }

    /// Summarize text of any length
    ///
    /// Empty or whitespace-only input is rejected with
    /// [`SummarizerError::EmptyInput`] before the oracle is consulted.
    pub async fn summarize(&self, text: &str) -> Result<String, SummarizerError> {
        let start = Instant::now();

        let result = if text.trim().is_empty() {
            Err(SummarizerError::EmptyInput)
        } else {
            match self.config.deadline() {
                Some(deadline) => tokio::time::timeout(deadline, self.reduce(text))
                    .await
                    .unwrap_or(Err(SummarizerError::DeadlineExceeded(deadline))),
                None => self.reduce(text).await,
            }
        };

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        METRICS.record_summarization(status, start.elapsed());
        result
    }

    async fn reduce(&self, text: &str) -> Result<String, SummarizerError> {
        let max_tokens = self.config.max_tokens_per_chunk;

        let mut current = text.to_string();
        let mut previous_len: Option<usize> = None;
        let mut initial_len: Option<usize> = None;
        let mut pass = 0;

        loop {
            let tokens = self
                .oracle
                .tokenize(&self.with_prefix(&current))
                .await
                .map_err(SummarizerError::at(Stage::Tokenize { pass }))?;
            let len = tokens.len();
            let first_len = *initial_len.get_or_insert(len);

            if len <= max_tokens {
                debug!(tokens = len, pass, "Text fits in one call, generating final summary");
                let summary = self
                    .oracle
                    .generate_summary(&tokens, self.config.final_bounds())
                    .await
                    .map_err(SummarizerError::at(Stage::FinalSummary))?;
                METRICS.record_reduction(first_len, pass);
                return Ok(summary);
            }

            if let Some(previous) = previous_len {
                if len >= previous {
                    return Err(SummarizerError::NoProgress {
                        pass,
                        previous,
                        current: len,
                    });
                }
            }

            if pass == self.config.max_reduce_passes {
                return Err(SummarizerError::ReductionLimitExceeded {
                    passes: pass,
                    tokens: len,
                });
            }
            pass += 1;

            let windows = plan_windows(len, max_tokens, self.config.overlap_tokens);
            info!(
                pass,
                tokens = len,
                chunks = windows.len(),
                "Text too long, summarizing overlapping chunks"
            );

            let summaries = self.map_windows(&tokens, &windows).await?;
            current = summaries.join(" ");
            previous_len = Some(len);
        }
    }

    /// Summarize every window, keeping window order
    async fn map_windows(
        &self,
        tokens: &[TokenId],
        windows: &[Range<usize>],
    ) -> Result<Vec<String>, SummarizerError> {
        let chunks = windows.len();

        stream::iter(windows.iter().enumerate())
            .map(move |(chunk, window)| {
                self.summarize_window(&tokens[window.clone()], window.start == 0, chunk, chunks)
            })
            .buffered(self.config.max_parallel_chunks)
            .try_collect()
            .await
    }

    async fn summarize_window(
        &self,
        window: &[TokenId],
        carries_prefix: bool,
        chunk: usize,
        chunks: usize,
    ) -> Result<String, SummarizerError> {
        let text = self
            .oracle
            .decode(window)
            .await
            .map_err(SummarizerError::at(Stage::Decode { chunk, chunks }))?;

        let body = if carries_prefix {
            self.strip_prefix(&text)
        } else {
            text.trim_start()
        };

        let stage = Stage::ChunkSummary { chunk, chunks };
        let tokens = self
            .oracle
            .tokenize(&self.with_prefix(body))
            .await
            .map_err(SummarizerError::at(stage))?;

        debug!(chunk = chunk + 1, chunks, tokens = tokens.len(), "Summarizing chunk");

        let summary = self
            .oracle
            .generate_summary(&tokens, self.config.chunk_bounds())
            .await
            .map_err(SummarizerError::at(stage))?;

        METRICS.chunks_summarized.inc();
        Ok(summary)
    }

    fn with_prefix(&self, text: &str) -> String {
        format!("{}{}", self.config.prefix, text)
    }

    /// Drop the prefix that the first window inherited from the pass input
    fn strip_prefix<'a>(&self, text: &'a str) -> &'a str {
        let text = text.trim_start();
        let marker = self.config.prefix.trim();
        if marker.is_empty() {
            return text;
        }
        text.strip_prefix(marker).map(str::trim_start).unwrap_or(text)
    }
}
