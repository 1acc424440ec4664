//! Summarizer errors

use crate::oracle::OracleError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which oracle interaction failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Tokenizing the (prefixed) text of a pass
    Tokenize { pass: usize },
    /// Decoding a window back to text
    Decode { chunk: usize, chunks: usize },
    /// Generating a chunk-level summary
    ChunkSummary { chunk: usize, chunks: usize },
    /// The terminal generation call
    FinalSummary,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Tokenize { pass } => write!(f, "tokenization (pass {})", pass),
            Stage::Decode { chunk, chunks } => write!(f, "decoding chunk {}/{}", chunk + 1, chunks),
            Stage::ChunkSummary { chunk, chunks } => {
                write!(f, "summarizing chunk {}/{}", chunk + 1, chunks)
            }
            Stage::FinalSummary => write!(f, "final summary"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SummarizerError {
    /// The oracle could not be brought up; fatal at startup
    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(#[source] OracleError),

    #[error("Generation failed during {stage}: {source}")]
    GenerationFailure {
        stage: Stage,
        #[source]
        source: OracleError,
    },

    #[error("Input text is empty")]
    EmptyInput,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Summarization exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Text still has {tokens} tokens after {passes} reduce passes")]
    ReductionLimitExceeded { passes: usize, tokens: usize },

    #[error("Reduce pass {pass} did not shrink the text ({previous} -> {current} tokens)")]
    NoProgress {
        pass: usize,
        previous: usize,
        current: usize,
    },
}

impl SummarizerError {
    pub(crate) fn at(stage: Stage) -> impl FnOnce(OracleError) -> Self {
        move |source| SummarizerError::GenerationFailure { stage, source }
    }

    /// Short label for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            SummarizerError::OracleUnavailable(_) => "oracle_unavailable",
            SummarizerError::GenerationFailure { .. } => "generation_failure",
            SummarizerError::EmptyInput => "empty_input",
            SummarizerError::InvalidConfiguration(_) => "invalid_configuration",
            SummarizerError::DeadlineExceeded(_) => "deadline_exceeded",
            SummarizerError::ReductionLimitExceeded { .. } => "reduction_limit",
            SummarizerError::NoProgress { .. } => "no_progress",
        }
    }
}
