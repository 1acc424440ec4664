//! Crate-level error type for bootstrapping the pipeline

use crate::oracle::OracleError;
use crate::summarizer::SummarizerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Summarizer(#[from] SummarizerError),
}

pub type Result<T> = std::result::Result<T, DigestError>;
