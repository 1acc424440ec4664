//! Article summarization and categorization
//!
//! The core is [`summarizer::RecursiveSummarizer`], which summarizes text of
//! any length under a fixed per-call token budget by recursively chunking
//! and summarizing (map-reduce) through a [`oracle::SequenceOracle`].
//! [`digest::DigestService`] wires it to a zero-shot categorizer and a
//! result cache.

pub mod categorizer;
pub mod config;
pub mod digest;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod oracle;
pub mod summarizer;

pub use config::Config;
pub use digest::{ArticleDigest, DigestService};
pub use error::{DigestError, Result};
pub use oracle::{GenerationBounds, OracleError, SequenceOracle, TokenId};
pub use summarizer::{RecursiveSummarizer, SummarizerConfig, SummarizerError};
