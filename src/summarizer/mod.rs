//! Long-document summarization under a fixed per-call token budget

pub mod config;
pub mod error;
pub mod recursive;
pub mod window;

pub use config::SummarizerConfig;
pub use error::{Stage, SummarizerError};
pub use recursive::RecursiveSummarizer;
pub use window::plan_windows;
