//! Topic categorization of summaries with a zero-shot classifier
//!
//! Categorization never fails a digest: any classifier error degrades to
//! [`UNCATEGORIZED`].

pub mod remote;

use crate::metrics::METRICS;
use crate::oracle::OracleError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub use remote::RemoteClassifier;

/// Category reported when classification is not possible
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Candidate labels used when none are configured
pub const DEFAULT_LABELS: [&str; 7] = [
    "Business",
    "Technology",
    "Sports",
    "Entertainment",
    "Politics",
    "Science",
    "World News",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f32,
}

/// Scores `text` against arbitrary candidate labels
#[async_trait]
pub trait ZeroShotClassifier: Send + Sync {
    async fn classify(&self, text: &str, labels: &[String]) -> Result<Vec<LabelScore>, OracleError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizerConfig {
    /// Classifier server URL; defaults to the oracle's when unset
    #[serde(default)]
    pub service_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_labels")]
    pub labels: Vec<String>,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_model() -> String { "valhalla/distilbart-mnli-12-3".to_string() }
fn default_labels() -> Vec<String> { DEFAULT_LABELS.iter().map(|l| l.to_string()).collect() }
fn default_timeout_ms() -> u64 { 30_000 }

impl Default for CategorizerConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            model: default_model(),
            labels: default_labels(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl CategorizerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.labels.is_empty() {
            return Err("categorizer.labels must not be empty".to_string());
        }
        if self.labels.iter().any(|l| l.trim().is_empty()) {
            return Err("categorizer.labels must not contain blank labels".to_string());
        }
        Ok(())
    }
}

pub struct Categorizer {
    classifier: Arc<dyn ZeroShotClassifier>,
    labels: Vec<String>,
}

impl Categorizer {
    pub fn new(classifier: Arc<dyn ZeroShotClassifier>, labels: Vec<String>) -> Self {
        Self { classifier, labels }
    }

    /// Create with the default label set
    pub fn with_default_labels(classifier: Arc<dyn ZeroShotClassifier>) -> Self {
        Self::new(classifier, default_labels())
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Return the best-scoring label for `text`
    pub async fn categorize(&self, text: &str) -> String {
        let category = match self.classifier.classify(text, &self.labels).await {
            Ok(scores) => match top_label(&scores) {
                Some(label) => {
                    debug!(category = %label, "Summary categorized");
                    label.to_string()
                }
                None => {
                    warn!("Classifier returned no scores");
                    UNCATEGORIZED.to_string()
                }
            },
            Err(e) => {
                warn!("Categorization failed: {}", e);
                UNCATEGORIZED.to_string()
            }
        };

        METRICS.record_category(&category);
        category
    }
}

fn top_label(scores: &[LabelScore]) -> Option<&str> {
    scores
        .iter()
        .filter(|s| s.score.is_finite())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|s| s.label.as_str())
}
