//! Summarize-then-categorize entry point with a result cache

use crate::categorizer::{Categorizer, RemoteClassifier, UNCATEGORIZED};
use crate::config::{CacheConfig, Config};
use crate::error::{DigestError, Result};
use crate::metrics::METRICS;
use crate::oracle::{RemoteOracle, SequenceOracle};
use crate::summarizer::{RecursiveSummarizer, SummarizerError};
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

/// Source label for text scraped from an online article
pub const SOURCE_ONLINE_ARTICLE: &str = "Online Article";
/// Source label for text extracted from an uploaded image
pub const SOURCE_OCR_UPLOAD: &str = "OCR Upload";

/// Summary and category of one piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDigest {
    pub id: Uuid,
    pub source: String,
    pub summary: String,
    pub category: String,
    /// Length of the input text in characters
    pub input_chars: usize,
    pub created_at: DateTime<Utc>,
}

/// Cached result; `category` is `None` when classification fell back
#[derive(Debug, Clone)]
struct Digested {
    summary: String,
    category: Option<String>,
}

pub struct DigestService {
    summarizer: Arc<RecursiveSummarizer>,
    categorizer: Categorizer,
    cache: Option<Cache<String, Digested>>,
}

impl DigestService {
    pub fn new(
        summarizer: Arc<RecursiveSummarizer>,
        categorizer: Categorizer,
        cache_config: &CacheConfig,
    ) -> Self {
        let cache = cache_config.enabled.then(|| {
            Cache::builder()
                .max_capacity(cache_config.max_entries)
                .time_to_live(Duration::from_secs(cache_config.ttl_secs))
                .build()
        });

        Self {
            summarizer,
            categorizer,
            cache,
        }
    }

    /// Build the whole pipeline from configuration
    ///
    /// Fails if the model server is unreachable or does not serve a usable
    /// model; the service never starts without an oracle.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let oracle = RemoteOracle::connect(config.oracle.clone())
            .await
            .map_err(SummarizerError::OracleUnavailable)?;
        let oracle: Arc<dyn SequenceOracle> = Arc::new(oracle);

        let summarizer = RecursiveSummarizer::new(oracle, config.summarizer.clone()).await?;

        let classifier_url = config
            .categorizer
            .service_url
            .as_deref()
            .unwrap_or(&config.oracle.service_url);
        let classifier = RemoteClassifier::new(
            classifier_url,
            config.categorizer.model.clone(),
            config.oracle.api_key.clone(),
            Duration::from_millis(config.categorizer.timeout_ms),
        )
        .map_err(DigestError::Oracle)?;
        let categorizer = Categorizer::new(Arc::new(classifier), config.categorizer.labels.clone());

        info!(
            cache_enabled = config.cache.enabled,
            labels = categorizer.labels().len(),
            "Digest service ready"
        );

        Ok(Self::new(Arc::new(summarizer), categorizer, &config.cache))
    }

    pub fn summarizer(&self) -> &Arc<RecursiveSummarizer> {
        &self.summarizer
    }

    /// Summarize `text` and categorize the summary
    pub async fn digest(
        &self,
        text: &str,
        source: &str,
    ) -> std::result::Result<ArticleDigest, SummarizerError> {
        let key = content_hash(text);

        let cached = match &self.cache {
            Some(cache) => cache.get(&key).await,
            None => None,
        };
        if self.cache.is_some() {
            METRICS.record_cache_lookup(cached.is_some());
        }

        let (summary, category) = match cached {
            Some(Digested {
                summary,
                category: Some(category),
            }) => {
                debug!(hash = %key, "Using cached digest");
                (summary, category)
            }
            Some(Digested {
                summary,
                category: None,
            }) => {
                debug!(hash = %key, "Using cached summary, retrying categorization");
                let category = self.categorize_and_store(key, &summary).await;
                (summary, category)
            }
            None => {
                let summary = self.summarizer.summarize(text).await?;
                let category = self.categorize_and_store(key, &summary).await;
                (summary, category)
            }
        };

        info!(source, category = %category, "Digest produced");

        Ok(ArticleDigest {
            id: Uuid::new_v4(),
            source: source.to_string(),
            summary,
            category,
            input_chars: text.chars().count(),
            created_at: Utc::now(),
        })
    }

    /// Categorize `summary` and cache it; a fallback category is not kept
    async fn categorize_and_store(&self, key: String, summary: &str) -> String {
        let category = self.categorizer.categorize(summary).await;
        if let Some(cache) = &self.cache {
            let digested = Digested {
                summary: summary.to_string(),
                category: (category != UNCATEGORIZED).then(|| category.clone()),
            };
            cache.insert(key, digested).await;
        }
        category
    }
}

/// SHA-256 of the text, hex encoded
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
