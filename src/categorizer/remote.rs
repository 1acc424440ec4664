//! Zero-shot classification over HTTP

use super::{LabelScore, ZeroShotClassifier};
use crate::metrics::METRICS;
use crate::oracle::remote::{build_http_client, post_json};
use crate::oracle::OracleError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub struct RemoteClassifier {
    http: Client,
    url: String,
    model: String,
    api_key: Option<String>,
}

impl RemoteClassifier {
    pub fn new(
        service_url: &str,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            url: format!("{}/classify", service_url.trim_end_matches('/')),
            model: model.into(),
            api_key,
        })
    }
}

#[async_trait]
impl ZeroShotClassifier for RemoteClassifier {
    async fn classify(&self, text: &str, labels: &[String]) -> Result<Vec<LabelScore>, OracleError> {
        let start = Instant::now();

        let request = ClassifyRequest {
            model: &self.model,
            text,
            candidate_labels: labels,
        };
        let result: Result<ClassifyResponse, OracleError> =
            post_json(&self.http, &self.url, self.api_key.as_deref(), &request).await;

        METRICS.record_oracle_call("classify", result.is_ok(), start.elapsed());

        let response = result?;
        if response.labels.len() != response.scores.len() {
            return Err(OracleError::InvalidResponse(format!(
                "{} labels but {} scores",
                response.labels.len(),
                response.scores.len()
            )));
        }

        Ok(response
            .labels
            .into_iter()
            .zip(response.scores)
            .map(|(label, score)| LabelScore { label, score })
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    model: &'a str,
    text: &'a str,
    candidate_labels: &'a [String],
}

/// Labels sorted by descending score, as zero-shot pipelines report them
#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    labels: Vec<String>,
    scores: Vec<f32>,
}
