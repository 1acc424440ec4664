//! Model server client with retry, circuit breaker, and an inference gate

use super::bpe::BpeTokenizer;
use super::circuit_breaker::{BreakerStats, CircuitBreaker, CircuitBreakerConfig};
use super::config::{OracleConfig, TokenizerKind};
use super::{GenerationBounds, OracleError, SequenceOracle, TokenId};
use crate::metrics::METRICS;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

enum Tokenization {
    Remote,
    Local(BpeTokenizer),
}

/// Sequence oracle backed by a model server
///
/// Construct with [`RemoteOracle::connect`] once at startup and share the
/// result behind an `Arc`.
pub struct RemoteOracle {
    http: Client,
    config: OracleConfig,
    model: String,
    tokenization: Tokenization,
    inference_gate: Arc<Semaphore>,
    breaker: Arc<CircuitBreaker>,
}

impl RemoteOracle {
    /// Connect to the model server and resolve which model to use
    ///
    /// Any failure here means the oracle is unavailable and the summarizer
    /// must not be started.
    pub async fn connect(config: OracleConfig) -> Result<Self, OracleError> {
        config.validate().map_err(OracleError::Unavailable)?;

        let http = build_http_client(config.timeout())?;

        let health: HealthResponse = get_json(
            &http,
            &format!("{}/health", config.base_url()),
            config.api_key.as_deref(),
        )
        .await
        .map_err(|e| OracleError::Unavailable(format!("health check failed: {}", e)))?;

        let model = resolve_model(&config, &health)?;

        let tokenization = match config.tokenizer {
            TokenizerKind::Remote => Tokenization::Remote,
            kind => Tokenization::Local(BpeTokenizer::new(kind)?),
        };

        let breaker = Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: config.circuit_breaker_failures,
            reset_timeout: config.breaker_reset_timeout(),
        }));

        info!(
            model = %model,
            server_default = health.model.as_deref().unwrap_or("-"),
            service_url = %config.service_url,
            tokenizer = ?config.tokenizer,
            max_input_tokens = config.max_input_tokens,
            "Sequence oracle ready"
        );

        Ok(Self {
            http,
            inference_gate: Arc::new(Semaphore::new(config.max_concurrent_generations)),
            config,
            model,
            tokenization,
            breaker,
        })
    }

    /// Model identifier that is actually being used
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Stop accepting generation requests
    ///
    /// Calls already holding the gate finish; later ones fail with
    /// [`OracleError::Unavailable`].
    pub fn shutdown(&self) {
        info!(model = %self.model, "Shutting down sequence oracle");
        self.inference_gate.close();
    }

    /// Get circuit breaker statistics
    pub fn breaker_stats(&self, operation: &'static str) -> BreakerStats {
        self.breaker.stats(operation)
    }

    /// POST to the model server with breaker and retry handling
    async fn call<Req, Resp>(
        &self,
        operation: &'static str,
        body: &Req,
    ) -> Result<Resp, OracleError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let start = Instant::now();

        if self.breaker.is_open(operation) {
            METRICS.record_circuit_open(operation);
            error!(operation, "Circuit breaker is open");
            return Err(OracleError::CircuitOpen(operation.to_string()));
        }

        let url = format!("{}/{}", self.config.base_url(), operation);

        let mut attempt = 0;
        let result = loop {
            attempt += 1;

            match post_json(&self.http, &url, self.config.api_key.as_deref(), body).await {
                Ok(response) => {
                    self.breaker.mark_success(operation);
                    break Ok(response);
                }
                Err(e) if !e.is_transient() => {
                    // Only transport failures and 5xx responses count against the breaker
                    error!(operation, attempt, "Oracle call rejected: {}", e);
                    break Err(e);
                }
                Err(e) => {
                    self.breaker.mark_failure(operation);

                    if attempt > self.config.retry_attempts {
                        error!(operation, attempt, "Oracle call failed: {}", e);
                        break Err(e);
                    }

                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        "Oracle call failed: {}, retrying in {:?}",
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        METRICS.record_oracle_call(operation, result.is_ok(), start.elapsed());
        result
    }

    /// Exponential backoff for retry `attempt` (1-based)
    fn calculate_backoff(&self, attempt: usize) -> Duration {
        let base = self.config.retry_backoff();
        let multiplier = 2_u32.saturating_pow(attempt.saturating_sub(1) as u32);
        base.saturating_mul(multiplier)
    }
}

#[async_trait]
impl SequenceOracle for RemoteOracle {
    async fn tokenize(&self, text: &str) -> Result<Vec<TokenId>, OracleError> {
        match &self.tokenization {
            Tokenization::Local(bpe) => Ok(bpe.encode(text)),
            Tokenization::Remote => {
                let request = TokenizeRequest {
                    model: &self.model,
                    text,
                };
                let response: TokenizeResponse = self.call("tokenize", &request).await?;
                Ok(response.ids)
            }
        }
    }

    async fn decode(&self, tokens: &[TokenId]) -> Result<String, OracleError> {
        match &self.tokenization {
            Tokenization::Local(bpe) => Ok(bpe.decode(tokens)),
            Tokenization::Remote => {
                let request = DetokenizeRequest {
                    model: &self.model,
                    ids: tokens,
                    skip_special_tokens: true,
                };
                let response: DetokenizeResponse = self.call("detokenize", &request).await?;
                Ok(response.text)
            }
        }
    }

    async fn generate_summary(
        &self,
        tokens: &[TokenId],
        bounds: GenerationBounds,
    ) -> Result<String, OracleError> {
        if tokens.len() > self.config.max_input_tokens {
            return Err(OracleError::InputTooLong {
                len: tokens.len(),
                limit: self.config.max_input_tokens,
            });
        }

        let _permit = self
            .inference_gate
            .acquire()
            .await
            .map_err(|_| OracleError::Unavailable("oracle has been shut down".to_string()))?;

        debug!(
            input_tokens = tokens.len(),
            min_new_tokens = bounds.min_new_tokens,
            max_new_tokens = bounds.max_new_tokens,
            "Requesting summary generation"
        );

        // Local ids belong to a different vocabulary than the model's, so the
        // server gets text and tokenizes it itself
        let (input_ids, text) = match &self.tokenization {
            Tokenization::Remote => (Some(tokens), None),
            Tokenization::Local(bpe) => (None, Some(bpe.decode(tokens))),
        };

        let request = GenerateRequest {
            model: &self.model,
            input_ids,
            text,
            min_new_tokens: bounds.min_new_tokens,
            max_new_tokens: bounds.max_new_tokens,
            do_sample: false,
        };
        let response: GenerateResponse = self.call("generate", &request).await?;
        Ok(response.summary_text)
    }

    fn max_input_tokens(&self) -> usize {
        self.config.max_input_tokens
    }
}

/// Pick the configured model, or the fallback when the server lacks it
fn resolve_model(config: &OracleConfig, health: &HealthResponse) -> Result<String, OracleError> {
    if !health.status.eq_ignore_ascii_case("ok") {
        return Err(OracleError::Unavailable(format!(
            "model server reports status '{}'",
            health.status
        )));
    }

    // Servers that host a single model may not enumerate it
    if health.available_models.is_empty() || health.serves(&config.model) {
        return Ok(config.model.clone());
    }

    match &config.fallback_model {
        Some(fallback) if health.serves(fallback) => {
            warn!(
                model = %config.model,
                fallback = %fallback,
                "Configured model is not served, falling back"
            );
            Ok(fallback.clone())
        }
        _ => Err(OracleError::Unavailable(format!(
            "model '{}' is not served (available: {})",
            config.model,
            health.available_models.join(", ")
        ))),
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, OracleError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| OracleError::Unavailable(format!("failed to build HTTP client: {}", e)))
}

fn map_transport_error(e: reqwest::Error) -> OracleError {
    if e.is_timeout() {
        OracleError::Timeout(e.to_string())
    } else {
        OracleError::RequestFailed(e.to_string())
    }
}

async fn read_json<Resp: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Resp, OracleError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(OracleError::UpstreamError {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| OracleError::InvalidResponse(e.to_string()))
}

pub(crate) async fn post_json<Req, Resp>(
    http: &Client,
    url: &str,
    api_key: Option<&str>,
    body: &Req,
) -> Result<Resp, OracleError>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let mut req = http.post(url).json(body);
    if let Some(api_key) = api_key {
        req = req.bearer_auth(api_key);
    }

    let response = req.send().await.map_err(map_transport_error)?;
    read_json(response).await
}

async fn get_json<Resp: DeserializeOwned>(
    http: &Client,
    url: &str,
    api_key: Option<&str>,
) -> Result<Resp, OracleError> {
    let mut req = http.get(url);
    if let Some(api_key) = api_key {
        req = req.bearer_auth(api_key);
    }

    let response = req.send().await.map_err(map_transport_error)?;
    read_json(response).await
}

// Wire types for the model server
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    available_models: Vec<String>,
}

impl HealthResponse {
    fn serves(&self, model: &str) -> bool {
        self.available_models.iter().any(|m| m == model)
    }
}

#[derive(Debug, Serialize)]
struct TokenizeRequest<'a> {
    model: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    ids: Vec<TokenId>,
}

#[derive(Debug, Serialize)]
struct DetokenizeRequest<'a> {
    model: &'a str,
    ids: &'a [TokenId],
    skip_special_tokens: bool,
}

#[derive(Debug, Deserialize)]
struct DetokenizeResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_ids: Option<&'a [TokenId]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    min_new_tokens: usize,
    max_new_tokens: usize,
    do_sample: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    summary_text: String,
}
