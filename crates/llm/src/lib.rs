//! Provider clients for the external embedding and chat endpoints.
//!
//! Both speak the OpenAI-compatible wire format (`/embeddings` and
//! `/chat/completions`); the embedding client retries transient failures
//! with bounded exponential backoff and honors explicit `Retry-After`
//! hints.  All failures map into the core stage-error taxonomy so the
//! pipeline can fail open.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use hearth_config::EndpointsConfig;
use hearth_core::{ChatApi, Embedder, StageError, TokenLogprob};

/// Character budget for embedding input; longer text is truncated.
pub const EMBED_CHAR_BUDGET: usize = 8000;

/// Base delay for the embedding retry backoff.
const BACKOFF_BASE: Duration = Duration::from_millis(250);
/// Backoff never sleeps longer than this, Retry-After included.
const BACKOFF_CEILING: Duration = Duration::from_secs(8);

#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: reqwest::Client,
    base_url: String,
    chat_model: String,
    embed_model: String,
    api_key: Option<String>,
    embed_max_attempts: usize,
    call_timeout: Duration,
}

impl ProviderClient {
    /// Build a client from the endpoints config.  The API key is read from
    /// the environment variable the config names; it never lives in the
    /// config file itself.
    pub fn from_config(endpoints: &EndpointsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoints.call_timeout_secs))
            .build()
            .context("building http client")?;

        let api_key = std::env::var(&endpoints.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!(var = %endpoints.api_key_env, "no API key in environment; provider calls will be unauthenticated");
        }

        Ok(Self {
            client,
            base_url: endpoints.base_url.trim_end_matches('/').to_string(),
            chat_model: endpoints.chat_model.clone(),
            embed_model: endpoints.embed_model.clone(),
            api_key,
            embed_max_attempts: endpoints.embed_max_attempts.max(1),
            call_timeout: Duration::from_secs(endpoints.call_timeout_secs),
        })
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(format!("{}{path}", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    async fn post_json(
        &self,
        path: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, CallFailure> {
        let response = self.request(path).json(payload).send().await.map_err(|e| {
            if e.is_timeout() {
                CallFailure::Timeout
            } else {
                CallFailure::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        let retry_after = parse_retry_after(&response);
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CallFailure::Transport(format!("body: {e}")))?;

        if status.is_success() {
            Ok(body)
        } else if status.as_u16() == 429 || status.is_server_error() {
            Err(CallFailure::Transient {
                status: status.as_u16(),
                retry_after,
                body: body.to_string(),
            })
        } else {
            Err(CallFailure::Permanent(format!("{status}: {body}")))
        }
    }
}

/// Internal failure classification driving the retry loop.
#[derive(Debug)]
enum CallFailure {
    Timeout,
    Transport(String),
    Transient {
        status: u16,
        retry_after: Option<Duration>,
        body: String,
    },
    Permanent(String),
}

impl CallFailure {
    fn describe(&self) -> String {
        match self {
            CallFailure::Timeout => "timeout".to_string(),
            CallFailure::Transport(msg) => msg.clone(),
            CallFailure::Transient { status, body, .. } => format!("{status}: {body}"),
            CallFailure::Permanent(msg) => msg.clone(),
        }
    }
}

fn parse_retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Delay before retry `attempt` (0-based): `Retry-After` when the provider
/// said so, exponential doubling otherwise, both bounded by the ceiling.
fn backoff_delay(attempt: usize, retry_after: Option<Duration>) -> Duration {
    let exponential = BACKOFF_BASE * 2u32.saturating_pow(attempt as u32);
    retry_after.unwrap_or(exponential).min(BACKOFF_CEILING)
}

/// Truncate embedding input to the documented character budget.
pub fn truncate_for_embedding(text: &str) -> &str {
    match text.char_indices().nth(EMBED_CHAR_BUDGET) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

// ── Response parsing ──────────────────────────────────────────────────────────

fn parse_embedding_response(body: &serde_json::Value) -> Option<Vec<f32>> {
    let values = body.get("data")?.get(0)?.get("embedding")?.as_array()?;
    values.iter().map(|v| v.as_f64().map(|f| f as f32)).collect()
}

fn parse_logprobs_response(body: &serde_json::Value) -> Option<Vec<TokenLogprob>> {
    let top = body
        .get("choices")?
        .get(0)?
        .get("logprobs")?
        .get("content")?
        .get(0)?
        .get("top_logprobs")?
        .as_array()?;
    top.iter()
        .map(|entry| {
            Some(TokenLogprob {
                token: entry.get("token")?.as_str()?.to_string(),
                logprob: entry.get("logprob")?.as_f64()?,
            })
        })
        .collect()
}

fn parse_completion_response(body: &serde_json::Value) -> Option<String> {
    body.get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()
        .map(ToString::to_string)
}

// ── Trait implementations ─────────────────────────────────────────────────────

#[async_trait]
impl Embedder for ProviderClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StageError> {
        let payload = json!({
            "model": self.embed_model,
            "input": truncate_for_embedding(text),
        });

        let mut last_failure = String::new();
        for attempt in 0..self.embed_max_attempts {
            match self.post_json("/embeddings", &payload).await {
                Ok(body) => {
                    return parse_embedding_response(&body).ok_or_else(|| {
                        StageError::EmbedFailed("response missing embedding".to_string())
                    });
                }
                Err(CallFailure::Permanent(msg)) => {
                    return Err(StageError::EmbedFailed(msg));
                }
                Err(failure) => {
                    last_failure = failure.describe();
                    let retry_after = match &failure {
                        CallFailure::Transient { retry_after, .. } => *retry_after,
                        _ => None,
                    };
                    if attempt + 1 < self.embed_max_attempts {
                        let delay = backoff_delay(attempt, retry_after);
                        warn!(attempt, delay_ms = delay.as_millis() as u64, error = %last_failure, "embed failed; retrying");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(StageError::EmbedFailed(format!(
            "{} attempts exhausted: {last_failure}",
            self.embed_max_attempts
        )))
    }
}

#[async_trait]
impl ChatApi for ProviderClient {
    async fn complete_logprobs(
        &self,
        system: &str,
        user: &str,
        top_logprobs: usize,
    ) -> Result<Vec<TokenLogprob>, StageError> {
        let payload = json!({
            "model": self.chat_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "max_tokens": 1,
            "logprobs": true,
            "top_logprobs": top_logprobs,
        });

        let body = self.post_json("/chat/completions", &payload).await.map_err(|f| match f {
            CallFailure::Timeout => StageError::Timeout(self.call_timeout.as_millis() as u64),
            other => StageError::LogprobsFailed(other.describe()),
        })?;

        parse_logprobs_response(&body)
            .ok_or_else(|| StageError::LogprobsFailed("response missing logprobs".to_string()))
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, StageError> {
        let payload = json!({
            "model": self.chat_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });

        let body = self.post_json("/chat/completions", &payload).await.map_err(|f| match f {
            CallFailure::Timeout => StageError::Timeout(self.call_timeout.as_millis() as u64),
            other => StageError::RewriteFailed(other.describe()),
        })?;

        parse_completion_response(&body)
            .ok_or_else(|| StageError::RewriteFailed("response missing content".to_string()))
    }
}
