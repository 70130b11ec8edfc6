use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Minimum cosine similarity for a Stage-1 candidate.
    pub similarity_threshold: f32,
    /// Maximum candidates returned per pool search.
    pub max_candidates: usize,
    /// Overall wall-clock budget for the retrieval stages, in seconds.
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.35,
            max_candidates: 15,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurpriseConfig {
    /// Dominant-domain candidates scored per re-rank, at most.
    pub max_candidates: usize,
    /// Candidates kept after KL ordering.
    pub keep: usize,
    /// Top log-probabilities requested per first-token sample.
    pub top_logprobs: usize,
    /// Bounded entry count for the KL score cache.
    pub cache_capacity: usize,
}

impl Default for SurpriseConfig {
    fn default() -> Self {
        Self {
            max_candidates: 8,
            keep: 5,
            top_logprobs: 20,
            cache_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Composite score floor below which candidates are dropped.
    pub min_score: f32,
    /// Selection cap for the user pool.
    pub user_cap: usize,
    /// Selection cap for the ai pool.
    pub ai_cap: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_score: 0.15,
            user_cap: 3,
            ai_cap: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Most-recent records kept per pattern after a prune pass.
    pub max_per_pattern: usize,
    /// Records older than this are dropped on prune.
    pub max_age_days: i64,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            max_per_pattern: 100,
            max_age_days: 365,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// Base URL of the OpenAI-compatible provider.
    /// Overridden at runtime by the `HEARTH_BASE_URL` environment variable
    /// when set.
    pub base_url: String,
    pub chat_model: String,
    pub embed_model: String,
    /// Env var holding the API key; the key itself never lives in the file.
    pub api_key_env: String,
    /// Per-call timeout for chat/embedding requests, in seconds.
    pub call_timeout_secs: u64,
    /// Retry attempts for the embedding client.
    pub embed_max_attempts: usize,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            chat_model: "openai/gpt-4o-mini".to_string(),
            embed_model: "openai/text-embedding-3-small".to_string(),
            api_key_env: "HEARTH_API_KEY".to_string(),
            call_timeout_secs: 10,
            embed_max_attempts: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HearthConfig {
    pub retrieval: RetrievalConfig,
    pub surprise: SurpriseConfig,
    pub selector: SelectorConfig,
    pub evidence: EvidenceConfig,
    pub endpoints: EndpointsConfig,
    pub telemetry: TelemetryConfig,
}

impl HearthConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }

        if let Ok(value) = env::var("HEARTH_BASE_URL") {
            if !value.is_empty() {
                config.endpoints.base_url = value;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}
