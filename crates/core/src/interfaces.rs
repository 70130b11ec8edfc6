//! Narrow traits for the external collaborators the core consumes.
//!
//! The core is a client of these, never an owner: embedding and chat live
//! behind provider HTTP APIs, the corpus lives in a vector store, evidence
//! and trajectories live in whatever the host persists them with.  Tests
//! substitute scripted fakes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StageError;
use crate::schema::{Memory, PatternEvidence, PatternId, Pool, Trajectory};

// ── Embedding ─────────────────────────────────────────────────────────────────

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Turn text into a fixed-dimension vector.  Idempotent for identical
    /// inputs within a retry window; fails with `EmbedFailed` after the
    /// client's bounded retries are exhausted.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, StageError>;
}

// ── Vector search ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    /// Minimum similarity for a hit.
    pub threshold: f32,
    /// Maximum hits returned.
    pub max: usize,
    pub pool: Pool,
    /// Oldest `created_at` admitted; `None` means unlimited.
    pub cutoff: Option<DateTime<Utc>>,
}

/// One Stage-1 hit: the memory and its similarity in [0,1].
#[derive(Debug, Clone)]
pub struct PoolHit {
    pub memory: Memory,
    pub similarity: f32,
}

#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Search one pool, ordered by similarity descending.
    async fn search(
        &self,
        embedding: &[f32],
        params: SearchParams,
    ) -> Result<Vec<PoolHit>, StageError>;
}

// ── Chat endpoints ────────────────────────────────────────────────────────────

/// A token and its log-probability from a first-token sample.
#[derive(Debug, Clone)]
pub struct TokenLogprob {
    pub token: String,
    pub logprob: f64,
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Request exactly one completion token and the top-K log-probabilities
    /// of the first-token distribution.
    async fn complete_logprobs(
        &self,
        system: &str,
        user: &str,
        top_logprobs: usize,
    ) -> Result<Vec<TokenLogprob>, StageError>;

    /// Plain completion, used by the Stage-3 reframer.
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, StageError>;
}

// ── Stores ────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    async fn load(&self, pattern_id: PatternId) -> Result<Vec<PatternEvidence>, StageError>;
    async fn append(&self, record: PatternEvidence) -> Result<(), StageError>;
    async fn append_batch(&self, records: Vec<PatternEvidence>) -> Result<(), StageError>;
    /// Drop records beyond the per-pattern cap or older than the age limit.
    /// Returns how many were removed.
    async fn prune(&self) -> Result<usize, StageError>;
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn write(&self, memory: Memory) -> Result<(), StageError>;
    async fn update(&self, memory: Memory) -> Result<(), StageError>;
    async fn delete(&self, id: Uuid) -> Result<(), StageError>;
    /// Bump access counters for the memories that reached the prefix.
    async fn mark_access(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<(), StageError>;
}

#[async_trait]
pub trait TrajectoryStore: Send + Sync {
    async fn get_active(&self, user_id: &str) -> Result<Option<Trajectory>, StageError>;
}

// ── Clock ─────────────────────────────────────────────────────────────────────

/// Injected time source.  Confidence calibration and the temporal gate both
/// depend on it, so tests pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock for deterministic replay and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
