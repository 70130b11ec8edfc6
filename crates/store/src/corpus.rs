//! In-memory corpus store.
//!
//! Implements the vector-search, memory-store, and trajectory traits over a
//! plain map with brute-force cosine similarity.  Used by the CLI for local
//! operation against a JSON snapshot and by tests; production deployments
//! point the same traits at a real vector database.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use hearth_core::{
    Memory, MemoryStore, PoolHit, SearchParams, StageError, Trajectory, TrajectoryStore,
    VectorSearch,
};

#[derive(Default)]
pub struct InMemoryCorpus {
    memories: RwLock<HashMap<Uuid, Memory>>,
    trajectories: RwLock<HashMap<String, Trajectory>>,
}

impl InMemoryCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON snapshot (an array of memories) into the corpus.
    pub fn load_snapshot(&self, path: impl AsRef<Path>) -> Result<usize> {
        let raw = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading corpus snapshot {}", path.as_ref().display()))?;
        let memories: Vec<Memory> =
            serde_json::from_str(&raw).context("parsing corpus snapshot")?;
        let count = memories.len();

        let mut map = self.memories.write();
        for memory in memories {
            map.insert(memory.id, memory);
        }
        info!(count, "corpus snapshot loaded");
        Ok(count)
    }

    pub fn insert(&self, memory: Memory) {
        self.memories.write().insert(memory.id, memory);
    }

    pub fn set_trajectory(&self, user_id: impl Into<String>, trajectory: Trajectory) {
        self.trajectories.write().insert(user_id.into(), trajectory);
    }

    pub fn len(&self) -> usize {
        self.memories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: Uuid) -> Option<Memory> {
        self.memories.read().get(&id).cloned()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    (dot / (mag_a * mag_b)).clamp(0.0, 1.0)
}

#[async_trait]
impl VectorSearch for InMemoryCorpus {
    async fn search(
        &self,
        embedding: &[f32],
        params: SearchParams,
    ) -> Result<Vec<PoolHit>, StageError> {
        let map = self.memories.read();
        let mut hits: Vec<PoolHit> = map
            .values()
            .filter(|m| m.pool == params.pool)
            .filter(|m| params.cutoff.is_none_or(|cutoff| m.created_at >= cutoff))
            .filter_map(|m| {
                let vector = m.embedding.as_deref()?;
                let similarity = cosine_similarity(vector, embedding);
                (similarity >= params.threshold)
                    .then(|| PoolHit { memory: m.clone(), similarity })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| a.memory.id.cmp(&b.memory.id))
        });
        hits.truncate(params.max);
        Ok(hits)
    }
}

#[async_trait]
impl MemoryStore for InMemoryCorpus {
    async fn write(&self, memory: Memory) -> Result<(), StageError> {
        self.memories.write().insert(memory.id, memory);
        Ok(())
    }

    async fn update(&self, memory: Memory) -> Result<(), StageError> {
        let mut map = self.memories.write();
        if !map.contains_key(&memory.id) {
            return Err(StageError::StoreUnavailable(format!(
                "unknown memory {}",
                memory.id
            )));
        }
        map.insert(memory.id, memory);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StageError> {
        self.memories.write().remove(&id);
        Ok(())
    }

    async fn mark_access(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<(), StageError> {
        let mut map = self.memories.write();
        for id in ids {
            if let Some(memory) = map.get_mut(id) {
                memory.access_count += 1;
                memory.last_accessed = Some(at);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TrajectoryStore for InMemoryCorpus {
    async fn get_active(&self, user_id: &str) -> Result<Option<Trajectory>, StageError> {
        Ok(self
            .trajectories
            .read()
            .get(user_id)
            .filter(|t| t.is_active)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use hearth_core::{Durability, MemoryKind, Pool, Validation};

    use super::*;

    fn memory(embedding: Vec<f32>, pool: Pool, age_days: i64) -> Memory {
        let created = Utc::now() - Duration::days(age_days);
        Memory {
            id: Uuid::new_v4(),
            content: "a memory".to_string(),
            pool,
            kind: MemoryKind::Fact,
            domain: None,
            emotion: None,
            heat: 0.4,
            intensity: 0.5,
            validation: Validation::Untested,
            durability: Durability::Contextual,
            embedding: Some(embedding),
            created_at: created,
            updated_at: created,
            access_count: 0,
            last_accessed: None,
        }
    }

    fn params(pool: Pool, cutoff: Option<DateTime<Utc>>) -> SearchParams {
        SearchParams { threshold: 0.35, max: 15, pool, cutoff }
    }

    #[tokio::test]
    async fn search_filters_by_pool_threshold_and_cutoff() {
        let corpus = InMemoryCorpus::new();
        let close = memory(vec![1.0, 0.0], Pool::User, 1);
        let far = memory(vec![0.0, 1.0], Pool::User, 1);
        let wrong_pool = memory(vec![1.0, 0.0], Pool::Ai, 1);
        let too_old = memory(vec![1.0, 0.0], Pool::User, 40);
        for m in [close.clone(), far, wrong_pool, too_old] {
            corpus.insert(m);
        }

        let cutoff = Some(Utc::now() - Duration::days(30));
        let hits = corpus
            .search(&[1.0, 0.0], params(Pool::User, cutoff))
            .await
            .expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.id, close.id);
        assert!(hits[0].similarity > 0.99);
    }

    #[tokio::test]
    async fn memories_without_embeddings_are_invisible_to_search() {
        let corpus = InMemoryCorpus::new();
        let mut blind = memory(vec![], Pool::User, 1);
        blind.embedding = None;
        corpus.insert(blind);

        let hits = corpus
            .search(&[1.0, 0.0], params(Pool::User, None))
            .await
            .expect("search");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn mark_access_bumps_counters() {
        let corpus = InMemoryCorpus::new();
        let m = memory(vec![1.0, 0.0], Pool::User, 1);
        let id = m.id;
        corpus.insert(m);

        let at = Utc::now();
        corpus.mark_access(&[id], at).await.expect("mark");
        corpus.mark_access(&[id], at).await.expect("mark again");

        let stored = corpus.get(id).expect("present");
        assert_eq!(stored.access_count, 2);
        assert_eq!(stored.last_accessed, Some(at));
    }

    #[tokio::test]
    async fn update_of_unknown_memory_fails() {
        let corpus = InMemoryCorpus::new();
        let m = memory(vec![1.0, 0.0], Pool::User, 1);
        assert!(corpus.update(m).await.is_err());
    }

    #[tokio::test]
    async fn only_active_trajectories_are_returned() {
        let corpus = InMemoryCorpus::new();
        let mut trajectory = Trajectory {
            compressed_text: "direction".to_string(),
            arcs: vec![],
            tensions: vec![],
            drift: None,
            memory_count: 1,
            generated_at: Utc::now(),
            is_active: false,
        };
        corpus.set_trajectory("u1", trajectory.clone());
        assert!(corpus.get_active("u1").await.expect("lookup").is_none());

        trajectory.is_active = true;
        corpus.set_trajectory("u1", trajectory);
        assert!(corpus.get_active("u1").await.expect("lookup").is_some());
    }
}
