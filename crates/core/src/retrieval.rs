//! Stage 1: parallel pool searches and the domain dominance check that
//! decides whether the surprise re-ranker fires.

use futures::future;
use std::collections::HashMap;

use tracing::warn;

use crate::error::StageError;
use crate::interfaces::{SearchParams, VectorSearch};
use crate::schema::{Domain, MemoryClass, Pool, ScoredMemory};
use chrono::{DateTime, Utc};

/// Search both pools concurrently and union the hits, tagged by pool and
/// ordered by similarity descending.
///
/// A single failing pool degrades to its successful sibling; only both
/// failing surfaces as `SearchFailed`.
pub async fn search_pools(
    store: &dyn VectorSearch,
    embedding: &[f32],
    threshold: f32,
    max: usize,
    cutoff: Option<DateTime<Utc>>,
) -> Result<Vec<ScoredMemory>, StageError> {
    let params_for = |pool: Pool| SearchParams { threshold, max, pool, cutoff };

    let (user, ai) = future::join(
        store.search(embedding, params_for(Pool::User)),
        store.search(embedding, params_for(Pool::Ai)),
    )
    .await;

    let mut candidates: Vec<ScoredMemory> = Vec::new();
    let mut failures = 0usize;
    let mut last_error = String::new();
    for result in [user, ai] {
        match result {
            Ok(hits) => candidates
                .extend(hits.into_iter().map(|hit| ScoredMemory::new(hit.memory, hit.similarity))),
            Err(err) => {
                failures += 1;
                last_error = err.to_string();
                warn!(error = %err, "pool search failed; continuing with remaining pool");
            }
        }
    }

    if failures == 2 {
        return Err(StageError::SearchFailed(last_error));
    }

    candidates.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
    Ok(candidates)
}

/// A domain dominates when its candidate count exceeds ⌊n/2⌋.
pub fn dominant_domain(candidates: &[ScoredMemory]) -> Option<Domain> {
    if candidates.is_empty() {
        return None;
    }
    let mut counts: HashMap<Domain, usize> = HashMap::new();
    for candidate in candidates {
        if let Some(domain) = candidate.memory.domain {
            *counts.entry(domain).or_default() += 1;
        }
    }
    let majority = candidates.len() / 2;
    counts
        .into_iter()
        .filter(|(_, count)| *count > majority)
        .max_by_key(|(_, count)| *count)
        .map(|(domain, _)| domain)
}

/// Fallback reweight when dominance is detected but the surprise re-ranker
/// cannot run: pattern-class memories gain, fact-class memories lose.
pub fn reweight_pattern_fact(candidates: &mut [ScoredMemory]) {
    for candidate in candidates.iter_mut() {
        let factor = match candidate.memory.memory_class() {
            MemoryClass::Pattern => 1.3,
            MemoryClass::Fact => 0.85,
        };
        candidate.similarity = (candidate.similarity * factor).clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::interfaces::PoolHit;
    use crate::schema::{Durability, Memory, MemoryKind, Validation};

    fn memory(pool: Pool, domain: Option<Domain>, kind: MemoryKind) -> Memory {
        let now = Utc::now();
        Memory {
            id: Uuid::new_v4(),
            content: format!("memory in {:?}", domain),
            pool,
            kind,
            domain,
            emotion: None,
            heat: 0.4,
            intensity: 0.5,
            validation: Validation::Untested,
            durability: Durability::Contextual,
            embedding: None,
            created_at: now,
            updated_at: now,
            access_count: 0,
            last_accessed: None,
        }
    }

    struct ScriptedStore {
        user_hits: Vec<PoolHit>,
        ai_fails: bool,
    }

    #[async_trait]
    impl VectorSearch for ScriptedStore {
        async fn search(
            &self,
            _embedding: &[f32],
            params: SearchParams,
        ) -> Result<Vec<PoolHit>, StageError> {
            match params.pool {
                Pool::User => Ok(self.user_hits.clone()),
                Pool::Ai => {
                    if self.ai_fails {
                        Err(StageError::SearchFailed("scripted".to_string()))
                    } else {
                        Ok(vec![])
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn one_failing_pool_degrades_to_the_other() {
        let store = ScriptedStore {
            user_hits: vec![PoolHit {
                memory: memory(Pool::User, None, MemoryKind::Fact),
                similarity: 0.8,
            }],
            ai_fails: true,
        };
        let hits = search_pools(&store, &[0.1], 0.35, 15, None).await.expect("degraded ok");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory.pool, Pool::User);
    }

    #[tokio::test]
    async fn union_is_ordered_by_similarity_desc() {
        let store = ScriptedStore {
            user_hits: vec![
                PoolHit { memory: memory(Pool::User, None, MemoryKind::Fact), similarity: 0.5 },
                PoolHit { memory: memory(Pool::User, None, MemoryKind::Value), similarity: 0.9 },
            ],
            ai_fails: false,
        };
        let hits = search_pools(&store, &[0.1], 0.35, 15, None).await.expect("ok");
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[test]
    fn dominance_requires_strict_majority() {
        let mut candidates: Vec<ScoredMemory> = Vec::new();
        for _ in 0..3 {
            candidates.push(ScoredMemory::new(
                memory(Pool::User, Some(Domain::Work), MemoryKind::Fact),
                0.8,
            ));
        }
        for _ in 0..3 {
            candidates.push(ScoredMemory::new(
                memory(Pool::User, Some(Domain::Health), MemoryKind::Fact),
                0.8,
            ));
        }
        // 3 of 6 is not > floor(6/2).
        assert_eq!(dominant_domain(&candidates), None);

        candidates.push(ScoredMemory::new(
            memory(Pool::User, Some(Domain::Work), MemoryKind::Fact),
            0.8,
        ));
        // 4 of 7 is > floor(7/2).
        assert_eq!(dominant_domain(&candidates), Some(Domain::Work));
    }

    #[test]
    fn null_domains_never_dominate() {
        let candidates: Vec<ScoredMemory> = (0..4)
            .map(|_| ScoredMemory::new(memory(Pool::User, None, MemoryKind::Fact), 0.8))
            .collect();
        assert_eq!(dominant_domain(&candidates), None);
    }

    #[test]
    fn reweight_boosts_patterns_and_dampens_facts() {
        let mut candidates = vec![
            ScoredMemory::new(memory(Pool::Ai, Some(Domain::Work), MemoryKind::Synthesis), 0.6),
            ScoredMemory::new(memory(Pool::User, Some(Domain::Work), MemoryKind::Fact), 0.6),
        ];
        reweight_pattern_fact(&mut candidates);
        assert!((candidates[0].similarity - 0.78).abs() < 1e-6);
        assert!((candidates[1].similarity - 0.51).abs() < 1e-6);
    }
}
