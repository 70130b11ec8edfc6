//! Candidate ranking: near-duplicate collapse, composite scoring, and the
//! two-pass diverse selection that decides which memories reach the prefix.
//!
//! Composite scoring model:
//! ```text
//! score = similarity
//!       · type_relevance[goal][kind]
//!       · validation_precision[validation]
//!       · (0.5 + 0.5·intensity)
//!       · durability_factor(heat, durability)   (when heat is known)
//! ```

use std::collections::{HashMap, HashSet};

use tracing::trace;
use uuid::Uuid;

use crate::goal::Goal;
use crate::schema::{Durability, MemoryKind, Pool, ScoredMemory, Validation};

/// Characters of content that form the near-duplicate key.
const DEDUP_PREFIX_CHARS: usize = 50;

// ── Deduplication ─────────────────────────────────────────────────────────────

/// Collapse near-duplicates: candidates whose first 50 characters of content
/// are identical keep only the highest-similarity representative.  Single
/// pass; first-occurrence order is preserved; idempotent.
pub fn dedup(candidates: Vec<ScoredMemory>) -> Vec<ScoredMemory> {
    let mut kept: Vec<ScoredMemory> = Vec::with_capacity(candidates.len());
    let mut index_by_key: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        let key: String = candidate.memory.content.chars().take(DEDUP_PREFIX_CHARS).collect();
        match index_by_key.get(&key) {
            Some(&i) => {
                if candidate.similarity > kept[i].similarity {
                    kept[i] = candidate;
                }
            }
            None => {
                index_by_key.insert(key, kept.len());
                kept.push(candidate);
            }
        }
    }

    kept
}

// ── Composite scoring ─────────────────────────────────────────────────────────

/// Kind-relevance rows per goal.  Column order:
/// fact, value, reward, synthesis, partner_model, self_model.
///
/// Anchors: emotional×fact = 0.3, technical×fact = 1.0,
/// relational×partner_model = 1.0.
const TYPE_RELEVANCE: [(Goal, [f32; 6]); 7] = [
    (Goal::Emotional, [0.3, 1.0, 0.9, 0.7, 0.8, 0.9]),
    (Goal::Technical, [1.0, 0.4, 0.3, 0.8, 0.2, 0.3]),
    (Goal::Decisional, [0.8, 1.0, 0.6, 0.9, 0.5, 0.7]),
    (Goal::Creative, [0.5, 0.7, 0.8, 1.0, 0.4, 0.6]),
    (Goal::Strategic, [0.9, 0.8, 0.5, 1.0, 0.4, 0.5]),
    (Goal::Relational, [0.4, 0.8, 0.7, 0.6, 1.0, 0.8]),
    (Goal::General, [0.7, 0.7, 0.6, 0.7, 0.6, 0.6]),
];

pub fn type_relevance(goal: Goal, kind: MemoryKind) -> f32 {
    let column = match kind {
        MemoryKind::Fact => 0,
        MemoryKind::Value => 1,
        MemoryKind::Reward => 2,
        MemoryKind::Synthesis => 3,
        MemoryKind::PartnerModel => 4,
        MemoryKind::SelfModel => 5,
    };
    TYPE_RELEVANCE
        .iter()
        .find(|(g, _)| *g == goal)
        .map(|(_, row)| row[column])
        .unwrap_or(0.6)
}

pub fn validation_precision(validation: Validation) -> f32 {
    match validation {
        Validation::Validated => 1.0,
        Validation::Untested => 0.7,
        Validation::Invalidated => 0.1,
    }
}

/// Durability multiplier applied when the message heat is known: hot
/// messages privilege durable memories, cool messages privilege the
/// ephemeral and contextual.
fn durability_factor(heat: f32, durability: Durability) -> f32 {
    if heat >= 0.6 {
        match durability {
            Durability::Durable => 1.5,
            _ => 1.0,
        }
    } else if heat < 0.3 {
        match durability {
            Durability::Ephemeral | Durability::Contextual => 1.3,
            Durability::Durable => 0.7,
        }
    } else {
        1.0
    }
}

/// Compute composite scores in place.
pub fn score_all(candidates: &mut [ScoredMemory], goal: Goal, heat: Option<f32>) {
    for candidate in candidates.iter_mut() {
        let memory = &candidate.memory;
        let mut score = candidate.similarity
            * type_relevance(goal, memory.kind)
            * validation_precision(memory.validation)
            * (0.5 + 0.5 * memory.intensity.clamp(0.0, 1.0));
        if let Some(heat) = heat {
            score *= durability_factor(heat, memory.durability);
        }
        candidate.score = score;
        trace!(
            id = %memory.id,
            kind = memory.kind.slug(),
            similarity = candidate.similarity,
            score,
            "scored candidate"
        );
    }
}

// ── Diverse selection ─────────────────────────────────────────────────────────

/// Two-pass diverse pick, run per pool and unioned (user first).
///
/// Per pool: drop candidates under `min_score`, order by `(score desc, id)`,
/// pass 1 admits the first instance of each kind, pass 2 fills the remaining
/// slots by score.  Deterministic; never two entries with the same id.
pub fn select_diverse(
    candidates: Vec<ScoredMemory>,
    min_score: f32,
    user_cap: usize,
    ai_cap: usize,
) -> Vec<ScoredMemory> {
    let (user, ai): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| c.memory.pool == Pool::User);

    let mut selected = select_pool(user, min_score, user_cap);
    selected.extend(select_pool(ai, min_score, ai_cap));
    selected
}

fn select_pool(mut pool: Vec<ScoredMemory>, min_score: f32, cap: usize) -> Vec<ScoredMemory> {
    pool.retain(|c| c.score >= min_score);
    pool.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });

    let mut picked: Vec<ScoredMemory> = Vec::with_capacity(cap);
    let mut seen_ids: HashSet<Uuid> = HashSet::new();
    let mut seen_kinds: HashSet<MemoryKind> = HashSet::new();

    // Pass 1: one representative per kind, in score order.
    for candidate in &pool {
        if picked.len() == cap {
            break;
        }
        if seen_ids.contains(&candidate.memory.id) || seen_kinds.contains(&candidate.memory.kind) {
            continue;
        }
        seen_ids.insert(candidate.memory.id);
        seen_kinds.insert(candidate.memory.kind);
        picked.push(candidate.clone());
    }

    // Pass 2: fill remaining slots with the highest-scoring leftovers.
    for candidate in &pool {
        if picked.len() == cap {
            break;
        }
        if seen_ids.contains(&candidate.memory.id) {
            continue;
        }
        seen_ids.insert(candidate.memory.id);
        picked.push(candidate.clone());
    }

    picked
}
