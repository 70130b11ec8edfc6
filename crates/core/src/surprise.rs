//! Stage 2: surprise re-ranking.
//!
//! Within a single dominant domain cosine similarity stops discriminating,
//! so candidates are re-scored by how much each memory shifts the model's
//! first-token distribution: `KL(Pᵢ ‖ P₀)` between the memory-conditioned
//! and baseline distributions.  Scores are cached per
//! `(memory_id, context_hash)` and the stage fails open at every step.

use std::collections::HashMap;

use futures::future;
use tracing::{debug, warn};

use hearth_config::SurpriseConfig;

use crate::cache::{SurpriseCache, context_hash};
use crate::interfaces::{ChatApi, TokenLogprob};
use crate::schema::{Domain, ScoredMemory};

/// Floor for baseline probabilities inside the KL sum.
pub const KL_EPSILON: f64 = 1e-10;

/// Normalize top-K log-probabilities into a distribution summing to 1.
pub fn normalize_logprobs(tokens: &[TokenLogprob]) -> HashMap<String, f64> {
    let mut probs: HashMap<String, f64> = HashMap::new();
    for token in tokens {
        // Duplicate token strings fold together.
        *probs.entry(token.token.clone()).or_insert(0.0) += token.logprob.exp();
    }
    let total: f64 = probs.values().sum();
    if total > 0.0 {
        for value in probs.values_mut() {
            *value /= total;
        }
    }
    probs
}

/// `KL(P ‖ P₀) = Σ_t P(t) · log₂(P(t) / max(P₀(t), ε))` over the tokens of P.
pub fn kl_divergence(p: &HashMap<String, f64>, baseline: &HashMap<String, f64>) -> f64 {
    let mut sum = 0.0;
    for (token, &p_t) in p {
        if p_t <= 0.0 {
            continue;
        }
        let q_t = baseline.get(token).copied().unwrap_or(0.0).max(KL_EPSILON);
        sum += p_t * (p_t / q_t).log2();
    }
    sum
}

/// Append one memory to the base system prompt in a delimited block.
fn conditioned_system(base: &str, memory_text: &str) -> String {
    format!("{base}\n\n[MEMORY CONTEXT]\n{memory_text}\n[END MEMORY CONTEXT]")
}

/// Re-rank the dominant-domain candidates by surprise.
///
/// Takes the full Stage-1 working set and returns it with the dominant
/// candidates replaced by the KL top-`keep`; non-dominant candidates pass
/// through untouched.  On baseline failure the input is returned unchanged.
pub async fn rerank_dominant(
    chat: &dyn ChatApi,
    cache: &SurpriseCache,
    config: &SurpriseConfig,
    candidates: Vec<ScoredMemory>,
    dominant: Domain,
    base_system_prompt: &str,
    user_message: &str,
) -> Vec<ScoredMemory> {
    let ctx_hash = context_hash(user_message);

    let (dominant_set, rest): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| c.memory.domain == Some(dominant));

    let mut pool = dominant_set;
    pool.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
    pool.truncate(config.max_candidates);

    // Cache pass: only misses need fresh conditioned distributions, and the
    // baseline is only recomputed when at least one candidate misses.
    let mut scores: Vec<Option<f64>> = pool
        .iter()
        .map(|c| cache.get(c.memory.id, &ctx_hash))
        .collect();
    let any_miss = scores.iter().any(Option::is_none);

    if any_miss {
        let baseline = match chat
            .complete_logprobs(base_system_prompt, user_message, config.top_logprobs)
            .await
        {
            Ok(tokens) => normalize_logprobs(&tokens),
            Err(err) => {
                warn!(error = %err, "baseline logprobs failed; keeping stage-1 ordering");
                let mut unchanged = pool;
                unchanged.extend(rest);
                return unchanged;
            }
        };

        let conditioned = future::join_all(pool.iter().enumerate().filter_map(|(i, c)| {
            if scores[i].is_some() {
                return None;
            }
            let system = conditioned_system(base_system_prompt, &c.memory.content);
            Some(async move {
                (
                    i,
                    chat.complete_logprobs(&system, user_message, config.top_logprobs).await,
                )
            })
        }))
        .await;

        for (i, result) in conditioned {
            match result {
                Ok(tokens) => {
                    let kl = kl_divergence(&normalize_logprobs(&tokens), &baseline);
                    cache.put(pool[i].memory.id, ctx_hash.clone(), kl);
                    scores[i] = Some(kl);
                }
                Err(err) => {
                    // Per-candidate failure scores 0 and is not cached.
                    warn!(memory = %pool[i].memory.id, error = %err, "conditioned logprobs failed");
                    scores[i] = Some(0.0);
                }
            }
        }
    }

    for (candidate, score) in pool.iter_mut().zip(&scores) {
        candidate.surprise_score = Some(score.unwrap_or(0.0));
    }

    pool.sort_by(|a, b| {
        let ka = a.surprise_score.unwrap_or(0.0);
        let kb = b.surprise_score.unwrap_or(0.0);
        kb.total_cmp(&ka)
            .then_with(|| b.similarity.total_cmp(&a.similarity))
            .then_with(|| a.memory.id.cmp(&b.memory.id))
    });
    pool.truncate(config.keep);

    debug!(
        kept = pool.len(),
        passthrough = rest.len(),
        domain = dominant.slug(),
        "surprise re-rank complete"
    );

    pool.extend(rest);
    pool
}
