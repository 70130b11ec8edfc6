//! Stage 3: affect-driven reframing.
//!
//! When the user's state is contracted, flat, or uncertain, the selected
//! memory texts are rewritten to land well in that state: framing shifts
//! only, never facts.  One batched call covers all selected memories; any
//! failure falls back to the originals.  The stage never reorders or drops
//! memories.

use tracing::warn;

use crate::interfaces::ChatApi;
use crate::schema::{AffectShape, ScoredMemory};

/// Reframing fires when any axis crosses its floor.
pub fn should_reframe(shape: AffectShape) -> bool {
    shape.expansion < -0.3 || shape.activation < 0.3 || shape.certainty < 0.3
}

const REWRITE_RULES: &str = "You rewrite memory snippets so they land well in the user's current \
emotional state.\n\
Rules:\n\
1. Preserve every fact exactly; add nothing, speculate about nothing.\n\
2. Shift framing, not meaning. One to two sentences per memory.\n\
3. If a memory does not benefit from reframing in this state, return it unchanged.\n\
Answer with one numbered line per memory, in the same order, nothing else.";

/// Rewrite the selected memory texts in place.  `complement` is the current
/// affect complement, handed to the rewriter as state context.
pub async fn reframe(chat: &dyn ChatApi, selected: &mut [ScoredMemory], complement: &str) {
    if selected.is_empty() {
        return;
    }

    let listing = selected
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {}", i + 1, c.memory.content))
        .collect::<Vec<_>>()
        .join("\n");
    let user = format!("Current state guidance: {complement}\n\nMemories:\n{listing}");

    let response = match chat.complete(REWRITE_RULES, &user, 0.4, 1024).await {
        Ok(text) => text,
        Err(err) => {
            warn!(error = %err, "reframe call failed; keeping original texts");
            return;
        }
    };

    match parse_numbered(&response, selected.len()) {
        Some(rewrites) => {
            for (candidate, rewrite) in selected.iter_mut().zip(rewrites) {
                if rewrite != candidate.memory.content {
                    candidate.reframed = Some(rewrite);
                }
            }
        }
        None => {
            warn!("reframe response misaligned; keeping original texts");
        }
    }
}

/// Parse `expected` numbered lines (`1. …` or `1) …`).  Returns `None`
/// unless every index is present exactly once; misalignment means the
/// rewrite cannot be trusted.
fn parse_numbered(response: &str, expected: usize) -> Option<Vec<String>> {
    let mut rewrites: Vec<Option<String>> = vec![None; expected];
    for line in response.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (index_part, text) = line.split_once(['.', ')'])?;
        let index: usize = index_part.trim().parse().ok()?;
        if index == 0 || index > expected {
            return None;
        }
        let slot = &mut rewrites[index - 1];
        if slot.is_some() {
            return None;
        }
        *slot = Some(text.trim().to_string());
    }
    rewrites.into_iter().collect()
}
