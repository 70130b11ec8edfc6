//! Goal classification: a categorical label over a fixed taxonomy, used only
//! to select the per-kind relevance row during composite scoring.

use serde::{Deserialize, Serialize};

use crate::lexicon::lexicons;

/// Conversational goal taxonomy.  Declaration order is the tie-break order:
/// when two goals match the same number of patterns, the earlier one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Emotional,
    Technical,
    Decisional,
    Creative,
    Strategic,
    Relational,
    General,
}

impl Goal {
    pub fn slug(self) -> &'static str {
        match self {
            Goal::Emotional => "emotional",
            Goal::Technical => "technical",
            Goal::Decisional => "decisional",
            Goal::Creative => "creative",
            Goal::Strategic => "strategic",
            Goal::Relational => "relational",
            Goal::General => "general",
        }
    }
}

/// Classify a message into a goal by counting lexicon hits per taxonomy.
/// Highest count wins; ties break toward declaration order; `General` when
/// nothing matches.
pub fn classify(text: &str) -> Goal {
    let mut best = Goal::General;
    let mut best_count = 0usize;

    for (goal, patterns) in &lexicons().goals {
        let count = patterns.matches(text).iter().count();
        // Strict > keeps the earliest goal on ties.
        if count > best_count {
            best = *goal;
            best_count = count;
        }
    }

    best
}
