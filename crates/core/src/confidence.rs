//! Evidence-based confidence calibration.
//!
//! Scoring model over a pattern's evidence records:
//! ```text
//! base(weighted supports) + cross_domain_bonus + recency_bonus
//!   − Σ contradiction_penalty(strength, age)        (clamped at 0)
//! ```
//! with age weights recent/stale/old = 1.0/0.5/0.25, then mapped to a level
//! and post-adjusted by the decay rule and the contradiction cap.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::schema::{ConfidenceLevel, Domain, PatternEvidence, PatternId, Polarity, Strength};

/// Age bucket boundaries, in days.
const RECENT_DAYS: i64 = 30;
const STALE_DAYS: i64 = 90;
/// A pattern whose last support is at least this old decays out of HIGH.
const DECAY_DAYS: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgeBucket {
    Recent,
    Stale,
    Old,
}

fn bucket(observed_at: DateTime<Utc>, now: DateTime<Utc>) -> AgeBucket {
    let days = (now - observed_at).num_days();
    if days < RECENT_DAYS {
        AgeBucket::Recent
    } else if days <= STALE_DAYS {
        AgeBucket::Stale
    } else {
        AgeBucket::Old
    }
}

fn age_weight(bucket: AgeBucket) -> f32 {
    match bucket {
        AgeBucket::Recent => 1.0,
        AgeBucket::Stale => 0.5,
        AgeBucket::Old => 0.25,
    }
}

/// Confidence assessment for one pattern, with enough structure for the
/// composer and for debugging.
#[derive(Debug, Clone)]
pub struct ConfidenceReport {
    pub pattern_id: PatternId,
    pub score: f32,
    pub level: ConfidenceLevel,
    pub rationale: String,
    /// Distinct domains observed across supports, ordered.
    pub domains: Vec<Domain>,
    pub support_count: usize,
    pub contradiction_count: usize,
    pub recent_supports: usize,
}

/// Assess a pattern from its full evidence set (stored + newly emitted).
pub fn assess(
    pattern_id: PatternId,
    evidence: &[PatternEvidence],
    now: DateTime<Utc>,
) -> ConfidenceReport {
    let mut weighted_supports = 0.0_f32;
    let mut support_count = 0usize;
    let mut recent_supports = 0usize;
    let mut recent_strong_supports = 0usize;
    let mut last_support: Option<DateTime<Utc>> = None;
    let mut domains: BTreeMap<Domain, usize> = BTreeMap::new();

    let mut penalty = 0.0_f32;
    let mut contradiction_count = 0usize;
    let mut recent_strong_contradictions = 0usize;

    for record in evidence.iter().filter(|r| r.pattern_id == pattern_id) {
        let age = bucket(record.observed_at, now);
        match record.polarity {
            Polarity::Support => {
                support_count += 1;
                weighted_supports += age_weight(age);
                if age == AgeBucket::Recent {
                    recent_supports += 1;
                    if record.strength == Strength::Strong {
                        recent_strong_supports += 1;
                    }
                }
                if last_support.is_none_or(|t| record.observed_at > t) {
                    last_support = Some(record.observed_at);
                }
                if let Some(domain) = record.domain {
                    *domains.entry(domain).or_default() += 1;
                }
            }
            Polarity::Contradict => {
                contradiction_count += 1;
                let strength_mult = match record.strength {
                    Strength::Weak => 1.5,
                    Strength::Normal => 1.75,
                    Strength::Strong => 2.0,
                };
                let age_mult = match age {
                    AgeBucket::Recent => 1.2,
                    AgeBucket::Stale => 0.8,
                    AgeBucket::Old => 0.5,
                };
                penalty += 0.15 * strength_mult * age_mult;
                if age == AgeBucket::Recent && record.strength == Strength::Strong {
                    recent_strong_contradictions += 1;
                }
            }
        }
    }

    let base = if weighted_supports >= 4.0 {
        0.40
    } else if weighted_supports >= 3.0 {
        0.30
    } else if weighted_supports >= 2.0 {
        0.20
    } else if weighted_supports >= 1.0 {
        0.10
    } else {
        0.0
    };

    let domain_bonus = match domains.len() {
        0 | 1 => 0.0,
        2 => 0.15,
        _ => 0.25,
    };

    let recency_bonus = match recent_supports {
        0 => 0.0,
        1 => 0.075,
        _ => 0.15,
    };

    let pre_penalty = base + domain_bonus + recency_bonus;
    let score = (pre_penalty - penalty).max(0.0);

    let mut level = if score >= 0.70 {
        ConfidenceLevel::High
    } else if score >= 0.40 {
        ConfidenceLevel::Medium
    } else if score >= 0.20 {
        ConfidenceLevel::Low
    } else {
        ConfidenceLevel::Dormant
    };

    let mut notes: Vec<String> = vec![format!(
        "supports={support_count} (weighted {weighted_supports:.2}), domains={}, recent={recent_supports}",
        domains.len()
    )];
    if contradiction_count > 0 {
        notes.push(format!("contradictions={contradiction_count} (\u{2212}{penalty:.2})"));
    }

    // Decay: a pattern unsupported for a long stretch cannot stay HIGH.
    let decayed = last_support
        .is_some_and(|t| (now - t).num_days() >= DECAY_DAYS)
        && recent_supports == 0;
    if decayed && level == ConfidenceLevel::High {
        level = ConfidenceLevel::Medium;
        notes.push("decayed: no support in 120d".to_string());
    }

    // Contradiction cap: a recent strong contradiction is a level
    // mechanism, not just a score penalty.  For a pattern whose supports
    // alone earned HIGH, each such contradiction cancels two recent strong
    // supports (mirroring its 2.0 strength multiplier); when at least
    // three remain the supports win and HIGH stands, otherwise the level
    // is held at MEDIUM regardless of what the penalized score says.
    if recent_strong_contradictions > 0 && pre_penalty >= 0.70 {
        let net_strong = recent_strong_supports
            .saturating_sub(2 * recent_strong_contradictions);
        if net_strong >= 3 {
            if level < ConfidenceLevel::High {
                level = ConfidenceLevel::High;
                notes.push("contradiction outweighed by recent strong supports".to_string());
            }
        } else {
            level = ConfidenceLevel::Medium;
            notes.push(
                "contradiction cap: recent strong contradiction holds level at MEDIUM"
                    .to_string(),
            );
        }
    }

    ConfidenceReport {
        pattern_id,
        score,
        level,
        rationale: notes.join("; "),
        domains: domains.into_keys().collect(),
        support_count,
        contradiction_count,
        recent_supports,
    }
}
