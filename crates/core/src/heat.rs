//! Heat estimation: a scalar in [0,1] expressing the emotional stakes of a
//! message, used to pick the temporal retrieval window.
//!
//! Two paths produce the same scalar: a closed-form formula over an affect
//! shape, and a banded lexicon classification over raw text.  Both are
//! deterministic for a given input.

use crate::lexicon::lexicons;
use crate::schema::AffectShape;

/// A classification band: the base value assigned on match and the ceiling
/// boosters may not push past.
#[derive(Debug, Clone, Copy)]
struct Band {
    base: f32,
    ceiling: f32,
}

const COLD_GREETING: Band = Band { base: 0.05, ceiling: 0.09 };
const COLD_FACTUAL: Band = Band { base: 0.08, ceiling: 0.09 };
const HOT: Band = Band { base: 0.85, ceiling: 1.0 };
const WARM: Band = Band { base: 0.50, ceiling: 0.59 };
const COOL: Band = Band { base: 0.25, ceiling: 0.34 };
const DEFAULT: Band = Band { base: 0.20, ceiling: 0.29 };

/// Length above which otherwise-neutral text counts as substantive.
const SUBSTANTIVE_CHARS: usize = 60;

/// Maximum total boost from intensifiers, punctuation, and capitalization.
const BOOST_CAP: f32 = 0.10;

/// Heat from an already-detected affect shape.
///
/// `heat = clamp(|activation| + 0.4·max(0,−expansion) + 0.2·max(0,−certainty), 0, 1)`
pub fn heat_from_affect(shape: AffectShape) -> f32 {
    let shape = shape.clamped();
    let raw = shape.activation.abs()
        + 0.4 * (-shape.expansion).max(0.0)
        + 0.2 * (-shape.certainty).max(0.0);
    round2(raw.clamp(0.0, 1.0))
}

/// Heat from raw message text.  First matching band wins; boosters add a
/// bounded increment that never escapes the band.
pub fn heat_from_text(text: &str) -> f32 {
    let lex = &lexicons().heat;
    let trimmed = text.trim();

    let band = if lex.greeting.is_match(trimmed) {
        COLD_GREETING
    } else if lex.factual.is_match(trimmed) {
        COLD_FACTUAL
    } else if lex.hot.is_match(trimmed) {
        HOT
    } else if lex.warm.is_match(trimmed) {
        WARM
    } else if trimmed.chars().count() > SUBSTANTIVE_CHARS {
        COOL
    } else {
        DEFAULT
    };

    let boosted = (band.base + booster(trimmed)).min(band.ceiling);
    round2(boosted.clamp(0.0, 1.0))
}

/// Bounded intensity boost: intensifier words, repeated terminal
/// punctuation, and all-caps words each add a small increment.
fn booster(text: &str) -> f32 {
    let lex = &lexicons().heat;

    let intensifiers = lex.intensifier.find_iter(text).count() as f32 * 0.03;
    let punct_runs = lex.punct_run.find_iter(text).count() as f32 * 0.04;

    let mut caps = 0.0_f32;
    for word in text.split_whitespace() {
        let alpha: String = word.chars().filter(|c| c.is_alphabetic()).collect();
        if alpha.len() >= 4 && alpha == alpha.to_uppercase() {
            caps += 0.04;
        }
    }

    (intensifiers + punct_runs + caps).min(BOOST_CAP)
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
