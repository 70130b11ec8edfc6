//! Affect detection: a three-axis shape `{expansion, activation, certainty}`
//! plus a prescriptive complement: what the assistant should supply to
//! balance the user's current state, not a description of it.

use crate::lexicon::{AxisLexicon, lexicons};
use crate::schema::AffectShape;

/// Detector output: the shape, a short state label, and the complement text
/// injected into the prefix.
#[derive(Debug, Clone)]
pub struct AffectReading {
    pub shape: AffectShape,
    pub label: &'static str,
    pub complement: &'static str,
}

/// Per-pattern contribution to an axis score.
const AXIS_STEP: f32 = 0.35;

/// Detect the affect shape of a single message.  Pure function of the text.
pub fn detect(text: &str) -> AffectReading {
    let lex = &lexicons().affect;

    let expansion = axis_score(&lex.expansion, text);
    let mut activation = axis_score(&lex.activation, text);
    let certainty = axis_score(&lex.certainty, text);

    // Exclamation runs and shouting read as charge even without lexicon hits.
    let exclamations = text.chars().filter(|&c| c == '!').count() as f32;
    activation += (exclamations * 0.15).min(0.30);

    let shape = AffectShape {
        expansion,
        activation,
        certainty,
    }
    .clamped();

    let (label, complement) = complement_for(shape);
    AffectReading { shape, label, complement }
}

fn axis_score(axis: &AxisLexicon, text: &str) -> f32 {
    let positive = axis.positive.matches(text).iter().count() as f32;
    let negative = axis.negative.matches(text).iter().count() as f32;
    ((positive - negative) * AXIS_STEP).clamp(-1.0, 1.0)
}

/// Map a shape to its state label and prescriptive complement.
/// First matching rule wins; the table is ordered from most to least acute.
pub fn complement_for(shape: AffectShape) -> (&'static str, &'static str) {
    if shape.expansion < -0.3 && shape.activation < -0.1 {
        (
            "frozen",
            "Start with one small concrete move; volume can wait until the ground feels solid.",
        )
    } else if shape.expansion < -0.3 {
        (
            "braced",
            "Slow the pace and widen one option at a time; pressure narrows faster than it solves.",
        )
    } else if shape.activation > 0.4 && shape.certainty < 0.0 {
        (
            "scattered",
            "Channel the charge: pick a single thread and ride it to a checkpoint before switching.",
        )
    } else if shape.activation > 0.4 {
        (
            "charged",
            "Good fuel; aim it at the hardest concrete step while the energy holds.",
        )
    } else if shape.certainty < -0.3 {
        (
            "adrift",
            "Name what is actually known before weighing what isn't.",
        )
    } else if shape.activation < -0.4 {
        (
            "flat",
            "Keep scope small and finish one touchable thing; momentum returns through the hands.",
        )
    } else if shape.expansion > 0.3 {
        (
            "open",
            "Room to explore; capture the options before narrowing.",
        )
    } else {
        (
            "steady",
            "Proceed as planned; nothing in the current state needs compensating.",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axes_stay_in_range_and_are_deterministic() {
        let samples = [
            "",
            "I feel stuck, trapped, overwhelmed, no way out, drowning",
            "energized and buzzing, let's go right now!!!",
            "definitely sure, clear, I know, confident, decided",
        ];
        for text in samples {
            let a = detect(text);
            let b = detect(text);
            assert_eq!(a.shape, b.shape, "detection must be deterministic for {text:?}");
            for axis in [a.shape.expansion, a.shape.activation, a.shape.certainty] {
                assert!((-1.0..=1.0).contains(&axis), "axis {axis} out of range");
            }
        }
    }

    #[test]
    fn contracted_language_drives_expansion_negative() {
        let reading = detect("I feel stuck and trapped, there's no way out");
        assert!(reading.shape.expansion < 0.0, "got {:?}", reading.shape);
    }

    #[test]
    fn drained_language_drives_activation_negative() {
        let reading = detect("so tired and drained, everything feels flat and heavy");
        assert!(reading.shape.activation < 0.0, "got {:?}", reading.shape);
    }

    #[test]
    fn frozen_state_gets_small_steps_complement() {
        let (label, complement) =
            complement_for(AffectShape { expansion: -0.5, activation: -0.4, certainty: -0.1 });
        assert_eq!(label, "frozen");
        assert!(complement.contains("small concrete move"));
    }

    #[test]
    fn neutral_shape_reads_steady() {
        let (label, _) =
            complement_for(AffectShape { expansion: 0.0, activation: 0.0, certainty: 0.0 });
        assert_eq!(label, "steady");
    }

    #[test]
    fn exclamations_add_bounded_activation() {
        let calm = detect("we shipped the release");
        let loud = detect("we shipped the release!!!");
        assert!(loud.shape.activation > calm.shape.activation);
        assert!(loud.shape.activation <= calm.shape.activation + 0.30 + f32::EPSILON);
    }
}
