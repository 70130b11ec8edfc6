//! Forge detection: classifies the creative phase of a conversation from a
//! sliding window of recent messages and emits openness/materiality scores,
//! a phase complement, and fusion lines when an affect-phase combination
//! matches a rule.
//!
//! The detector is pure except for its bounded message buffer, which only
//! resets on an explicit signal.

use std::collections::VecDeque;

use regex::RegexSet;

use crate::lexicon::lexicons;
use crate::schema::{AffectShape, ForgePhase};

/// Messages retained in the sliding window.
pub const DEFAULT_WINDOW: usize = 8;

/// Minimum recency-weighted signal before a phase is declared; below this
/// the reading is `Neutral`.
const PHASE_FLOOR: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct ForgeReading {
    pub phase: ForgePhase,
    /// How open the window is to new directions, in [0,1].
    pub openness: f32,
    /// How much concrete artifact-handling is happening, in [0,1].
    pub materiality: f32,
    pub complement: &'static str,
}

#[derive(Debug)]
pub struct ForgeDetector {
    window: usize,
    buffer: VecDeque<String>,
}

impl Default for ForgeDetector {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl ForgeDetector {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            buffer: VecDeque::new(),
        }
    }

    /// Clear the buffer.  Only called on an explicit reset signal, never
    /// implicitly.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Push `text` into the window and classify the current phase.
    pub fn observe(&mut self, text: &str) -> ForgeReading {
        if self.buffer.len() == self.window {
            self.buffer.pop_front();
        }
        self.buffer.push_back(text.to_string());
        self.classify()
    }

    fn classify(&self) -> ForgeReading {
        let lex = &lexicons().forge;
        let n = self.buffer.len().max(1) as f32;

        let mut diverging = 0.0_f32;
        let mut incubating = 0.0_f32;
        let mut converging = 0.0_f32;
        let mut refining = 0.0_f32;
        let mut questions = 0.0_f32;
        let mut artifacts = 0.0_f32;

        for (i, message) in self.buffer.iter().enumerate() {
            // Recent messages weigh more: linear ramp over the window.
            let weight = (i + 1) as f32 / n;
            diverging += weight * hits(&lex.diverging, message);
            incubating += weight * hits(&lex.incubating, message);
            converging += weight * hits(&lex.converging, message);
            refining += weight * hits(&lex.refining, message);
            artifacts += weight * hits(&lex.artifact, message);
            if message.contains('?') {
                questions += weight;
            }
        }

        let scored = [
            (ForgePhase::Diverging, diverging),
            (ForgePhase::Incubating, incubating),
            (ForgePhase::Converging, converging),
            (ForgePhase::Refining, refining),
        ];
        // max_by on the score; earlier phases win exact ties via strict >.
        let mut phase = ForgePhase::Neutral;
        let mut best = 0.0_f32;
        for (candidate, score) in scored {
            if score > best {
                phase = candidate;
                best = score;
            }
        }
        if best < PHASE_FLOOR {
            phase = ForgePhase::Neutral;
        }

        let openness = (questions * 0.25 + diverging * 0.2).clamp(0.0, 1.0);
        let materiality = (artifacts * 0.3 + refining * 0.15).clamp(0.0, 1.0);

        ForgeReading {
            phase,
            openness,
            materiality,
            complement: complement_for(phase),
        }
    }
}

fn hits(set: &RegexSet, text: &str) -> f32 {
    set.matches(text).iter().count() as f32
}

fn complement_for(phase: ForgePhase) -> &'static str {
    match phase {
        ForgePhase::Diverging => {
            "Feed the spread: offer adjacent angles, defer judgement, keep the count rising."
        }
        ForgePhase::Incubating => {
            "Don't force output; hold the thread lightly and protect the pause."
        }
        ForgePhase::Converging => {
            "Support the narrowing: surface decision criteria, resist reopening settled branches."
        }
        ForgePhase::Refining => {
            "Precision mode: small concrete improvements, no new directions."
        }
        ForgePhase::Neutral => "",
    }
}

/// Fusion rules: lines emitted when an affect-phase combination needs a
/// correction the phase complement alone doesn't carry.
pub fn fusion_lines(phase: ForgePhase, shape: AffectShape) -> Vec<&'static str> {
    let mut lines = Vec::new();
    if phase == ForgePhase::Diverging && shape.expansion < -0.15 {
        lines.push("lower stakes before pushing for volume");
    }
    if phase == ForgePhase::Converging && shape.certainty < -0.2 {
        lines.push("resolve the open question before locking scope");
    }
    if phase == ForgePhase::Refining && shape.activation > 0.5 {
        lines.push("channel the charge into one polishing pass, not five");
    }
    if phase == ForgePhase::Incubating && shape.activation < -0.3 {
        lines.push("rest is part of the work; schedule the return");
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_is_bounded_at_window_size() {
        let mut detector = ForgeDetector::new(3);
        for i in 0..10 {
            detector.observe(&format!("message {i}"));
        }
        assert_eq!(detector.buffered(), 3);
    }

    #[test]
    fn reset_clears_the_window() {
        let mut detector = ForgeDetector::default();
        detector.observe("brainstorming ideas");
        assert_eq!(detector.buffered(), 1);
        detector.reset();
        assert_eq!(detector.buffered(), 0);
    }

    #[test]
    fn divergent_language_classifies_diverging() {
        let mut detector = ForgeDetector::default();
        detector.observe("let's brainstorm some ideas, what if we tried another angle?");
        let reading = detector.observe("more options: what about a wild alternative?");
        assert_eq!(reading.phase, ForgePhase::Diverging);
        assert!(reading.openness > 0.0);
    }

    #[test]
    fn refining_language_raises_materiality() {
        let mut detector = ForgeDetector::default();
        detector.observe("doing a last pass on the draft, just needs a polish");
        let reading = detector.observe("tweaked chapter 3, the final draft is almost done");
        assert_eq!(reading.phase, ForgePhase::Refining);
        assert!(reading.materiality > 0.0);
    }

    #[test]
    fn sparse_signal_reads_neutral() {
        let mut detector = ForgeDetector::default();
        let reading = detector.observe("the meeting moved to thursday");
        assert_eq!(reading.phase, ForgePhase::Neutral);
        assert!(reading.complement.is_empty());
    }

    #[test]
    fn diverging_with_contracted_expansion_fuses_lower_stakes() {
        let shape = AffectShape { expansion: -0.4, activation: 0.0, certainty: 0.0 };
        let lines = fusion_lines(ForgePhase::Diverging, shape);
        assert_eq!(lines, vec!["lower stakes before pushing for volume"]);
    }

    #[test]
    fn neutral_phase_emits_no_fusion() {
        let shape = AffectShape { expansion: -0.9, activation: -0.9, certainty: -0.9 };
        assert!(fusion_lines(ForgePhase::Neutral, shape).is_empty());
    }
}
