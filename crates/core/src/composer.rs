//! Prefix composition.
//!
//! The prefix is a list of typed sections rendered in a fixed order; the
//! order is a contract, because later layers carry higher attention weight
//! on the model's next message.  Section labels are likewise contractual:
//! downstream consumers strip them by name.  Absent sections are omitted
//! entirely, never rendered as empty delimiter pairs.

use crate::affect::AffectReading;
use crate::forge::ForgeReading;
use crate::schema::{ConfidenceLevel, IdentitySpec, Pool, ScoredMemory, Trajectory};
use crate::scout::ScoutFinding;

/// A typed prefix section.  Rendering a section that has nothing to say
/// yields `None` and the section disappears from the prefix.
pub enum Section<'a> {
    Identity(&'a IdentitySpec),
    CompositionRules,
    AffectComplement(&'a AffectReading),
    ForgeComplement {
        reading: &'a ForgeReading,
        fusion: &'a [&'static str],
    },
    Memories(&'a [ScoredMemory]),
    Patterns {
        findings: &'a [ScoutFinding],
        debug: bool,
    },
    Trajectory(&'a Trajectory),
    MemoryProtocol,
}

const COMPOSITION_RULES: &str = "Layers below run from stable to immediate; later layers bind \
tighter to the next message.\n\
- The operating specification is ground truth for voice and constraints.\n\
- Complements adjust delivery to the user's current state; do not mention them.\n\
- Retrieved memories are background fact, not conversation topics.\n\
- Behavioral patterns are hypotheses with confidence levels; surface an intervention only \
when it serves the user's request.\n\
- The trajectory frames direction; never read it back verbatim.";

const MEMORY_PROTOCOL: &str = "When the user states a new durable fact, preference, value, or \
correction about themselves, restate it in one plain sentence on its own line prefixed with \
`remember:` so the host can store it. At most two such lines per reply; omit when nothing \
qualifies.";

impl Section<'_> {
    pub fn render(&self) -> Option<String> {
        match self {
            Section::Identity(spec) => render_identity(spec),
            Section::CompositionRules => Some(format!(
                "[COMPOSITION RULES]\n{COMPOSITION_RULES}\n[END COMPOSITION RULES]"
            )),
            Section::AffectComplement(reading) => Some(format!(
                "[AFFECT COMPLEMENT]\nstate: {}\n{}\n[END AFFECT COMPLEMENT]",
                reading.label, reading.complement
            )),
            Section::ForgeComplement { reading, fusion } => {
                if reading.complement.is_empty() {
                    return None;
                }
                let mut body = format!(
                    "phase: {} (openness {:.2}, materiality {:.2})\n{}",
                    reading.phase.label(),
                    reading.openness,
                    reading.materiality,
                    reading.complement
                );
                for line in *fusion {
                    body.push_str("\nfusion: ");
                    body.push_str(line);
                }
                Some(format!("[FORGE COMPLEMENT]\n{body}\n[END FORGE COMPLEMENT]"))
            }
            Section::Memories(selected) => render_memories(selected),
            Section::Patterns { findings, debug } => render_patterns(findings, *debug),
            Section::Trajectory(trajectory) => render_trajectory(trajectory),
            Section::MemoryProtocol => Some(format!(
                "[MEMORY PROTOCOL]\n{MEMORY_PROTOCOL}\n[END MEMORY PROTOCOL]"
            )),
        }
    }
}

/// Render sections in order, dropping the empty ones.  `None` when nothing
/// rendered at all.
pub fn compose(sections: &[Section<'_>]) -> Option<String> {
    let rendered: Vec<String> = sections.iter().filter_map(Section::render).collect();
    if rendered.is_empty() {
        None
    } else {
        Some(rendered.join("\n\n"))
    }
}

fn render_identity(spec: &IdentitySpec) -> Option<String> {
    if spec.is_empty() {
        return None;
    }
    let mut body = String::new();
    let mut push = |title: &str, text: &str| {
        if !text.is_empty() {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(&format!("## {title}\n{text}"));
        }
    };
    push("Identity", &spec.identity);
    push("Cognitive architecture", &spec.cognitive_architecture);
    push("Communication", &spec.communication);
    push("Execution", &spec.execution);
    if !spec.constraints.is_empty() {
        let list = spec
            .constraints
            .iter()
            .map(|c| format!("- {c}"))
            .collect::<Vec<_>>()
            .join("\n");
        push("Constraints", &list);
    }
    push("Balance protocol", &spec.balance_protocol);
    push("Appendix", &spec.appendix);

    Some(format!(
        "[HEARTH OPERATING SPECIFICATION]\n{body}\n[END OPERATING SPECIFICATION]"
    ))
}

fn render_memories(selected: &[ScoredMemory]) -> Option<String> {
    if selected.is_empty() {
        return None;
    }

    let mut body = String::new();
    for (pool, header) in [(Pool::User, "## User memories"), (Pool::Ai, "## Assistant memories")] {
        let items: Vec<String> = selected
            .iter()
            .filter(|c| c.memory.pool == pool)
            .map(render_memory_item)
            .collect();
        if items.is_empty() {
            continue;
        }
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(header);
        body.push('\n');
        body.push_str(&items.join("\n"));
    }

    if body.is_empty() {
        None
    } else {
        Some(format!("[RETRIEVED MEMORIES]\n{body}\n[END RETRIEVED MEMORIES]"))
    }
}

fn render_memory_item(candidate: &ScoredMemory) -> String {
    let memory = &candidate.memory;
    let mut tags = vec![memory.kind.slug().to_string()];
    if let Some(domain) = memory.domain {
        tags.push(domain.slug().to_string());
    }
    tags.push(format!("heat {:.2}", memory.heat));
    tags.push(format!("sim {:.2}", candidate.similarity));
    if let Some(kl) = candidate.surprise_score {
        tags.push(format!("surprise {kl:.2}"));
    }
    format!("- ({}) {}", tags.join(", "), candidate.display_text())
}

fn render_patterns(findings: &[ScoutFinding], debug: bool) -> Option<String> {
    // Dormant never reaches the prefix, even if a caller hands one over.
    let visible: Vec<&ScoutFinding> = findings
        .iter()
        .filter(|f| f.report.level != ConfidenceLevel::Dormant)
        .collect();
    if visible.is_empty() {
        return None;
    }

    let mut body = String::new();
    for finding in visible {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(&format!(
            "[{}] {}\n",
            finding.report.level.label(),
            finding.report.pattern_id.verb()
        ));
        if !finding.report.domains.is_empty() {
            let domains: Vec<&str> =
                finding.report.domains.iter().map(|d| d.slug()).collect();
            body.push_str(&format!("  domains: {}\n", domains.join(", ")));
        }
        body.push_str(&format!(
            "  evidence: {} supporting, {} contradicting\n",
            finding.report.support_count, finding.report.contradiction_count
        ));
        body.push_str(&format!("  intervention: {}", finding.intervention));
        if debug {
            body.push_str(&format!(
                "\n  debug: score {:.2}; {}",
                finding.report.score, finding.report.rationale
            ));
        }
    }

    Some(format!("[BEHAVIORAL PATTERNS]\n{body}\n[END BEHAVIORAL PATTERNS]"))
}

fn render_trajectory(trajectory: &Trajectory) -> Option<String> {
    if !trajectory.is_active || trajectory.compressed_text.is_empty() {
        return None;
    }
    let mut body = trajectory.compressed_text.clone();
    if !trajectory.arcs.is_empty() {
        body.push_str(&format!("\narcs: {}", trajectory.arcs.join("; ")));
    }
    if !trajectory.tensions.is_empty() {
        body.push_str(&format!("\ntensions: {}", trajectory.tensions.join("; ")));
    }
    if let Some(drift) = &trajectory.drift {
        body.push_str(&format!("\ndrift: {drift}"));
    }
    Some(format!("[TRAJECTORY]\n{body}\n[END TRAJECTORY]"))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::affect::detect;
    use crate::confidence::ConfidenceReport;
    use crate::schema::{
        Domain, Durability, Memory, MemoryKind, PatternId, Validation,
    };

    fn identity() -> IdentitySpec {
        IdentitySpec {
            identity: "A grounded, direct companion.".to_string(),
            communication: "Plain speech, no filler.".to_string(),
            constraints: vec!["Never invent user facts.".to_string()],
            ..Default::default()
        }
    }

    fn scored(content: &str, pool: Pool) -> ScoredMemory {
        let now = Utc::now();
        ScoredMemory::new(
            Memory {
                id: Uuid::new_v4(),
                content: content.to_string(),
                pool,
                kind: MemoryKind::Fact,
                domain: Some(Domain::Work),
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
            },
            0.82,
        )
    }

    fn finding(level: ConfidenceLevel) -> ScoutFinding {
        ScoutFinding {
            report: ConfidenceReport {
                pattern_id: PatternId::DecisionSpiral,
                score: 0.5,
                level,
                rationale: "supports=3".to_string(),
                domains: vec![Domain::Work],
                support_count: 3,
                contradiction_count: 0,
                recent_supports: 2,
            },
            intervention: "Name the smallest reversible version of the choice.",
            query_relevant: true,
            instances: 2,
        }
    }

    #[test]
    fn sections_render_in_given_order_with_delimiters() {
        let spec = identity();
        let reading = detect("I'm not sure what to do, maybe nothing");
        let text = compose(&[
            Section::Identity(&spec),
            Section::CompositionRules,
            Section::AffectComplement(&reading),
            Section::MemoryProtocol,
        ])
        .expect("non-empty prefix");

        let spec_at = text.find("[HEARTH OPERATING SPECIFICATION]").expect("identity block");
        let rules_at = text.find("[COMPOSITION RULES]").expect("rules block");
        let affect_at = text.find("[AFFECT COMPLEMENT]").expect("affect block");
        let protocol_at = text.find("[MEMORY PROTOCOL]").expect("protocol block");
        assert!(spec_at < rules_at && rules_at < affect_at && affect_at < protocol_at);
        assert!(text.contains("[END OPERATING SPECIFICATION]"));
        assert!(text.contains("[END MEMORY PROTOCOL]"));
    }

    #[test]
    fn empty_sections_leave_no_delimiters() {
        let spec = identity();
        let empty_findings: Vec<ScoutFinding> = Vec::new();
        let text = compose(&[
            Section::Identity(&spec),
            Section::Memories(&[]),
            Section::Patterns { findings: &empty_findings, debug: false },
        ])
        .expect("identity still renders");

        assert!(!text.contains("[RETRIEVED MEMORIES]"));
        assert!(!text.contains("[BEHAVIORAL PATTERNS]"));
    }

    #[test]
    fn memories_render_user_pool_before_ai_pool() {
        let selected = vec![
            scored("assistant reflection", Pool::Ai),
            scored("user fact", Pool::User),
        ];
        let text = compose(&[Section::Memories(&selected)]).expect("memories");
        let user_at = text.find("## User memories").expect("user header");
        let ai_at = text.find("## Assistant memories").expect("ai header");
        assert!(user_at < ai_at);
        assert!(text.contains("sim 0.82"));
    }

    #[test]
    fn reframed_text_replaces_original_in_items() {
        let mut candidate = scored("the original phrasing", Pool::User);
        candidate.reframed = Some("the gentler phrasing".to_string());
        let text = compose(&[Section::Memories(&[candidate])]).expect("memories");
        assert!(text.contains("the gentler phrasing"));
        assert!(!text.contains("the original phrasing"));
    }

    #[test]
    fn surprise_score_is_tagged_when_present() {
        let mut candidate = scored("work memory", Pool::User);
        candidate.surprise_score = Some(1.25);
        let text = compose(&[Section::Memories(&[candidate])]).expect("memories");
        assert!(text.contains("surprise 1.25"));
    }

    #[test]
    fn dormant_findings_are_filtered_even_if_passed_in() {
        let findings = vec![finding(ConfidenceLevel::Dormant)];
        assert!(compose(&[Section::Patterns { findings: &findings, debug: false }]).is_none());
    }

    #[test]
    fn pattern_lines_carry_level_and_verb() {
        let findings = vec![finding(ConfidenceLevel::High)];
        let text = compose(&[Section::Patterns { findings: &findings, debug: true }])
            .expect("patterns");
        assert!(text.contains("[HIGH] decision_spiral"));
        assert!(text.contains("domains: work"));
        assert!(text.contains("intervention:"));
        assert!(text.contains("debug: score 0.50"));
    }

    #[test]
    fn inactive_trajectory_is_omitted() {
        let trajectory = Trajectory {
            compressed_text: "moving toward independence".to_string(),
            arcs: vec![],
            tensions: vec![],
            drift: None,
            memory_count: 10,
            generated_at: Utc::now(),
            is_active: false,
        };
        assert!(compose(&[Section::Trajectory(&trajectory)]).is_none());
    }

    #[test]
    fn compose_of_nothing_is_none() {
        let empty = IdentitySpec::default();
        assert!(compose(&[Section::Identity(&empty)]).is_none());
        assert!(compose(&[]).is_none());
    }
}
