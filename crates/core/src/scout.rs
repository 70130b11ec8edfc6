//! Scout analysis: detects behavioral-verb patterns in the selected
//! memories, writes support/contradiction evidence, and surfaces the
//! top patterns by calibrated confidence.
//!
//! The scout only ever sees the selected memories (never the full corpus)
//! and the current user message, so its fan-out is bounded by the selector
//! caps.

use std::collections::BTreeMap;

use tracing::warn;

use crate::confidence::{ConfidenceReport, assess};
use crate::interfaces::{Clock, EvidenceStore};
use crate::lexicon::lexicons;
use crate::schema::{
    ConfidenceLevel, Domain, PatternEvidence, PatternId, Polarity, ScoredMemory, Strength,
};

/// Patterns surfaced into the prefix, at most.
const SURFACE_CAP: usize = 3;

/// One surfaced pattern with everything the composer needs.
#[derive(Debug, Clone)]
pub struct ScoutFinding {
    pub report: ConfidenceReport,
    pub intervention: &'static str,
    pub query_relevant: bool,
    /// Selected memories that matched this pattern in this run.
    pub instances: usize,
}

/// Scout output: what to surface, plus the evidence written this run.
#[derive(Debug, Clone, Default)]
pub struct ScoutOutcome {
    pub surfaced: Vec<ScoutFinding>,
    pub evidence_written: usize,
}

fn strength_from_count(count: usize) -> Strength {
    match count {
        0 | 1 => Strength::Weak,
        2 => Strength::Normal,
        _ => Strength::Strong,
    }
}

/// Most-common domain among instances; ties break toward the smaller
/// domain in declaration order for determinism.
fn dominant_instance_domain(domains: &BTreeMap<Domain, usize>) -> Option<Domain> {
    domains
        .iter()
        .max_by(|(da, ca), (db, cb)| ca.cmp(cb).then_with(|| db.cmp(da)))
        .map(|(domain, _)| *domain)
}

/// Run the scout over the selected memories and the current message.
///
/// Evidence is appended as a side-effect; store failures degrade to
/// in-run-only evidence and never abort the analysis.
pub async fn analyze(
    store: &dyn EvidenceStore,
    clock: &dyn Clock,
    selected: &[ScoredMemory],
    user_message: &str,
) -> ScoutOutcome {
    let now = clock.now();
    let mut new_evidence: Vec<PatternEvidence> = Vec::new();
    // (pattern, instances, query_relevant, intervention) per fired pattern.
    let mut fired: Vec<(PatternId, usize, bool, &'static str)> = Vec::new();

    for spec in &lexicons().scout {
        let mut instances = 0usize;
        let mut domains: BTreeMap<Domain, usize> = BTreeMap::new();
        for candidate in selected {
            if spec.matchers.is_match(&candidate.memory.content) {
                instances += 1;
                if let Some(domain) = candidate.memory.domain {
                    *domains.entry(domain).or_default() += 1;
                }
            }
        }

        if instances > 0 {
            new_evidence.push(PatternEvidence::new(
                spec.id,
                dominant_instance_domain(&domains),
                now,
                Polarity::Support,
                strength_from_count(instances),
                user_message,
            ));
        }

        let contradiction_hits = spec.contradiction_bridges.matches(user_message).iter().count();
        if contradiction_hits > 0 {
            new_evidence.push(PatternEvidence::new(
                spec.id,
                None,
                now,
                Polarity::Contradict,
                strength_from_count(contradiction_hits),
                user_message,
            ));
        }

        if instances > 0 || contradiction_hits > 0 {
            let query_relevant = spec.query_bridges.is_match(user_message);
            fired.push((spec.id, instances, query_relevant, spec.intervention));
        }
    }

    // Persist before assessing so confidence sees existing + new uniformly.
    let evidence_written = new_evidence.len();
    if !new_evidence.is_empty() {
        if let Err(err) = store.append_batch(new_evidence.clone()).await {
            warn!(error = %err, "evidence append failed; assessing from in-run records only");
        } else if let Err(err) = store.prune().await {
            warn!(error = %err, "evidence prune failed");
        }
    }

    let mut findings: Vec<ScoutFinding> = Vec::new();
    for (pattern_id, instances, query_relevant, intervention) in fired {
        let mut evidence = match store.load(pattern_id).await {
            Ok(records) => records,
            Err(err) => {
                warn!(pattern = pattern_id.verb(), error = %err, "evidence load failed");
                Vec::new()
            }
        };
        // A failed append must not erase this run's observations.
        for record in new_evidence.iter().filter(|r| r.pattern_id == pattern_id) {
            if !evidence.iter().any(|e| e.id == record.id) {
                evidence.push(record.clone());
            }
        }

        findings.push(ScoutFinding {
            report: assess(pattern_id, &evidence, now),
            intervention,
            query_relevant,
            instances,
        });
    }

    // Dormant patterns never surface; LOW needs at least two instances;
    // patterns must be query-relevant unless nothing else qualifies.
    findings.retain(|f| f.report.level != ConfidenceLevel::Dormant);
    findings.retain(|f| f.report.level != ConfidenceLevel::Low || f.instances >= 2);

    findings.sort_by(|a, b| {
        b.report
            .score
            .total_cmp(&a.report.score)
            .then_with(|| a.report.pattern_id.cmp(&b.report.pattern_id))
    });
    if findings.iter().any(|f| f.query_relevant) {
        findings.retain(|f| f.query_relevant);
    } else {
        // Nothing bridges to the current message: surface only the
        // strongest pattern rather than a wall of background reads.
        findings.truncate(1);
    }
    findings.truncate(SURFACE_CAP);

    ScoutOutcome { surfaced: findings, evidence_written }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use parking_lot::Mutex;
    use uuid::Uuid;

    use super::*;
    use crate::error::StageError;
    use crate::interfaces::FixedClock;
    use crate::schema::{Durability, Memory, MemoryKind, Pool, Validation};

    fn fixed_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).single().expect("valid timestamp")
    }

    fn selected(content: &str, domain: Option<Domain>) -> ScoredMemory {
        let now = fixed_now();
        ScoredMemory::new(
            Memory {
                id: Uuid::new_v4(),
                content: content.to_string(),
                pool: Pool::Ai,
                kind: MemoryKind::Synthesis,
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
            },
            0.8,
        )
    }

    #[derive(Default)]
    struct MapStore {
        records: Mutex<HashMap<PatternId, Vec<PatternEvidence>>>,
        fail_append: bool,
    }

    #[async_trait]
    impl EvidenceStore for MapStore {
        async fn load(&self, pattern_id: PatternId) -> Result<Vec<PatternEvidence>, StageError> {
            Ok(self.records.lock().get(&pattern_id).cloned().unwrap_or_default())
        }

        async fn append(&self, record: PatternEvidence) -> Result<(), StageError> {
            self.append_batch(vec![record]).await
        }

        async fn append_batch(&self, records: Vec<PatternEvidence>) -> Result<(), StageError> {
            if self.fail_append {
                return Err(StageError::StoreUnavailable("scripted".to_string()));
            }
            let mut map = self.records.lock();
            for record in records {
                map.entry(record.pattern_id).or_default().push(record);
            }
            Ok(())
        }

        async fn prune(&self) -> Result<usize, StageError> {
            Ok(0)
        }
    }

    fn spiral_memory() -> ScoredMemory {
        selected(
            "keeps going back and forth on the job decision every week",
            Some(Domain::Work),
        )
    }

    #[tokio::test]
    async fn matched_pattern_emits_support_evidence() {
        let store = MapStore::default();
        let clock = FixedClock(fixed_now());
        let outcome = analyze(
            &store,
            &clock,
            &[spiral_memory()],
            "should I take the offer or not?",
        )
        .await;

        assert_eq!(outcome.evidence_written, 1);
        let stored = store.records.lock();
        let records = stored.get(&PatternId::DecisionSpiral).expect("evidence stored");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].polarity, Polarity::Support);
        assert_eq!(records[0].strength, Strength::Weak);
        assert_eq!(records[0].domain, Some(Domain::Work));
    }

    #[tokio::test]
    async fn instance_count_drives_support_strength() {
        let store = MapStore::default();
        let clock = FixedClock(fixed_now());
        let memories = vec![
            spiral_memory(),
            selected("still hasn't decided about the move", Some(Domain::Work)),
            selected("circling on the same decision again", Some(Domain::Growth)),
        ];
        let _ = analyze(&store, &clock, &memories, "can't decide what to do").await;

        let stored = store.records.lock();
        let records = stored.get(&PatternId::DecisionSpiral).expect("evidence stored");
        assert_eq!(records[0].strength, Strength::Strong, "3 instances read strong");
        assert_eq!(records[0].domain, Some(Domain::Work), "most common instance domain");
    }

    #[tokio::test]
    async fn contradiction_bridge_emits_contradict_evidence() {
        let store = MapStore::default();
        let clock = FixedClock(fixed_now());
        let _ = analyze(
            &store,
            &clock,
            &[spiral_memory()],
            "actually, I finally decided: I'm taking the offer",
        )
        .await;

        let stored = store.records.lock();
        let records = stored.get(&PatternId::DecisionSpiral).expect("evidence stored");
        assert!(records.iter().any(|r| r.polarity == Polarity::Contradict));
    }

    #[tokio::test]
    async fn dormant_patterns_never_surface() {
        let store = MapStore::default();
        let clock = FixedClock(fixed_now());
        // Single weak observation: score 0.10 + recency 0.075 = 0.175 → DORMANT.
        let outcome = analyze(
            &store,
            &clock,
            &[spiral_memory()],
            "should I take the offer?",
        )
        .await;
        assert!(
            outcome.surfaced.iter().all(|f| f.report.level != ConfidenceLevel::Dormant),
            "dormant finding surfaced"
        );
    }

    #[tokio::test]
    async fn established_pattern_surfaces_with_history() {
        let store = MapStore::default();
        {
            let mut map = store.records.lock();
            let history: Vec<PatternEvidence> = (0..4)
                .map(|i| {
                    PatternEvidence::new(
                        PatternId::DecisionSpiral,
                        Some(if i % 2 == 0 { Domain::Work } else { Domain::Health }),
                        fixed_now() - Duration::days(i + 2),
                        Polarity::Support,
                        Strength::Strong,
                        "earlier session",
                    )
                })
                .collect();
            map.insert(PatternId::DecisionSpiral, history);
        }

        let clock = FixedClock(fixed_now());
        let outcome = analyze(
            &store,
            &clock,
            &[spiral_memory()],
            "should I take the offer?",
        )
        .await;

        assert_eq!(outcome.surfaced.len(), 1);
        let finding = &outcome.surfaced[0];
        assert_eq!(finding.report.pattern_id, PatternId::DecisionSpiral);
        assert!(finding.report.level >= ConfidenceLevel::Medium);
        assert!(finding.query_relevant);
        assert!(!finding.intervention.is_empty());
    }

    #[tokio::test]
    async fn append_failure_still_assesses_in_run_evidence() {
        let store = MapStore { fail_append: true, ..Default::default() };
        let clock = FixedClock(fixed_now());
        let memories = vec![
            spiral_memory(),
            selected("still hasn't decided about the move", Some(Domain::Work)),
            selected("circling on the same decision again", Some(Domain::Growth)),
        ];
        // Analysis proceeds without panicking and sees the in-run records.
        let outcome = analyze(&store, &clock, &memories, "can't decide").await;
        assert!(store.records.lock().is_empty(), "nothing persisted");
        // One strong in-run support: 0.10 + 0.075 = 0.175 → DORMANT, nothing
        // surfaced, but the analysis itself completed.
        assert!(outcome.surfaced.len() <= SURFACE_CAP);
    }

    #[tokio::test]
    async fn at_most_three_patterns_surface() {
        let store = MapStore::default();
        {
            // Give four patterns strong multi-domain histories.
            let mut map = store.records.lock();
            for pattern in [
                PatternId::DecisionSpiral,
                PatternId::AvoidanceLoop,
                PatternId::Overcommit,
                PatternId::Rumination,
            ] {
                let history: Vec<PatternEvidence> = (0..4)
                    .map(|i| {
                        PatternEvidence::new(
                            pattern,
                            Some(if i % 2 == 0 { Domain::Work } else { Domain::Growth }),
                            fixed_now() - Duration::days(i + 2),
                            Polarity::Support,
                            Strength::Strong,
                            "history",
                        )
                    })
                    .collect();
                map.insert(pattern, history);
            }
        }

        let memories = vec![
            spiral_memory(),
            selected("keeps putting off the tax filing", Some(Domain::Finance)),
            selected("said yes to everything again, plate is too full", Some(Domain::Work)),
            selected("replaying that conversation from last month", Some(Domain::Relationships)),
        ];
        let clock = FixedClock(fixed_now());
        let outcome = analyze(
            &store,
            &clock,
            &memories,
            // Query bridges for all four fire.
            "I can't decide, keep putting it off, too much going on, and it still bothers me",
        )
        .await;

        assert_eq!(outcome.surfaced.len(), SURFACE_CAP);
        let scores: Vec<f32> = outcome.surfaced.iter().map(|f| f.report.score).collect();
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));
        assert_eq!(scores, sorted, "surfaced patterns ordered by score");
    }
}
