use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Memory corpus ─────────────────────────────────────────────────────────────

/// Partition of the memory corpus: facts and values about the user vs
/// reflections the assistant has generated about itself or the relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pool {
    User,
    Ai,
}

impl Pool {
    pub fn slug(self) -> &'static str {
        match self {
            Pool::User => "user",
            Pool::Ai => "ai",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Fact,
    Value,
    Reward,
    Synthesis,
    PartnerModel,
    SelfModel,
}

impl MemoryKind {
    pub const ALL: [MemoryKind; 6] = [
        MemoryKind::Fact,
        MemoryKind::Value,
        MemoryKind::Reward,
        MemoryKind::Synthesis,
        MemoryKind::PartnerModel,
        MemoryKind::SelfModel,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            MemoryKind::Fact => "fact",
            MemoryKind::Value => "value",
            MemoryKind::Reward => "reward",
            MemoryKind::Synthesis => "synthesis",
            MemoryKind::PartnerModel => "partner_model",
            MemoryKind::SelfModel => "self_model",
        }
    }

    /// Derived coarse class: synthesized observations behave as patterns in
    /// scoring; everything else behaves as a fact.
    pub fn memory_class(self) -> MemoryClass {
        match self {
            MemoryKind::Synthesis | MemoryKind::PartnerModel | MemoryKind::SelfModel => {
                MemoryClass::Pattern
            }
            MemoryKind::Fact | MemoryKind::Value | MemoryKind::Reward => MemoryClass::Fact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryClass {
    Fact,
    Pattern,
}

/// Closed set of seven life-areas a memory can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Work,
    Relationships,
    Health,
    Creative,
    Finance,
    Growth,
    Play,
}

impl Domain {
    pub fn slug(self) -> &'static str {
        match self {
            Domain::Work => "work",
            Domain::Relationships => "relationships",
            Domain::Health => "health",
            Domain::Creative => "creative",
            Domain::Finance => "finance",
            Domain::Growth => "growth",
            Domain::Play => "play",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Surprise,
    Disgust,
    Trust,
    Anticipation,
    Shame,
    Pride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Validation {
    Validated,
    Untested,
    Invalidated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    Ephemeral,
    Contextual,
    Durable,
}

/// A single memory row as stored in the corpus.
///
/// After creation only `heat`, `validation`, `access_count` and
/// `last_accessed` mutate; content and classification are fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    /// Free text, at most [`MAX_CONTENT_CHARS`] characters.
    pub content: String,
    pub pool: Pool,
    pub kind: MemoryKind,
    pub domain: Option<Domain>,
    pub emotion: Option<Emotion>,
    pub heat: f32,
    /// Importance weight in [0,1].
    pub intensity: f32,
    pub validation: Validation,
    pub durability: Durability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub access_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
}

/// Hard cap on memory content length.
pub const MAX_CONTENT_CHARS: usize = 2000;

impl Memory {
    pub fn memory_class(&self) -> MemoryClass {
        self.kind.memory_class()
    }
}

/// A memory with its Stage-1 similarity and any later scoring annotations.
#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub memory: Memory,
    /// Cosine similarity in [0,1] as returned by the vector store, possibly
    /// reweighted by the dominance fallback.
    pub similarity: f32,
    /// KL divergence assigned by the surprise re-ranker, when it ran.
    pub surprise_score: Option<f64>,
    /// Composite score assigned before selection.
    pub score: f32,
    /// Stage-3 rewrite of `memory.content`, when the reframer ran.
    pub reframed: Option<String>,
}

impl ScoredMemory {
    pub fn new(memory: Memory, similarity: f32) -> Self {
        Self {
            memory,
            similarity,
            surprise_score: None,
            score: 0.0,
            reframed: None,
        }
    }

    /// The text that should reach the prefix: the Stage-3 rewrite when
    /// present, the original content otherwise.
    pub fn display_text(&self) -> &str {
        self.reframed.as_deref().unwrap_or(&self.memory.content)
    }
}

// ── Identity specification ────────────────────────────────────────────────────

/// The operating specification produced by onboarding.  Treated as immutable
/// input to composition; only ever replaced wholesale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentitySpec {
    pub identity: String,
    pub cognitive_architecture: String,
    pub communication: String,
    pub execution: String,
    pub constraints: Vec<String>,
    pub balance_protocol: String,
    pub appendix: String,
}

impl IdentitySpec {
    pub fn is_empty(&self) -> bool {
        self.identity.is_empty()
            && self.cognitive_architecture.is_empty()
            && self.communication.is_empty()
            && self.execution.is_empty()
            && self.constraints.is_empty()
            && self.balance_protocol.is_empty()
            && self.appendix.is_empty()
    }
}

// ── Affect and phase ──────────────────────────────────────────────────────────

/// Three-axis affect shape, each axis in [-1,+1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffectShape {
    pub expansion: f32,
    pub activation: f32,
    pub certainty: f32,
}

impl AffectShape {
    pub fn clamped(self) -> Self {
        Self {
            expansion: self.expansion.clamp(-1.0, 1.0),
            activation: self.activation.clamp(-1.0, 1.0),
            certainty: self.certainty.clamp(-1.0, 1.0),
        }
    }
}

/// Creative phase over the recent message window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ForgePhase {
    Diverging,
    Incubating,
    Converging,
    Refining,
    Neutral,
}

impl ForgePhase {
    pub fn label(self) -> &'static str {
        match self {
            ForgePhase::Diverging => "DIVERGING",
            ForgePhase::Incubating => "INCUBATING",
            ForgePhase::Converging => "CONVERGING",
            ForgePhase::Refining => "REFINING",
            ForgePhase::Neutral => "NEUTRAL",
        }
    }
}

// ── Behavioral evidence ───────────────────────────────────────────────────────

/// Closed taxonomy of behavioral-verb patterns the scout can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternId {
    DecisionSpiral,
    AvoidanceLoop,
    ScopeCreep,
    SelfDiscounting,
    PerfectionStall,
    NoveltyChase,
    Overcommit,
    Rumination,
}

impl PatternId {
    pub const ALL: [PatternId; 8] = [
        PatternId::DecisionSpiral,
        PatternId::AvoidanceLoop,
        PatternId::ScopeCreep,
        PatternId::SelfDiscounting,
        PatternId::PerfectionStall,
        PatternId::NoveltyChase,
        PatternId::Overcommit,
        PatternId::Rumination,
    ];

    pub fn verb(self) -> &'static str {
        match self {
            PatternId::DecisionSpiral => "decision_spiral",
            PatternId::AvoidanceLoop => "avoidance_loop",
            PatternId::ScopeCreep => "scope_creep",
            PatternId::SelfDiscounting => "self_discounting",
            PatternId::PerfectionStall => "perfection_stall",
            PatternId::NoveltyChase => "novelty_chase",
            PatternId::Overcommit => "overcommit",
            PatternId::Rumination => "rumination",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Support,
    Contradict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    Normal,
    Strong,
}

/// Maximum characters of the triggering query preserved on a record.
pub const MAX_SOURCE_QUERY_CHARS: usize = 100;

/// One observation that a behavioral pattern fired or was contradicted.
/// Append-only; never edited after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternEvidence {
    pub id: Uuid,
    pub pattern_id: PatternId,
    pub domain: Option<Domain>,
    pub observed_at: DateTime<Utc>,
    pub polarity: Polarity,
    pub strength: Strength,
    #[serde(default)]
    pub source_query: String,
}

impl PatternEvidence {
    pub fn new(
        pattern_id: PatternId,
        domain: Option<Domain>,
        observed_at: DateTime<Utc>,
        polarity: Polarity,
        strength: Strength,
        source_query: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pattern_id,
            domain,
            observed_at,
            polarity,
            strength,
            source_query: source_query.chars().take(MAX_SOURCE_QUERY_CHARS).collect(),
        }
    }
}

/// Confidence bands derived from evidence with time decay and contradiction
/// penalties.  Dormant patterns must never reach the composed prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceLevel {
    Dormant,
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn label(self) -> &'static str {
        match self {
            ConfidenceLevel::High => "HIGH",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::Dormant => "DORMANT",
        }
    }
}

// ── Trajectory ────────────────────────────────────────────────────────────────

/// Compressed forward trajectory produced by an external synthesizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trajectory {
    pub compressed_text: String,
    #[serde(default)]
    pub arcs: Vec<String>,
    #[serde(default)]
    pub tensions: Vec<String>,
    #[serde(default)]
    pub drift: Option<String>,
    #[serde(default)]
    pub memory_count: usize,
    pub generated_at: DateTime<Utc>,
    pub is_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    pub(crate) fn sample_memory(content: &str, pool: Pool, kind: MemoryKind) -> Memory {
        let now = Utc::now();
        Memory {
            id: Uuid::new_v4(),
            content: content.to_string(),
            pool,
            kind,
            domain: None,
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
        }
    }

    #[test]
    fn memory_class_derivation_splits_patterns_from_facts() {
        assert_eq!(MemoryKind::Fact.memory_class(), MemoryClass::Fact);
        assert_eq!(MemoryKind::Value.memory_class(), MemoryClass::Fact);
        assert_eq!(MemoryKind::Reward.memory_class(), MemoryClass::Fact);
        assert_eq!(MemoryKind::Synthesis.memory_class(), MemoryClass::Pattern);
        assert_eq!(MemoryKind::PartnerModel.memory_class(), MemoryClass::Pattern);
        assert_eq!(MemoryKind::SelfModel.memory_class(), MemoryClass::Pattern);
    }

    #[test]
    fn evidence_source_query_is_truncated() {
        let long = "x".repeat(500);
        let record = PatternEvidence::new(
            PatternId::DecisionSpiral,
            None,
            Utc::now(),
            Polarity::Support,
            Strength::Weak,
            &long,
        );
        assert_eq!(record.source_query.chars().count(), MAX_SOURCE_QUERY_CHARS);
    }

    #[test]
    fn confidence_levels_order_dormant_lowest() {
        assert!(ConfidenceLevel::Dormant < ConfidenceLevel::Low);
        assert!(ConfidenceLevel::Low < ConfidenceLevel::Medium);
        assert!(ConfidenceLevel::Medium < ConfidenceLevel::High);
    }

    #[test]
    fn display_text_prefers_reframed() {
        let memory = sample_memory("original", Pool::User, MemoryKind::Fact);
        let mut scored = ScoredMemory::new(memory, 0.8);
        assert_eq!(scored.display_text(), "original");
        scored.reframed = Some("reframed".to_string());
        assert_eq!(scored.display_text(), "reframed");
    }
}
