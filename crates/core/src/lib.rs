pub mod affect;
pub mod cache;
pub mod composer;
pub mod confidence;
pub mod error;
pub mod forge;
pub mod goal;
pub mod heat;
pub mod interfaces;
pub mod lexicon;
pub mod pipeline;
pub mod rank;
pub mod reframe;
pub mod retrieval;
pub mod schema;
pub mod scout;
pub mod surprise;
pub mod temporal;

pub use affect::{AffectReading, detect as detect_affect};
pub use cache::{SurpriseCache, context_hash};
pub use composer::{Section, compose};
pub use confidence::ConfidenceReport;
pub use error::StageError;
pub use forge::{ForgeDetector, ForgeReading, fusion_lines};
pub use goal::{Goal, classify as classify_goal};
pub use heat::{heat_from_affect, heat_from_text};
pub use interfaces::{
    ChatApi, Clock, Embedder, EvidenceStore, FixedClock, MemoryStore, PoolHit, SearchParams,
    SystemClock, TokenLogprob, TrajectoryStore, VectorSearch,
};
pub use pipeline::{
    AssembleOutcome, AssembleRequest, CancelFlag, Collaborators, Diagnostics, Hearth, StageNote,
};
pub use schema::{
    AffectShape, ConfidenceLevel, Domain, Durability, Emotion, ForgePhase, IdentitySpec,
    MAX_CONTENT_CHARS, Memory, MemoryClass, MemoryKind, PatternEvidence, PatternId, Polarity,
    Pool, ScoredMemory, Strength, Trajectory, Validation,
};
pub use scout::{ScoutFinding, ScoutOutcome};
pub use temporal::{TimeWindow, window_for_heat};
