//! Pipeline orchestration.
//!
//! [`Hearth`] owns the shared state (surprise cache, forge buffer) and the
//! handles to every external collaborator, and runs the per-message stage
//! sequence: heat → goal + temporal gate → embed → pool search → dominance →
//! surprise re-rank → dedup → score → select → reframe → forge → scout →
//! compose.  Every stage is guarded: a failing stage logs a warning, leaves
//! a diagnostic, and the pipeline continues from the last good partial
//! result.  `assemble_prefix` never returns an error; a `None` prefix means
//! "send the outbound message unmodified".

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use hearth_config::HearthConfig;

use crate::affect::{AffectReading, complement_for, detect};
use crate::cache::SurpriseCache;
use crate::composer::{Section, compose};
use crate::forge::{ForgeDetector, ForgeReading, fusion_lines};
use crate::goal::{Goal, classify};
use crate::heat::{heat_from_affect, heat_from_text};
use crate::interfaces::{
    ChatApi, Clock, Embedder, EvidenceStore, MemoryStore, TrajectoryStore, VectorSearch,
};
use crate::rank::{dedup, score_all, select_diverse};
use crate::reframe::{reframe, should_reframe};
use crate::retrieval::{dominant_domain, reweight_pattern_fact, search_pools};
use crate::schema::{AffectShape, Domain, IdentitySpec, ScoredMemory};
use crate::scout::analyze;
use crate::surprise::rerank_dominant;
use crate::temporal::{TimeWindow, window_for_heat};

// ── Cancellation ──────────────────────────────────────────────────────────────

/// Caller-held cancellation handle.  The orchestrator checks it between
/// stages: in-flight external calls run to completion and their responses
/// are discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Request / response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct AssembleRequest {
    pub user_message: String,
    /// Identifies the user for trajectory lookup.
    pub user_id: String,
    /// Enables the surprise re-ranker when present.
    pub base_system_prompt: Option<String>,
    /// Skips affect detection and drives heat from the given shape.
    pub affect_override: Option<AffectShape>,
    /// Clears the forge window before observing this message.
    pub forge_reset: bool,
    pub cancel: CancelFlag,
}

/// Per-stage diagnostic note.
#[derive(Debug, Clone, Serialize)]
pub struct StageNote {
    pub stage: &'static str,
    /// Empty when the stage ran; otherwise why it was skipped or degraded.
    pub note: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    pub heat: f32,
    pub goal: Option<Goal>,
    pub window: Option<String>,
    pub candidates: usize,
    pub selected: usize,
    pub dominant_domain: Option<String>,
    pub surprise_ran: bool,
    pub reframed: bool,
    pub patterns_surfaced: usize,
    pub evidence_written: usize,
    pub cancelled: bool,
    pub stages: Vec<StageNote>,
}

impl Diagnostics {
    fn note(&mut self, stage: &'static str, note: impl Into<String>, started: Instant) {
        self.stages.push(StageNote {
            stage,
            note: note.into(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        });
    }
}

#[derive(Debug)]
pub struct AssembleOutcome {
    pub prefix: Option<String>,
    pub diagnostics: Diagnostics,
}

// ── Collaborators ─────────────────────────────────────────────────────────────

/// Every external dependency the pipeline consumes, passed explicitly at
/// construction; there are no process-wide singletons.
#[derive(Clone)]
pub struct Collaborators {
    pub embedder: Arc<dyn Embedder>,
    pub vector: Arc<dyn VectorSearch>,
    pub chat: Arc<dyn ChatApi>,
    pub evidence: Arc<dyn EvidenceStore>,
    pub memories: Arc<dyn MemoryStore>,
    pub trajectories: Arc<dyn TrajectoryStore>,
    pub clock: Arc<dyn Clock>,
}

// ── Hearth ────────────────────────────────────────────────────────────────────

/// One context-assembly core per conversation: the forge buffer is
/// conversation-local state, everything else is shareable.
pub struct Hearth {
    config: HearthConfig,
    identity: IdentitySpec,
    deps: Collaborators,
    cache: SurpriseCache,
    forge: Mutex<ForgeDetector>,
    /// Adds score/rationale debug lines to the patterns block.
    pub debug_patterns: bool,
}

impl Hearth {
    pub fn new(config: HearthConfig, identity: IdentitySpec, deps: Collaborators) -> Self {
        let cache = SurpriseCache::new(config.surprise.cache_capacity);
        Self {
            config,
            identity,
            deps,
            cache,
            forge: Mutex::new(ForgeDetector::default()),
            debug_patterns: false,
        }
    }

    /// Replace the operating specification wholesale.  Cached surprise
    /// scores are conditioned on the old identity, so the cache drops too.
    pub fn replace_identity(&mut self, identity: IdentitySpec) {
        self.identity = identity;
        self.cache.invalidate_all();
        info!("identity specification replaced; surprise cache cleared");
    }

    /// Invalidate surprise scores: one memory on mutation, everything on a
    /// synthesis event (`memory_id = None`).
    pub fn invalidate_surprise_cache(&self, memory_id: Option<Uuid>) {
        match memory_id {
            Some(id) => self.cache.invalidate_memory(id),
            None => self.cache.invalidate_all(),
        }
    }

    /// Affect detection, exposed for hosts that render state externally.
    pub fn detect_affect(&self, text: &str) -> AffectReading {
        detect(text)
    }

    /// Forge phase detection over this conversation's window.
    pub async fn detect_phase(&self, text: &str, reset: bool) -> ForgeReading {
        let mut forge = self.forge.lock().await;
        if reset {
            forge.reset();
        }
        forge.observe(text)
    }

    /// Assemble the injection prefix for one outbound message.
    pub async fn assemble_prefix(&self, request: AssembleRequest) -> AssembleOutcome {
        let mut diag = Diagnostics::default();
        let message = request.user_message.as_str();
        let overall = Instant::now();

        // ── Affect + heat ────────────────────────────────────────────────
        let started = Instant::now();
        let affect = match request.affect_override {
            Some(shape) => {
                let shape = shape.clamped();
                let (label, complement) = complement_for(shape);
                AffectReading { shape, label, complement }
            }
            None => detect(message),
        };
        let heat = match request.affect_override {
            Some(shape) => heat_from_affect(shape),
            None => heat_from_text(message),
        };
        diag.heat = heat;
        diag.note("affect+heat", "", started);

        // ── Goal + temporal gate ─────────────────────────────────────────
        let goal = classify(message);
        let window = window_for_heat(heat);
        diag.goal = Some(goal);
        diag.window = Some(window.describe());
        let retrieval_enabled = window != TimeWindow::Disabled;

        // ── Retrieval (stages 1–2) ───────────────────────────────────────
        let mut selected: Vec<ScoredMemory> = Vec::new();
        let mut retrieval_failed = false;
        if retrieval_enabled {
            match self.retrieve(message, goal, heat, window, &request, &mut diag).await {
                Some(memories) => selected = memories,
                None => retrieval_failed = true,
            }
        } else {
            diag.note("retrieval", "gated off: cold message", overall);
        }

        if request.cancel.is_cancelled() {
            diag.cancelled = true;
            return AssembleOutcome { prefix: None, diagnostics: diag };
        }

        if retrieval_failed {
            // Retrieval was supposed to run and fully failed: leave the
            // outbound message untouched rather than inject a partial view.
            warn!("retrieval fully failed; sending message unmodified");
            return AssembleOutcome { prefix: None, diagnostics: diag };
        }

        diag.selected = selected.len();

        // ── Access marking (best-effort side effect) ─────────────────────
        if !selected.is_empty() {
            let ids: Vec<Uuid> = selected.iter().map(|c| c.memory.id).collect();
            if let Err(err) =
                self.deps.memories.mark_access(&ids, self.deps.clock.now()).await
            {
                warn!(error = %err, "mark_access failed");
            }
        }

        // ── Stage 3: reframe ─────────────────────────────────────────────
        if !selected.is_empty() && should_reframe(affect.shape) {
            let started = Instant::now();
            reframe(self.deps.chat.as_ref(), &mut selected, affect.complement).await;
            diag.reframed = selected.iter().any(|c| c.reframed.is_some());
            diag.note("reframe", "", started);
        }

        if request.cancel.is_cancelled() {
            diag.cancelled = true;
            return AssembleOutcome { prefix: None, diagnostics: diag };
        }

        // ── Forge ────────────────────────────────────────────────────────
        let forge_reading = self.detect_phase(message, request.forge_reset).await;
        let fusion = fusion_lines(forge_reading.phase, affect.shape);

        // ── Scout ────────────────────────────────────────────────────────
        let started = Instant::now();
        let scout = analyze(
            self.deps.evidence.as_ref(),
            self.deps.clock.as_ref(),
            &selected,
            message,
        )
        .await;
        diag.patterns_surfaced = scout.surfaced.len();
        diag.evidence_written = scout.evidence_written;
        diag.note("scout", "", started);

        // ── Trajectory ───────────────────────────────────────────────────
        let trajectory = match self.deps.trajectories.get_active(&request.user_id).await {
            Ok(trajectory) => trajectory,
            Err(err) => {
                warn!(error = %err, "trajectory lookup failed");
                None
            }
        };

        if request.cancel.is_cancelled() {
            diag.cancelled = true;
            return AssembleOutcome { prefix: None, diagnostics: diag };
        }

        // ── Compose ──────────────────────────────────────────────────────
        let mut sections = vec![
            Section::Identity(&self.identity),
            Section::CompositionRules,
            Section::AffectComplement(&affect),
            Section::ForgeComplement { reading: &forge_reading, fusion: &fusion },
            Section::Memories(&selected),
            Section::Patterns { findings: &scout.surfaced, debug: self.debug_patterns },
        ];
        if let Some(trajectory) = &trajectory {
            sections.push(Section::Trajectory(trajectory));
        }
        if retrieval_enabled {
            sections.push(Section::MemoryProtocol);
        }

        let prefix = compose(&sections);
        debug!(
            heat,
            goal = goal.slug(),
            selected = selected.len(),
            patterns = scout.surfaced.len(),
            elapsed_ms = overall.elapsed().as_millis() as u64,
            "prefix assembled"
        );

        AssembleOutcome { prefix, diagnostics: diag }
    }

    /// Stages 1–2 under the overall retrieval timeout.  `None` means the
    /// retrieval path fully failed (embed or both pools); an empty vec is a
    /// legitimate "nothing relevant" result.
    async fn retrieve(
        &self,
        message: &str,
        goal: Goal,
        heat: f32,
        window: TimeWindow,
        request: &AssembleRequest,
        diag: &mut Diagnostics,
    ) -> Option<Vec<ScoredMemory>> {
        let budget = Duration::from_secs(self.config.retrieval.timeout_secs);
        let started = Instant::now();

        let embedding = match tokio::time::timeout(
            budget,
            self.deps.embedder.embed(message),
        )
        .await
        {
            Ok(Ok(vector)) => vector,
            Ok(Err(err)) => {
                diag.note("embed", err.to_string(), started);
                return None;
            }
            Err(_) => {
                diag.note("embed", "timeout", started);
                return None;
            }
        };
        diag.note("embed", "", started);

        if request.cancel.is_cancelled() {
            return Some(Vec::new());
        }

        let remaining = budget.saturating_sub(started.elapsed());
        let search_started = Instant::now();
        let cutoff = window.cutoff(self.deps.clock.now());
        let mut candidates = match tokio::time::timeout(
            remaining,
            search_pools(
                self.deps.vector.as_ref(),
                &embedding,
                self.config.retrieval.similarity_threshold,
                self.config.retrieval.max_candidates,
                cutoff,
            ),
        )
        .await
        {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(err)) => {
                diag.note("search", err.to_string(), search_started);
                return None;
            }
            Err(_) => {
                diag.note("search", "timeout", search_started);
                return None;
            }
        };
        diag.candidates = candidates.len();
        diag.note("search", "", search_started);

        if request.cancel.is_cancelled() {
            return Some(Vec::new());
        }

        // ── Dominance check → stage 2 or fixed reweight ──────────────────
        let dominant: Option<Domain> = dominant_domain(&candidates);
        diag.dominant_domain = dominant.map(|d| d.slug().to_string());
        if let Some(domain) = dominant {
            match &request.base_system_prompt {
                Some(base) => {
                    let started = Instant::now();
                    candidates = rerank_dominant(
                        self.deps.chat.as_ref(),
                        &self.cache,
                        &self.config.surprise,
                        candidates,
                        domain,
                        base,
                        message,
                    )
                    .await;
                    diag.surprise_ran = true;
                    diag.note("surprise", "", started);
                }
                None => {
                    reweight_pattern_fact(&mut candidates);
                    diag.note(
                        "surprise",
                        "no base prompt: pattern/fact reweight",
                        Instant::now(),
                    );
                }
            }
        }

        // ── Dedup → score → select ───────────────────────────────────────
        let mut deduped = dedup(candidates);
        score_all(&mut deduped, goal, Some(heat));
        let selected = select_diverse(
            deduped,
            self.config.selector.min_score,
            self.config.selector.user_cap,
            self.config.selector.ai_cap,
        );
        Some(selected)
    }
}
