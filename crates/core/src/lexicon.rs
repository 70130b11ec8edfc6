//! Compiled lexicon registry.
//!
//! Every regex the pipeline consults lives here, compiled exactly once at
//! first use.  Heat, goal, affect, forge, and scout classification all read
//! from this single registry so the tables stay inspectable and testable.

use std::sync::LazyLock;

use regex::{Regex, RegexSet};

use crate::goal::Goal;
use crate::schema::PatternId;

// ── Heat ──────────────────────────────────────────────────────────────────────

pub struct HeatLexicon {
    /// Short greetings and acknowledgements.
    pub greeting: RegexSet,
    /// Simple factual openers ("what is", "how do I install").
    pub factual: RegexSet,
    /// Crisis / existential lexicon.
    pub hot: RegexSet,
    /// Reflective, deliberative language.
    pub warm: RegexSet,
    /// Intensifier words that boost within a band.
    pub intensifier: Regex,
    /// Runs of repeated terminal punctuation.
    pub punct_run: Regex,
}

// ── Affect ────────────────────────────────────────────────────────────────────

pub struct AxisLexicon {
    pub positive: RegexSet,
    pub negative: RegexSet,
}

pub struct AffectLexicon {
    pub expansion: AxisLexicon,
    pub activation: AxisLexicon,
    pub certainty: AxisLexicon,
}

// ── Forge ─────────────────────────────────────────────────────────────────────

pub struct ForgeLexicon {
    pub diverging: RegexSet,
    pub incubating: RegexSet,
    pub converging: RegexSet,
    pub refining: RegexSet,
    /// Concrete-artifact vocabulary feeding the materiality score.
    pub artifact: RegexSet,
}

// ── Scout ─────────────────────────────────────────────────────────────────────

/// One behavioral-verb pattern: how it shows up in stored memories, how the
/// current message signals it is live, and how the user reports the opposite.
pub struct PatternSpec {
    pub id: PatternId,
    pub matchers: RegexSet,
    pub query_bridges: RegexSet,
    pub contradiction_bridges: RegexSet,
    /// Suggested counter-move surfaced in the prefix.
    pub intervention: &'static str,
}

// ── Registry ──────────────────────────────────────────────────────────────────

pub struct Lexicons {
    pub heat: HeatLexicon,
    /// Goal taxonomies in declaration order; ties break toward the front.
    pub goals: Vec<(Goal, RegexSet)>,
    pub affect: AffectLexicon,
    pub forge: ForgeLexicon,
    pub scout: Vec<PatternSpec>,
}

pub fn lexicons() -> &'static Lexicons {
    &REGISTRY
}

fn set(patterns: &[&str]) -> RegexSet {
    RegexSet::new(patterns.iter().map(|p| format!("(?i){p}")))
        .unwrap_or_else(|e| panic!("lexicon pattern failed to compile: {e}"))
}

fn one(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}"))
        .unwrap_or_else(|e| panic!("lexicon pattern failed to compile: {e}"))
}

static REGISTRY: LazyLock<Lexicons> = LazyLock::new(|| Lexicons {
    heat: HeatLexicon {
        greeting: set(&[
            r"^\s*(hi|hey|hello|yo|sup|howdy)\b[\s!.]*$",
            r"^\s*good (morning|afternoon|evening|night)\b[\s!.]*$",
            r"^\s*(thanks|thank you|thx|ty)\b[\s!.]*$",
            r"^\s*(ok|okay|cool|got it|sounds good|nice|great|sure)\b[\s!.]*$",
            r"^\s*(bye|goodbye|see you|later|goodnight)\b[\s!.]*$",
        ]),
        factual: set(&[
            r"^\s*(what is|what's|what are|who is|who was)\b",
            r"^\s*(how do i|how to|how can i) (install|run|use|set up|setup|update|find|open)\b",
            r"^\s*(define|explain) \w+\s*\??\s*$",
        ]),
        hot: set(&[
            r"\b(crisis|desperate|hopeless|unbearable|terrified|panicking|panic attack)\b",
            r"\b(can't (take|do) this|falling apart|breaking down|at my limit)\b",
            r"\b(what's the point|no point|pointless|give up|giving up)\b",
            r"\b(lost everything|everything is (ruined|falling apart))\b",
            r"\b(want to disappear|can't go on)\b",
        ]),
        warm: set(&[
            r"\b(i'?ve been thinking|been wondering|i wonder (if|whether))\b",
            r"\b(should i|do i really|is it worth|not sure (if|whether))\b",
            r"\b(torn between|weighing|on the fence|second.guessing)\b",
            r"\b(part of me|deep down|honestly|to be honest)\b",
            r"\b(reflecting on|grappling with|sitting with|processing)\b",
        ]),
        intensifier: one(r"\b(really|very|so|extremely|absolutely|incredibly|totally|completely)\b"),
        punct_run: one(r"(!{2,}|\?{2,}|[!?]{2,})"),
    },

    goals: vec![
        (
            Goal::Emotional,
            set(&[
                r"\b(feel|feeling|felt)\b",
                r"\b(anxious|anxiety|sad|lonely|overwhelmed|scared|angry|hurt|ashamed)\b",
                r"\b(struggling|suffering|coping|drained|exhausted emotionally)\b",
                r"\b(miss (him|her|them)|heart|grief|grieving)\b",
            ]),
        ),
        (
            Goal::Technical,
            set(&[
                r"\b(code|bug|error|compile|deploy|server|database|api)\b",
                r"\b(install|configure|debug|refactor|script|function|crash)\b",
                r"\b(rust|python|javascript|typescript|docker|linux|sql)\b",
            ]),
        ),
        (
            Goal::Decisional,
            set(&[
                r"\b(should i|decide|decision|choice|choose|choosing)\b",
                r"\b(pros and cons|trade.?offs?|either|or should|versus|vs\.?)\b",
                r"\b(torn between|on the fence|can't decide|make up my mind)\b",
            ]),
        ),
        (
            Goal::Creative,
            set(&[
                r"\b(write|writing|story|novel|draft|chapter|poem|song|lyrics)\b",
                r"\b(design|sketch|paint|compose|ideas? for|brainstorm)\b",
                r"\b(creative|imagination|inspiration|world.?building)\b",
            ]),
        ),
        (
            Goal::Strategic,
            set(&[
                r"\b(plan|planning|roadmap|strategy|strategic|long.?term)\b",
                r"\b(goal|goals|milestone|quarter|next (month|year)|five.?year)\b",
                r"\b(prioriti[sz]e|sequence|scale|growth plan)\b",
            ]),
        ),
        (
            Goal::Relational,
            set(&[
                r"\b(my (partner|wife|husband|boyfriend|girlfriend|friend|mom|dad|mother|father|sister|brother|boss|coworker))\b",
                r"\b(relationship|conflict with|argument|apologi[sz]e|forgive)\b",
                r"\b(we (fought|argued|talked)|between us)\b",
            ]),
        ),
    ],

    affect: AffectLexicon {
        expansion: AxisLexicon {
            positive: set(&[
                r"\b(possibilit(y|ies)|options?|ideas?|explore|exploring|imagine)\b",
                r"\b(curious|wonder|what if|open to|horizons?|expansive)\b",
                r"\b(excited about|can't wait|looking forward)\b",
            ]),
            negative: set(&[
                r"\b(stuck|trapped|cornered|boxed in|no (options?|way out))\b",
                r"\b(closing in|walls|narrow|shrinking|dead end)\b",
                r"\b(overwhelmed|too much|drowning|buried)\b",
            ]),
        },
        activation: AxisLexicon {
            positive: set(&[
                r"\b(energi[sz]ed|buzzing|racing|fired up|pumped|wired)\b",
                r"\b(can't sit still|restless|charged|adrenaline)\b",
                r"\b(let's go|right now|immediately)\b",
            ]),
            negative: set(&[
                r"\b(tired|exhausted|drained|depleted|worn out|burnt? out)\b",
                r"\b(flat|numb|empty|heavy|sluggish|slow)\b",
                r"\b(can't get (up|started)|no energy)\b",
            ]),
        },
        certainty: AxisLexicon {
            positive: set(&[
                r"\b(definitely|certainly|sure|clear|clearly|obviously)\b",
                r"\b(i know|confident|without a doubt|no question)\b",
                r"\b(decided|committed|settled)\b",
            ]),
            negative: set(&[
                r"\b(unsure|not sure|uncertain|confused|confusing|lost)\b",
                r"\b(maybe|perhaps|i guess|i don't know|dunno|who knows)\b",
                r"\b(doubt|doubting|second.guessing|wavering)\b",
            ]),
        },
    },

    forge: ForgeLexicon {
        diverging: set(&[
            r"\b(brainstorm|ideas?|options?|alternatives?|possibilit(y|ies))\b",
            r"\b(what if|what about|could also|another (way|angle|approach))\b",
            r"\b(explore|riff|spitball|throw out|wild)\b",
        ]),
        incubating: set(&[
            r"\b(stuck|blocked|blank|nothing('s| is) coming)\b",
            r"\b(let it (sit|rest)|sleep on it|stepping away|percolat)\b",
            r"\b(not ready|need (a break|time|space)|marinate)\b",
        ]),
        converging: set(&[
            r"\b(decide|decision|narrow(ing)? down|settle on|commit)\b",
            r"\b(pick|choose|final(i[sz]e)?|lock in|go with)\b",
            r"\b(which (one|of these)|down to (two|three))\b",
        ]),
        refining: set(&[
            r"\b(polish|tweak|tighten|edit|revise|rework|refine)\b",
            r"\b(clean(ing)? up|last pass|final (draft|touches)|proofread)\b",
            r"\b(almost (done|there)|just needs)\b",
        ]),
        artifact: set(&[
            r"\b(draft|chapter|scene|verse|sketch|prototype|mockup|demo)\b",
            r"\b(version|v\d+|file|doc(ument)?|spreadsheet|deck|repo)\b",
            r"\b(page \d+|word count|\d+ words|commit)\b",
        ]),
    },

    scout: vec![
        PatternSpec {
            id: PatternId::DecisionSpiral,
            matchers: set(&[
                r"\b(keeps? (going back and forth|revisiting|re-?opening))\b",
                r"\b(still (hasn't|hadn't) decided|circling (on|around) the (same )?decision)\b",
                r"\b(flip.?flop|waffling|went back on)\b",
            ]),
            query_bridges: set(&[
                r"\b(should i|can't decide|torn between|back and forth)\b",
                r"\b(decision|deciding|choice|choose)\b",
            ]),
            contradiction_bridges: set(&[
                r"\b(i (finally )?decided|made (the|my) (call|decision|choice))\b",
                r"\b(committed to|pulled the trigger|went with)\b",
            ]),
            intervention: "Name the smallest reversible version of the choice and a date to revisit it.",
        },
        PatternSpec {
            id: PatternId::AvoidanceLoop,
            matchers: set(&[
                r"\b(keeps? (putting off|avoiding|dodging|postponing))\b",
                r"\b(still hasn't (started|opened|sent|called))\b",
                r"\b(procrastinat|deferr(ed|ing) again)\b",
            ]),
            query_bridges: set(&[
                r"\b(putting off|avoiding|procrastinat|can't (start|face))\b",
                r"\b(dreading|keep delaying)\b",
            ]),
            contradiction_bridges: set(&[
                r"\b(i (finally )?(started|sent|called|opened|did) (it|the))\b",
                r"\b(got it (done|over with)|faced it)\b",
            ]),
            intervention: "Shrink the first step until it takes under ten minutes, then schedule it.",
        },
        PatternSpec {
            id: PatternId::ScopeCreep,
            matchers: set(&[
                r"\b(scope (grew|creep|keeps growing)|kept adding (features|pieces))\b",
                r"\b(project (ballooned|expanded|got bigger))\b",
                r"\b(one more (feature|thing) before)\b",
            ]),
            query_bridges: set(&[
                r"\b(add(ing)? (another|one more)|expand the (project|scope))\b",
                r"\b(while i'?m at it|might as well also)\b",
            ]),
            contradiction_bridges: set(&[
                r"\b(cut (the )?scope|shipped the small version|said no to)\b",
                r"\b(kept it (small|minimal)|descoped)\b",
            ]),
            intervention: "Freeze the current scope in writing; new ideas go to a parking lot list.",
        },
        PatternSpec {
            id: PatternId::SelfDiscounting,
            matchers: set(&[
                r"\b(dismisse[sd] (the|their own) (win|success|progress))\b",
                r"\b(it was (just luck|nothing|no big deal)|anyone could have)\b",
                r"\b(downplay(s|ed|ing)|discount(s|ed|ing) (their|the) (work|effort))\b",
            ]),
            query_bridges: set(&[
                r"\b(just (got lucky|luck)|doesn't (really )?count|no big deal)\b",
                r"\b(anyone could|not a real)\b",
            ]),
            contradiction_bridges: set(&[
                r"\b(i'?m (actually )?proud|i earned (it|this)|gave myself credit)\b",
                r"\b(owning (it|the win))\b",
            ]),
            intervention: "Restate the win in plain factual terms before moving on.",
        },
        PatternSpec {
            id: PatternId::PerfectionStall,
            matchers: set(&[
                r"\b(polish(ing|ed) (it )?(endlessly|again|for weeks))\b",
                r"\b(never (feels|felt) (ready|good enough)|won't ship until perfect)\b",
                r"\b(redid|redo(ing|ne)) (it|the same)\b",
            ]),
            query_bridges: set(&[
                r"\b(not (good enough|ready)|one more pass|still not right)\b",
                r"\b(perfect|perfecting)\b",
            ]),
            contradiction_bridges: set(&[
                r"\b(shipped it|published|hit send|called it done)\b",
                r"\b(good enough,? (shipped|sent|done))\b",
            ]),
            intervention: "Set a ship date and define done as a checklist, not a feeling.",
        },
        PatternSpec {
            id: PatternId::NoveltyChase,
            matchers: set(&[
                r"\b(abandon(s|ed|ing) (the|a) project for)\b",
                r"\b(new (shiny|idea|project) (took over|again))\b",
                r"\b(dropped (it|that) (when|once) (something|a) new)\b",
            ]),
            query_bridges: set(&[
                r"\b(new (idea|project)|just thought of|excited about (something|a) new)\b",
                r"\b(start(ing)? (something|a) (new|fresh))\b",
            ]),
            contradiction_bridges: set(&[
                r"\b(stuck with (it|the (old|current))|finished (the|my) (old|existing))\b",
                r"\b(saw it through|resisted the (shiny|new))\b",
            ]),
            intervention: "Log the new idea, then return to the oldest unfinished commitment first.",
        },
        PatternSpec {
            id: PatternId::Overcommit,
            matchers: set(&[
                r"\b(said yes to (everything|too (much|many)))\b",
                r"\b(plate (is|was) (too )?full|stretched (too )?thin|double.?booked)\b",
                r"\b(took on (another|too many|more than))\b",
            ]),
            query_bridges: set(&[
                r"\b(too (much|many) (on|going on)|no time|swamped|overloaded)\b",
                r"\b(another (commitment|project|favor))\b",
            ]),
            contradiction_bridges: set(&[
                r"\b(said no|turned (it|them) down|dropped a commitment)\b",
                r"\b(cleared my (plate|schedule)|protected my time)\b",
            ]),
            intervention: "List current commitments before accepting anything new; one in, one out.",
        },
        PatternSpec {
            id: PatternId::Rumination,
            matchers: set(&[
                r"\b(replay(s|ed|ing) (the|that) (conversation|moment|mistake))\b",
                r"\b(can't stop thinking about (what|how) (happened|went))\b",
                r"\b(dwell(s|ed|ing) on|loops? on the past)\b",
            ]),
            query_bridges: set(&[
                r"\b(keep (thinking|replaying)|can't let (it|go)|still bothers me)\b",
                r"\b(should have (said|done))\b",
            ]),
            contradiction_bridges: set(&[
                r"\b(let it go|made peace with|moved on|stopped replaying)\b",
                r"\b(closed that (chapter|loop))\b",
            ]),
            intervention: "Write the lesson in one sentence, then pick one forward action it implies.",
        },
    ],
});
