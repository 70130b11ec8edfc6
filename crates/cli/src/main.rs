use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use hearth_config::HearthConfig;
use hearth_core::{
    AssembleRequest, Collaborators, Hearth, IdentitySpec, SystemClock,
};
use hearth_llm::ProviderClient;
use hearth_store::{EvidenceLog, InMemoryCorpus};

#[derive(Debug, Parser)]
#[command(
    name = "hearth",
    version,
    about = "Context assembly core: turn a message and stored state into an injection prefix"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "hearth.toml")]
    config: PathBuf,
    /// Path to the identity specification JSON.
    #[arg(long, default_value = "identity.json")]
    identity: PathBuf,
    /// Path to a corpus snapshot JSON (array of memories).
    #[arg(long)]
    corpus: Option<PathBuf>,
    /// Path to the evidence log.
    #[arg(long, default_value = "evidence.jsonl")]
    evidence: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Assemble the injection prefix for one message.
    Assemble {
        /// The outbound user message.
        message: String,
        /// Base system prompt; enables the surprise re-ranker.
        #[arg(long)]
        base_prompt: Option<String>,
        /// Print diagnostics as JSON instead of the prefix.
        #[arg(long)]
        json: bool,
        /// Include score/rationale debug lines in the patterns block.
        #[arg(long)]
        debug_patterns: bool,
    },
    /// Detect the affect shape of a message.
    Affect { message: String },
    /// Detect the creative phase of a message.
    Phase {
        message: String,
        /// Clear the phase window first.
        #[arg(long)]
        reset: bool,
    },
    /// Invalidate the surprise cache (one memory, or everything).
    Invalidate {
        /// Memory id; omit to invalidate the whole cache.
        #[arg(long)]
        memory_id: Option<Uuid>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = HearthConfig::load_from(&cli.config)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.telemetry.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    let identity = load_identity(&cli.identity)?;
    let hearth = build_hearth(&cli, config, identity)?;

    match cli.command {
        Commands::Assemble { message, base_prompt, json, debug_patterns } => {
            let mut hearth = hearth;
            hearth.debug_patterns = debug_patterns;
            let outcome = hearth
                .assemble_prefix(AssembleRequest {
                    user_message: message,
                    user_id: "local".to_string(),
                    base_system_prompt: base_prompt,
                    ..Default::default()
                })
                .await;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.diagnostics)?);
            } else {
                match outcome.prefix {
                    Some(prefix) => println!("{prefix}"),
                    None => eprintln!("(no prefix: message would be sent unmodified)"),
                }
            }
        }
        Commands::Affect { message } => {
            let reading = hearth.detect_affect(&message);
            println!(
                "state: {} (expansion {:+.2}, activation {:+.2}, certainty {:+.2})",
                reading.label,
                reading.shape.expansion,
                reading.shape.activation,
                reading.shape.certainty
            );
            println!("complement: {}", reading.complement);
        }
        Commands::Phase { message, reset } => {
            let reading = hearth.detect_phase(&message, reset).await;
            println!(
                "phase: {} (openness {:.2}, materiality {:.2})",
                reading.phase.label(),
                reading.openness,
                reading.materiality
            );
            if !reading.complement.is_empty() {
                println!("complement: {}", reading.complement);
            }
        }
        Commands::Invalidate { memory_id } => {
            hearth.invalidate_surprise_cache(memory_id);
            match memory_id {
                Some(id) => println!("invalidated cache entries for {id}"),
                None => println!("invalidated the entire surprise cache"),
            }
        }
    }

    Ok(())
}

fn load_identity(path: &PathBuf) -> Result<IdentitySpec> {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("parsing identity spec {}", path.display())),
        Err(_) => {
            tracing::warn!(path = %path.display(), "no identity spec found; composing without one");
            Ok(IdentitySpec::default())
        }
    }
}

fn build_hearth(cli: &Cli, config: HearthConfig, identity: IdentitySpec) -> Result<Hearth> {
    let provider = Arc::new(ProviderClient::from_config(&config.endpoints)?);
    let clock = Arc::new(SystemClock);

    let corpus = Arc::new(InMemoryCorpus::new());
    if let Some(snapshot) = &cli.corpus {
        corpus.load_snapshot(snapshot)?;
    }

    let evidence = Arc::new(EvidenceLog::new(
        cli.evidence.clone(),
        config.evidence.clone(),
        clock.clone(),
    ));

    let deps = Collaborators {
        embedder: provider.clone(),
        vector: corpus.clone(),
        chat: provider,
        evidence,
        memories: corpus.clone(),
        trajectories: corpus,
        clock,
    };
    Ok(Hearth::new(config, identity, deps))
}
