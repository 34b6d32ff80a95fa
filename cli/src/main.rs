//! CLI entrypoint for coevolve
//!
//! Wires the layers together with dependency injection and exposes the
//! consensus protocols as subcommands over a sample garment artifact.

use anyhow::{Result, anyhow, bail};
use clap::{Parser, Subcommand};
use coevolve_application::{ConsensusEngine, ExportMode};
use coevolve_domain::{ArtifactMetadata, DelegationMap, ParticipantId, StateMap};
use coevolve_infrastructure::{
    ConfigLoader, FileConfig, InMemoryDurableStore, SimulatedProposalPolicy, TracingEventSink,
};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "coevolve", version, about = "Weighted-consensus engine for evolving shared artifacts")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Ignore configuration files and use built-in defaults
    #[arg(long, global = true)]
    no_config: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Iterative consensus-gated evolution until the artifact stabilizes
    Evolve {
        /// Maximum evolution rounds (defaults to the configured cap)
        #[arg(long)]
        rounds: Option<usize>,

        /// Participants casting ballots and proposing changes
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "agent-minimalist,agent-futuristic,agent-fusion"
        )]
        participants: Vec<String>,
    },

    /// Multi-round consensus over a proposal, with early exit
    Multiround {
        /// Maximum voting rounds (defaults to the configured cap)
        #[arg(long)]
        rounds: Option<usize>,

        #[arg(
            long,
            value_delimiter = ',',
            default_value = "agent-minimalist,agent-futuristic,agent-fusion"
        )]
        participants: Vec<String>,

        /// Proposal payload as JSON
        #[arg(long, default_value = r#"{"style": "streetwear, straight silhouette"}"#)]
        proposal: String,
    },

    /// Delegated consensus: voting power transfers along from:to edges
    Delegated {
        /// Delegation edges, each written as from:to
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "agent-a:agent-fusion,agent-b:agent-fusion,agent-c:agent-minimalist"
        )]
        delegate: Vec<String>,

        /// Proposal payload as JSON
        #[arg(long, default_value = r#"{"style": "relaxed utility jacket"}"#)]
        proposal: String,
    },
}

/// Sample garment the demo protocols evolve
fn sample_state() -> StateMap {
    let mut state = StateMap::new();
    state.insert("body_color".to_string(), json!("#2C3E50"));
    state.insert("collar_type".to_string(), json!("stand"));
    state.insert("pocket_count".to_string(), json!(2));
    state.insert("sleeve_style".to_string(), json!("raglan"));
    state
}

fn build_engine(config: &FileConfig) -> ConsensusEngine {
    ConsensusEngine::new(
        Arc::new(InMemoryDurableStore::new()),
        Arc::new(config.ballot_policy()),
        Arc::new(SimulatedProposalPolicy::garment()),
        Arc::new(config.classifier()),
        Arc::new(TracingEventSink),
        config.session_config(),
    )
}

fn parse_participants(raw: &[String]) -> Vec<ParticipantId> {
    raw.iter().map(|p| ParticipantId::from(p.as_str())).collect()
}

fn parse_delegations(edges: &[String]) -> Result<DelegationMap> {
    let mut delegations = DelegationMap::new();
    for edge in edges {
        let Some((from, to)) = edge.split_once(':') else {
            bail!("invalid delegation '{edge}', expected from:to");
        };
        delegations.delegate(from.into(), to.into())?;
    }
    Ok(delegations)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("failed to load configuration: {e}"))?
    };
    config.validate()?;

    let engine = build_engine(&config);
    let artifact = engine
        .create_artifact(sample_state(), ArtifactMetadata::named("utility jacket"))
        .await?;
    info!(artifact = %artifact.id, "created sample artifact");

    match cli.command {
        Command::Evolve {
            rounds,
            participants,
        } => {
            let participants = parse_participants(&participants);
            let rounds = rounds.unwrap_or(config.engine.max_rounds);

            let report = engine
                .iterative_evolution(&artifact.id, &participants, rounds)
                .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);

            let export = engine.export(&artifact.id, ExportMode::Summary).await?;
            println!("{}", serde_json::to_string_pretty(&export)?);
        }

        Command::Multiround {
            rounds,
            participants,
            proposal,
        } => {
            let participants = parse_participants(&participants);
            let rounds = rounds.unwrap_or(config.engine.max_rounds);
            let proposal: Value = serde_json::from_str(&proposal)?;

            let session = engine
                .run_multi_round(
                    artifact.id.clone(),
                    proposal,
                    participants,
                    rounds,
                    config.engine.early_exit_ratio,
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }

        Command::Delegated { delegate, proposal } => {
            let delegations = parse_delegations(&delegate)?;
            let proposal: Value = serde_json::from_str(&proposal)?;

            let outcome = engine
                .run_delegated(artifact.id.clone(), proposal, &delegations)
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    Ok(())
}
