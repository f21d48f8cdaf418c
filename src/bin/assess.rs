//! Threat assessment harness.
//!
//! Feeds already-resolved indicator readings through the scoring engine:
//! - TOML config file support with a built-in default config
//! - `run` evaluates cycles with checkpoint restore/save across invocations
//! - `replay` evaluates the same cycles on a fresh engine (no checkpoint)
//! - Structured logging with tracing (pretty/json/compact)

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crisis_sentinel::{CycleReadings, EngineCheckpoint, EngineConfig, ThreatEngine};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "assess")]
#[command(version, about = "Composite threat assessment engine", long_about = None)]
struct Cli {
    /// Path to a TOML engine config (omit to use the built-in indicator set)
    #[arg(short, long, env = "SENTINEL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output format (pretty, json, compact)
    #[arg(long, default_value = "pretty")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate cycles, restoring and saving cross-cycle state
    Run {
        /// JSON file holding an array of cycle readings ("-" for stdin)
        readings: String,

        /// Checkpoint file to restore from and save to
        #[arg(long, default_value = "sentinel_checkpoint.json")]
        checkpoint: PathBuf,

        /// Evaluate without writing the checkpoint back
        #[arg(long)]
        dry_run: bool,
    },
    /// Evaluate cycles on a fresh engine, printing every outcome
    Replay {
        /// JSON file holding an array of cycle readings ("-" for stdin)
        readings: String,
    },
    /// Write the built-in config as a TOML file
    SampleConfig {
        /// Output file path
        #[arg(short, long, default_value = "sentinel.toml")]
        output: PathBuf,
    },
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(&cli)?;

    match cli.command {
        Commands::Run {
            ref readings,
            ref checkpoint,
            dry_run,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let cycles = load_readings(readings)?;
            run_cycles(config, cycles, Some(checkpoint), dry_run)
        }
        Commands::Replay { ref readings } => {
            let config = load_config(cli.config.as_deref())?;
            let cycles = load_readings(readings)?;
            run_cycles(config, cycles, None, true)
        }
        Commands::SampleConfig { ref output } => generate_sample_config(output),
    }
}

fn run_cycles(
    config: EngineConfig,
    cycles: Vec<CycleReadings>,
    checkpoint: Option<&Path>,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = match checkpoint {
        Some(path) if path.exists() => {
            let saved = EngineCheckpoint::load(path)?;
            info!(path = %path.display(), saved_at = %saved.saved_at, "restoring checkpoint");
            ThreatEngine::from_checkpoint(config, saved)?
        }
        _ => ThreatEngine::new(config)?,
    };

    if cycles.is_empty() {
        warn!("no cycles in input, nothing to evaluate");
    }

    let mut outcomes = Vec::with_capacity(cycles.len());
    for cycle in &cycles {
        let outcome = engine.evaluate_cycle(cycle);
        info!(
            timestamp = %outcome.timestamp,
            score = %format!("{:.2}", outcome.composite.score),
            level = outcome.composite.level,
            confirmed = outcome.confirmed.tier.value(),
            transition = outcome.transition.is_some(),
            "cycle evaluated"
        );
        outcomes.push(outcome);
    }

    println!("{}", serde_json::to_string_pretty(&outcomes)?);

    if let Some(path) = checkpoint {
        if dry_run {
            info!("dry run, checkpoint not written");
        } else {
            engine.checkpoint().save(path)?;
            info!(path = %path.display(), "checkpoint saved");
        }
    }

    Ok(())
}

// ============================================================================
// Input loading
// ============================================================================

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            Ok(EngineConfig::from_toml_file(path)?)
        }
        None => {
            info!("no config file given, using built-in indicator set");
            Ok(EngineConfig::builtin())
        }
    }
}

fn load_readings(source: &str) -> Result<Vec<CycleReadings>, Box<dyn std::error::Error>> {
    let raw = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        fs::read_to_string(source)?
    };
    let cycles: Vec<CycleReadings> = serde_json::from_str(&raw)?;
    Ok(cycles)
}

// ============================================================================
// Logging & sample config
// ============================================================================

fn setup_logging(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    match cli.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        "compact" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .compact()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
        }
    }

    Ok(())
}

fn generate_sample_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let sample = EngineConfig::builtin();
    let content = toml::to_string_pretty(&sample)?;

    let with_comments = format!(
        r#"# Threat assessment engine configuration
# See: cargo run --bin assess -- --help
#
# Band tables use inclusive bounds on both ends; a value landing exactly on
# a shared boundary takes the stricter (higher) tier.

{}"#,
        content
    );

    fs::write(path, with_comments)?;
    println!("Sample config written to {}", path.display());

    Ok(())
}
