//! Olympus policy registry CLI.
//!
//! Exit codes: 0 success, 2 validation error, 3 unknown anchor.

use clap::{Parser, Subcommand, ValueEnum};
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use olympus_governance::{AnchorMode, AnchorPolicy, PolicyError, PolicyRegistry};
use olympus_ledger::OlympusHome;

#[derive(Debug, Parser)]
#[command(name = "policyctl", about = "Manage per-anchor reality policies")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Live,
    Cached,
    Quorum,
}

impl From<ModeArg> for AnchorMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Live => AnchorMode::Live,
            ModeArg::Cached => AnchorMode::Cached,
            ModeArg::Quorum => AnchorMode::Quorum,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install or replace an anchor's policy
    Set {
        anchor_id: String,
        #[arg(long, value_enum, default_value = "live")]
        mode: ModeArg,
        #[arg(long, default_value_t = 5)]
        samples: u32,
        #[arg(long, default_value_t = 0.8)]
        success: f64,
        #[arg(long, default_value_t = 2000)]
        timeout: u64,
        #[arg(long, default_value_t = 0.7)]
        trust: f64,
        #[arg(long, default_value_t = 0.1)]
        variance: f64,
    },
    /// Print an anchor's policy
    Get { anchor_id: String },
    /// List registered anchors
    List,
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let home = OlympusHome::from_env();
    let path = home.reality_policies();

    let registry = match PolicyRegistry::load(&path) {
        Ok(r) => r,
        Err(err) => {
            eprintln!("failed to load policy registry: {err}");
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Command::Set {
            anchor_id,
            mode,
            samples,
            success,
            timeout,
            trust,
            variance,
        } => {
            let policy = AnchorPolicy {
                mode: mode.into(),
                samples,
                success_threshold: success,
                timeout_ms: timeout,
                min_trust: trust,
                variance_threshold: variance,
            };
            match registry.set(anchor_id.as_str(), policy) {
                Ok(version) => {
                    if let Err(err) = registry.persist(&path) {
                        eprintln!("failed to persist registry: {err}");
                        return ExitCode::from(2);
                    }
                    println!("{anchor_id} set (registry v{version})");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("{err}");
                    ExitCode::from(2)
                }
            }
        }
        Command::Get { anchor_id } => match registry.get_strict(&anchor_id) {
            Ok(policy) => match serde_json::to_string_pretty(&policy) {
                Ok(body) => {
                    println!("{body}");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("{err}");
                    ExitCode::from(2)
                }
            },
            Err(PolicyError::UnknownAnchor(id)) => {
                eprintln!("unknown anchor {id}");
                ExitCode::from(3)
            }
            Err(err) => {
                eprintln!("{err}");
                ExitCode::from(2)
            }
        },
        Command::List => {
            for id in registry.anchor_ids() {
                println!("{id}");
            }
            ExitCode::SUCCESS
        }
    }
}
