//! # worker_cli
//!
//! Command-line tools for workers.
//!
//! - `worker_cli inspect <snapshot>` prints one JSON line per entity.
//! - `worker_cli connect` connects over NATS and logs every op it receives
//!   until the runtime disconnects it or `--polls` runs out.

mod client;
mod inspect;

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "worker_cli", about = "Worker SDK tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every entity in a snapshot file as a JSON line
    Inspect {
        /// Path to the snapshot file
        snapshot: PathBuf,
    },

    /// Connect to the runtime and log received ops
    Connect(client::ConnectArgs),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("worker_cli=info".parse()?))
        .init();

    match Args::parse().command {
        Command::Inspect { snapshot } => {
            let mut stdout = std::io::stdout().lock();
            for line in inspect::entity_lines(&snapshot)? {
                writeln!(stdout, "{line}")?;
            }
            Ok(())
        }
        Command::Connect(args) => client::run(&args),
    }
}
