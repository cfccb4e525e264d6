//! A polling worker that logs what the runtime sends it.

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};
use worker_connection::{Connection, WorkerConfig};
use worker_interop::{ConnectionParameters, LogLevel, LogMessage};
use worker_ops::Op;

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Runtime host; given with or without --port it replaces NATS_URL
    #[arg(long)]
    host: Option<String>,

    /// Runtime port; given with or without --host it replaces NATS_URL
    #[arg(long)]
    port: Option<u16>,

    /// Worker type (defaults to WORKER_TYPE or RustWorker)
    #[arg(long)]
    worker_type: Option<String>,

    /// Worker id (defaults to WORKER_ID or a generated id)
    #[arg(long)]
    worker_id: Option<String>,

    /// Stop after this many polls; 0 polls until disconnected
    #[arg(long, default_value_t = 0)]
    polls: u64,

    /// How long each poll waits for ops, in milliseconds
    #[arg(long, default_value_t = 100)]
    timeout_millis: u32,
}

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 4222;

/// Apply the command line on top of `base`. The URL is only replaced when
/// `--host` or `--port` is given.
fn config(args: &ConnectArgs, base: WorkerConfig) -> WorkerConfig {
    let mut config = base;
    if args.host.is_some() || args.port.is_some() {
        config = config.with_host_port(
            args.host.as_deref().unwrap_or(DEFAULT_HOST),
            args.port.unwrap_or(DEFAULT_PORT),
        );
    }
    if let Some(worker_type) = &args.worker_type {
        config = config.with_worker_type(worker_type.clone());
    }
    if let Some(worker_id) = &args.worker_id {
        config = config.with_worker_id(worker_id.clone());
    }
    config
}

fn describe(op: &Op<'_>) -> String {
    match op {
        Op::Disconnect(op) => format!("{:?}: {}", op.connection_status_code, op.reason),
        Op::FlagUpdate(op) => format!("{} = {:?}", op.name, op.value),
        Op::LogMessage(op) => op.message.clone(),
        Op::AddEntity(op) => op.entity_id.to_string(),
        Op::RemoveEntity(op) => op.entity_id.to_string(),
        Op::AddComponent(op) => format!("{} {}", op.entity_id, op.data.component_id()),
        Op::ComponentUpdate(op) => format!("{} {}", op.entity_id, op.update.component_id()),
        Op::AuthorityChange(op) => {
            format!("{} {} {:?}", op.entity_id, op.component_id, op.authority)
        }
        _ => String::new(),
    }
}

/// Connect and poll until disconnected or out of polls.
///
/// # Errors
///
/// Returns an error if the connection cannot be established or a poll
/// fails.
pub fn run(args: &ConnectArgs) -> Result<()> {
    let config = config(args, WorkerConfig::from_env());
    let worker_id = config.worker_id();
    info!(
        url = config.nats_url,
        worker_type = config.worker_type,
        worker_id,
        "connecting"
    );

    let params = ConnectionParameters::new(config.worker_type.clone());
    let mut connection = Connection::connect_url_async(&config.nats_url, &worker_id, params)
        .into_inner()
        .context("connect future abandoned")??;
    connection.send_log_message(&LogMessage::new(LogLevel::Info, "worker_cli", "connected"))?;

    let mut polls = 0u64;
    while connection.is_connected() && (args.polls == 0 || polls < args.polls) {
        polls += 1;
        let ops = connection.get_op_list(args.timeout_millis)?;
        for op in ops.iter() {
            match op {
                Ok(op) => info!(kind = ?op.kind(), detail = describe(&op), "op received"),
                Err(e) => warn!(error = %e, "unreadable op"),
            }
        }
    }

    info!(
        polls,
        status = ?connection.connection_status_code(),
        details = connection.connection_status_details(),
        "worker finished"
    );
    Ok(())
}
