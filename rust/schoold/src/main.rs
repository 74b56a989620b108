mod calc;
mod config;
mod db;
mod error;
mod ipc;
mod logging;
mod model;
mod repo;
mod seed;

use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

/// School records sidecar: JSON requests on stdin, one response per line on
/// stdout.
#[derive(Parser, Debug)]
#[command(name = "schoold", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(long, env = "SCHOOLD_CONFIG")]
    config: Option<PathBuf>,

    /// Seed file loaded into the store at startup (overrides the config).
    #[arg(long, env = "SCHOOLD_SEED")]
    seed: Option<PathBuf>,

    /// Log level for the daemon's own events (overrides the config).
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Delay store calls the way a remote backend would.
    #[arg(long)]
    simulate_latency: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = config::DaemonConfig::load(args.config.as_deref())?;
    if let Some(seed) = args.seed {
        config.seed_path = Some(seed);
    }
    if let Some(level) = args.log_level {
        config.log.level = level;
    }
    config.log.json |= args.log_json;
    config.simulate_latency |= args.simulate_latency;

    logging::init_tracing(&config.log.level, config.log.json)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        seed = ?config.seed_path,
        simulate_latency = config.simulate_latency,
        "schoold starting"
    );

    let seed = config.seed_path.is_some();
    let mut state = ipc::AppState::open(config, seed)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "stdin read failed; shutting down");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                warn!(error = %e, "unparseable request line");
                ipc::bad_json(e.to_string())
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    info!("stdin closed; exiting");
    Ok(())
}
