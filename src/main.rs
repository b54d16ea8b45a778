mod access;
mod clock;
mod config;
mod db;
mod error;
mod gate;
mod ipc;
mod ledger;
mod students;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use config::Config;

#[derive(Parser)]
#[command(name = "attendd")]
#[command(about = "Student attendance check-in sidecar (JSON lines over stdio)")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "ATTENDD_CONFIG")]
    config: Option<PathBuf>,

    /// Workspace to open at startup (same as a workspace.select request)
    #[arg(short, long, env = "ATTENDD_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// IANA timezone that defines the attendance day (overrides config files)
    #[arg(long, env = "ATTENDD_TIMEZONE")]
    timezone: Option<String>,
}

fn main() -> anyhow::Result<()> {
    // stdout carries responses; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("attendd=info")),
        )
        .init();

    let cli = Cli::parse();

    let base_config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let mut state = ipc::AppState::new(base_config, cli.timezone, Box::new(clock::SystemClock))?;
    tracing::info!(timezone = %state.config.timezone, "attendd starting");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    if let Some(ws) = cli.workspace {
        let req = ipc::Request {
            id: "startup".to_string(),
            method: "workspace.select".to_string(),
            params: serde_json::json!({ "path": ws.to_string_lossy() }),
        };
        let resp = ipc::handle_request(&mut state, req);
        if resp.get("ok").and_then(|v| v.as_bool()) != Some(true) {
            anyhow::bail!("could not open workspace {}: {}", ws.display(), resp["error"]);
        }
    }

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id.
                tracing::warn!(error = %e, "unparseable request line");
                let resp = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", resp);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("attendd exiting");
    Ok(())
}
