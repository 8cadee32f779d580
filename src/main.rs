mod auth;
mod cgpa;
mod config;
mod db;
mod http;
mod ipc;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[derive(Parser, Debug)]
#[command(
    name = "academicd",
    version,
    about = "Student records and CGPA planning daemon"
)]
struct Cli {
    /// Workspace directory holding the student database
    #[arg(long, env = "ACADEMICD_WORKSPACE", global = true)]
    workspace: Option<PathBuf>,
    /// Without a subcommand, serve JSON requests line by line on stdin/stdout
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the REST API over HTTP
    Serve {
        #[arg(long, env = "ACADEMICD_HOST", default_value = config::DEFAULT_HOST)]
        host: String,
        #[arg(long, env = "ACADEMICD_PORT", default_value_t = config::DEFAULT_PORT)]
        port: u16,
        /// Allowed CORS origin (repeatable); any origin when omitted
        #[arg(long = "cors-origin")]
        cors_origins: Vec<String>,
    },
}

fn init_tracing() {
    // stdout carries the IPC protocol, so logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run_stdio(mut state: ipc::AppState) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

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
                let reply = json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", reply);
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
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    let mut state = ipc::AppState::default();
    if let Some(workspace) = &cli.workspace {
        state
            .open_workspace(workspace)
            .with_context(|| format!("failed to open workspace {}", workspace.to_string_lossy()))?;
        tracing::info!(workspace = %workspace.to_string_lossy(), "workspace opened");
    }

    match cli.command {
        None => {
            run_stdio(state);
            Ok(())
        }
        Some(Command::Serve {
            host,
            port,
            cors_origins,
        }) => {
            let config = ServerConfig {
                host,
                port,
                cors_origins,
            };
            let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
            runtime.block_on(http::serve(config, state))
        }
    }
}
