// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! pyls-bridge language server.
//!
//! Speaks LSP on stdin/stdout and logs to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pyls_bridge::bridge::Session;
use pyls_bridge::config::Config;
use pyls_bridge::engine::WorkerLauncher;
use pyls_bridge::lsp::{ClientSink, LanguageServer};

/// Command-line arguments for pyls-bridge.
#[derive(Parser, Debug)]
#[command(name = "pyls-bridge")]
#[command(about = "Python language server backed by jedi, pyflakes, pycodestyle and mypy")]
#[command(version = env!("PYLS_BRIDGE_VERSION"))]
struct Args {
    /// Path to configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Interpreter that runs the analysis worker and mypy.
    #[arg(long)]
    python: Option<String>,

    /// Command to run instead of the embedded analysis worker, e.g. "mockengine --crash-on-open".
    #[arg(long)]
    worker: Option<String>,

    /// Default log directive when RUST_LOG does not set one (e.g. "debug").
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let directive = args
        .log_level
        .as_deref()
        .map_or_else(|| "pyls_bridge=info".to_string(), |level| format!("pyls_bridge={level}"));
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(args.config)?;
    if let Some(python) = args.python {
        config.python = python;
    }
    if let Some(worker) = args.worker {
        let command: Vec<String> = worker.split_whitespace().map(str::to_string).collect();
        if command.is_empty() {
            anyhow::bail!("--worker command cannot be empty");
        }
        config.worker_command = Some(command);
    }
    info!("pyls-bridge {} starting", env!("PYLS_BRIDGE_VERSION"));

    let runtime = tokio::runtime::Handle::current();
    let launcher = WorkerLauncher::new(&config.python, config.worker_command.clone(), runtime.clone());
    let sink = ClientSink::stdout();
    let session = Session::new(config, Box::new(launcher), sink.clone(), runtime);

    // The dispatch loop blocks on stdin and on engine calls.
    let server_task = tokio::task::spawn_blocking(move || {
        let mut server = LanguageServer::new(session, sink);
        server.run(&mut std::io::stdin().lock())
    });

    let clean = tokio::select! {
        res = server_task => res.context("Language server task panicked")??,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            false
        }
    };

    if !clean {
        warn!("Exiting without a shutdown request");
        std::process::exit(1);
    }
    Ok(())
}
