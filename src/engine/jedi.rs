// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Engine and validators backed by the analysis worker.
//!
//! Calls block on the worker client's async requests, so they must be made
//! from a blocking thread (the dispatch loop runs in `spawn_blocking`).

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::{
    AnalysisEngine, AnalysisHandle, Backends, Completion, EngineError, Environment, Launcher,
    Name, Refactoring, Signature, SymbolName, SyntaxErrorSpan, WorkerClient,
};
use crate::validation::style::{StyleFinding, StyleOptions};
use crate::validation::unused::PyflakesReport;
use crate::validation::{StyleChecker, UnusedNameChecker};

/// The default worker, run with `<python> -c`.
pub const WORKER_SCRIPT: &str = include_str!("worker.py");

/// Worker client plus the runtime used to drive it from blocking code.
struct Connection {
    client: WorkerClient,
    runtime: Handle,
}

impl Connection {
    fn call<P: serde::Serialize, R: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, EngineError> {
        self.runtime.block_on(self.client.request(method, params))
    }
}

/// Starts analysis workers.
pub struct WorkerLauncher {
    command: Vec<String>,
    runtime: Handle,
}

impl WorkerLauncher {
    /// Launches `worker_command` when given, otherwise the embedded worker
    /// script under `python`.
    #[must_use]
    pub fn new(python: &str, worker_command: Option<Vec<String>>, runtime: Handle) -> Self {
        let command = worker_command.unwrap_or_else(|| {
            vec![
                python.to_string(),
                "-c".to_string(),
                WORKER_SCRIPT.to_string(),
            ]
        });
        Self { command, runtime }
    }
}

impl Launcher for WorkerLauncher {
    fn launch(&self, venv: Option<&Path>, project_root: Option<&Path>) -> Result<Backends> {
        let (program, args) = self
            .command
            .split_first()
            .context("worker command is empty")?;
        debug!("Spawning analysis worker: {}", program);

        let client = self
            .runtime
            .block_on(WorkerClient::spawn(program, args))?;
        let connection = Arc::new(Connection {
            client,
            runtime: self.runtime.clone(),
        });

        let environment: Environment = connection
            .call(
                "initialize",
                json!({ "venv": venv, "project_root": project_root }),
            )
            .context("analysis worker failed to initialize")?;

        info!(
            "Engine environment python: {}",
            environment.executable.display()
        );
        info!("Engine environment sys_path:");
        for entry in &environment.sys_path {
            info!("  {}", entry);
        }
        match project_root {
            Some(root) => info!("Engine project path: {}", root.display()),
            None => info!("Engine project path: <none>"),
        }

        Ok(Backends {
            engine: Box::new(JediEngine {
                connection: connection.clone(),
                environment,
                project_root: project_root.map(Path::to_path_buf),
            }),
            unused: Box::new(WorkerCheckers {
                connection: connection.clone(),
            }),
            style: Box::new(WorkerCheckers { connection }),
        })
    }
}

/// The analysis engine, reached through the worker.
pub struct JediEngine {
    connection: Arc<Connection>,
    environment: Environment,
    project_root: Option<PathBuf>,
}

#[derive(Deserialize)]
struct Opened {
    handle: u64,
}

impl AnalysisEngine for JediEngine {
    fn environment(&self) -> &Environment {
        &self.environment
    }

    fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    fn open(
        &self,
        code: &str,
        path: Option<&Path>,
    ) -> Result<Box<dyn AnalysisHandle>, EngineError> {
        let opened: Opened = self
            .connection
            .call("script/open", json!({ "code": code, "path": path }))?;
        Ok(Box::new(WorkerScript {
            connection: self.connection.clone(),
            handle: opened.handle,
        }))
    }
}

/// A script held by the worker. Released when dropped.
struct WorkerScript {
    connection: Arc<Connection>,
    handle: u64,
}

impl WorkerScript {
    fn at<R: DeserializeOwned>(&self, method: &str, line: u32, column: u32) -> Result<R, EngineError> {
        self.connection.call(
            method,
            json!({ "handle": self.handle, "line": line, "column": column }),
        )
    }
}

impl AnalysisHandle for WorkerScript {
    fn syntax_errors(&self) -> Result<Vec<SyntaxErrorSpan>, EngineError> {
        self.connection
            .call("script/syntax_errors", json!({ "handle": self.handle }))
    }

    fn complete(&self, line: u32, column: u32) -> Result<Vec<Completion>, EngineError> {
        self.at("script/complete", line, column)
    }

    fn help(&self, line: u32, column: u32) -> Result<Vec<Name>, EngineError> {
        self.at("script/help", line, column)
    }

    fn infer(&self, line: u32, column: u32) -> Result<Vec<Name>, EngineError> {
        self.at("script/infer", line, column)
    }

    fn signatures(&self, line: u32, column: u32) -> Result<Vec<Signature>, EngineError> {
        self.at("script/signatures", line, column)
    }

    fn goto(&self, line: u32, column: u32) -> Result<Vec<Name>, EngineError> {
        self.at("script/goto", line, column)
    }

    fn references(&self, line: u32, column: u32) -> Result<Vec<Name>, EngineError> {
        self.at("script/references", line, column)
    }

    fn names(&self, all_scopes: bool) -> Result<Vec<SymbolName>, EngineError> {
        self.connection.call(
            "script/names",
            json!({ "handle": self.handle, "all_scopes": all_scopes }),
        )
    }

    fn inline(&self, line: u32, column: u32) -> Result<Refactoring, EngineError> {
        self.at("script/inline", line, column)
    }
}

impl Drop for WorkerScript {
    fn drop(&mut self) {
        if let Err(e) = self
            .connection
            .client
            .notify("script/release", json!({ "handle": self.handle }))
        {
            debug!("Could not release worker script {}: {}", self.handle, e);
        }
    }
}

/// pyflakes and pycodestyle, run inside the worker.
struct WorkerCheckers {
    connection: Arc<Connection>,
}

impl UnusedNameChecker for WorkerCheckers {
    fn unused_names(
        &self,
        code: &str,
        path: Option<&Path>,
    ) -> Result<Vec<PyflakesReport>, EngineError> {
        self.connection
            .call("pyflakes/check", json!({ "code": code, "path": path }))
    }
}

impl StyleChecker for WorkerCheckers {
    fn style_check(
        &self,
        path: Option<&Path>,
        lines: &[&str],
        options: &StyleOptions,
    ) -> Result<Vec<StyleFinding>, EngineError> {
        self.connection.call(
            "pycodestyle/check",
            json!({ "path": path, "lines": lines, "options": options }),
        )
    }
}
