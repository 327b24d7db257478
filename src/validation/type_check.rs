// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! mypy runs, one background task per document.

use lsp_types::{Diagnostic, DiagnosticSeverity, MessageType, Uri};
use std::collections::HashMap;
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::token_range;
use crate::lsp::ClientSink;

/// Config files mypy looks for in the project folder, in order.
pub const PROJECT_CONFIG_FILES: &[&str] = &["mypy.ini", ".mypy.ini", "pyproject.toml", "setup.cfg"];

/// The user-level config files mypy falls back to, in order.
#[must_use]
pub fn user_config_files() -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        files.push(PathBuf::from(xdg).join("mypy").join("config"));
    }
    if let Some(home) = dirs::home_dir() {
        files.push(home.join(".config").join("mypy").join("config"));
        files.push(home.join(".mypy.ini"));
    }
    files
}

/// Finds the config file mypy would use for `folder`.
///
/// Returns an empty string when there is none; mypy accepts that as "no
/// config file".
#[must_use]
pub fn find_config_file(folder: Option<&Path>) -> String {
    find_config_file_among(folder, &user_config_files())
}

fn find_config_file_among(folder: Option<&Path>, user_files: &[PathBuf]) -> String {
    folder
        .into_iter()
        .flat_map(|dir| PROJECT_CONFIG_FILES.iter().map(move |name| dir.join(name)))
        .chain(user_files.iter().cloned())
        .find(|path| path.exists())
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Parses mypy's `path:row:column:severity:message` output.
///
/// Lines that do not have all five fields, have non-numeric positions, or
/// name another file are skipped.
#[must_use]
pub fn parse_output<S: AsRef<str>>(stdout: &str, file: &Path, lines: &[S]) -> Vec<Diagnostic> {
    let file = file.to_string_lossy();
    stdout
        .split('\n')
        .filter_map(|line| {
            let mut parts = line.splitn(5, ':');
            let (Some(name), Some(row), Some(column), Some(severity), Some(message)) = (
                parts.next(),
                parts.next(),
                parts.next(),
                parts.next(),
                parts.next(),
            ) else {
                return None;
            };
            if name != file {
                return None;
            }
            let row = row.trim().parse::<u32>().ok()?.saturating_sub(1);
            let column = column.trim().parse::<u32>().ok()?.saturating_sub(1);
            let severity = if severity.trim() == "note" {
                DiagnosticSeverity::HINT
            } else {
                DiagnosticSeverity::WARNING
            };
            Some(Diagnostic {
                range: token_range(lines, row, column),
                severity: Some(severity),
                source: Some("mypy".to_string()),
                message: message.trim().to_string(),
                ..Diagnostic::default()
            })
        })
        .collect()
}

/// Everything one mypy run needs, detached from the session.
#[derive(Debug, Clone)]
pub struct TypeCheckJob {
    /// Interpreter that has mypy installed.
    pub python: String,
    /// Interpreter of the analyzed environment.
    pub target_executable: PathBuf,
    /// `major.minor` version of the analyzed environment.
    pub target_version: String,
    /// Config file path, or empty for none.
    pub config_file: String,
    pub file: PathBuf,
    /// Document lines the findings are ranged against.
    pub lines: Vec<String>,
}

impl TypeCheckJob {
    /// Arguments after `<python>`.
    #[must_use]
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-m".into(),
            "mypy".into(),
            "--python-executable".into(),
            self.target_executable.clone().into_os_string(),
            "--python-version".into(),
            self.target_version.clone().into(),
            "--config-file".into(),
            self.config_file.clone().into(),
        ];
        args.extend(
            [
                "--hide-error-context",
                "--show-column-numbers",
                "--show-error-codes",
                "--no-pretty",
                "--show-absolute-path",
                "--no-error-summary",
            ]
            .map(OsString::from),
        );
        args.push(self.file.clone().into_os_string());
        args
    }

    /// Runs mypy and returns its findings for the job's file.
    ///
    /// Failures are reported to the editor and yield no findings: a process
    /// that cannot be run becomes a warning, output on stderr an error.
    pub async fn run(self, sink: ClientSink) -> Vec<Diagnostic> {
        debug!("Running mypy on {}", self.file.display());
        let output = Command::new(&self.python)
            .args(self.args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                warn!("mypy check error: {e}");
                sink.show_message(MessageType::WARNING, format!("mypy check error: {e}"));
                return Vec::new();
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            sink.show_message(MessageType::ERROR, stderr.into_owned());
            return Vec::new();
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!("mypy output: {}", stdout);
        parse_output(&stdout, &self.file, &self.lines)
    }
}

/// Runs at most one type check per document.
///
/// Scheduling or cancelling moves the document to a new generation and
/// aborts the task in flight. A task that completes anyway publishes only if
/// its generation is still current. Generations are never reused, even for
/// a document that was forgotten and opened again.
pub struct TypeCheckScheduler {
    runtime: Handle,
    generations: Arc<Mutex<HashMap<Uri, u64>>>,
    last_generation: u64,
    tasks: HashMap<Uri, JoinHandle<()>>,
}

impl TypeCheckScheduler {
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            generations: Arc::new(Mutex::new(HashMap::new())),
            last_generation: 0,
            tasks: HashMap::new(),
        }
    }

    /// Runs `check` in the background and hands its findings to `publish`
    /// unless the document has moved on by then.
    pub fn schedule<C, P>(&mut self, uri: Uri, check: C, publish: P)
    where
        C: Future<Output = Vec<Diagnostic>> + Send + 'static,
        P: FnOnce(Vec<Diagnostic>) + Send + 'static,
    {
        let generation = self.cancel(&uri);
        self.tasks.retain(|_, task| !task.is_finished());

        let generations = self.generations.clone();
        let task_uri = uri.clone();
        let task = self.runtime.spawn(async move {
            let findings = check.await;
            let Ok(current) = generations.lock() else {
                warn!("Type check generations poisoned");
                return;
            };
            // Publish under the lock so a concurrent cancel cannot slip in.
            if current.get(&task_uri) == Some(&generation) {
                publish(findings);
            } else {
                debug!("Discarding stale type check for {}", task_uri.as_str());
            }
        });
        self.tasks.insert(uri, task);
    }

    /// Aborts any type check for `uri` and returns the new generation.
    pub fn cancel(&mut self, uri: &Uri) -> u64 {
        if let Some(task) = self.tasks.remove(uri) {
            task.abort();
        }
        self.last_generation += 1;
        let generation = self.last_generation;
        self.lock_generations().insert(uri.clone(), generation);
        generation
    }

    /// Aborts any type check for a closed document and drops its entry.
    pub fn forget(&mut self, uri: &Uri) {
        if let Some(task) = self.tasks.remove(uri) {
            task.abort();
        }
        self.lock_generations().remove(uri);
    }

    fn lock_generations(&self) -> MutexGuard<'_, HashMap<Uri, u64>> {
        match self.generations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Aborts every type check.
    pub fn cancel_all(&mut self) {
        let uris: Vec<Uri> = self.tasks.keys().cloned().collect();
        for uri in uris {
            self.cancel(&uri);
        }
    }

    /// Current generation of `uri` (0 if never scheduled or forgotten).
    #[must_use]
    pub fn generation(&self, uri: &Uri) -> u64 {
        self.generations
            .lock()
            .map_or(0, |generations| generations.get(uri).copied().unwrap_or(0))
    }

    /// Whether a task for `uri` is still running.
    #[must_use]
    pub fn is_running(&self, uri: &Uri) -> bool {
        self.tasks.get(uri).is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TypeCheckScheduler {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.abort();
        }
    }
}
