// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! In-process fakes for the engine, the validators and the launcher.

#![allow(clippy::unwrap_used, reason = "Test fakes use unwrap for brevity")]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::engine::{
    AnalysisEngine, AnalysisHandle, Backends, Completion, EngineError, Environment, Launcher,
    Name, Refactoring, Signature, SymbolName, SyntaxErrorSpan,
};
use crate::validation::{
    PyflakesReport, StyleChecker, StyleFinding, StyleOptions, UnusedNameChecker,
};

/// What every handle opened by a [`FakeEngine`] answers.
#[derive(Debug, Clone, Default)]
pub struct FakeResponses {
    pub syntax_errors: Vec<SyntaxErrorSpan>,
    pub completions: Vec<Completion>,
    pub help: Vec<Name>,
    pub infer: Vec<Name>,
    pub signatures: Vec<Signature>,
    pub goto: Vec<Name>,
    pub references: Vec<Name>,
    pub names: Vec<SymbolName>,
    /// `None` answers inline with a refactoring error.
    pub inline: Option<Refactoring>,
}

#[derive(Default)]
struct EngineState {
    responses: FakeResponses,
    opened: usize,
    last_code: Option<String>,
    fail_open: bool,
    calls: Vec<String>,
}

/// Engine whose handles replay canned responses and record positional calls.
#[derive(Clone)]
pub struct FakeEngine {
    environment: Environment,
    state: Arc<Mutex<EngineState>>,
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self {
            environment: Environment {
                executable: PathBuf::from("/usr/bin/python3"),
                version: "3.12".to_string(),
                sys_path: vec!["/usr/lib/python3.12".to_string()],
            },
            state: Arc::default(),
        }
    }
}

impl FakeEngine {
    pub fn respond(&self, f: impl FnOnce(&mut FakeResponses)) {
        f(&mut self.state.lock().unwrap().responses);
    }

    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn last_opened_code(&self) -> Option<String> {
        self.state.lock().unwrap().last_code.clone()
    }

    pub fn fail_open(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    /// Positional calls as `method line:column`.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl AnalysisEngine for FakeEngine {
    fn environment(&self) -> &Environment {
        &self.environment
    }

    fn project_root(&self) -> Option<&Path> {
        None
    }

    fn open(&self, code: &str, _path: Option<&Path>) -> Result<Box<dyn AnalysisHandle>, EngineError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(EngineError::Unavailable("worker exited".to_string()));
        }
        state.opened += 1;
        state.last_code = Some(code.to_string());
        Ok(Box::new(FakeHandle {
            responses: state.responses.clone(),
            state: self.state.clone(),
        }))
    }
}

struct FakeHandle {
    responses: FakeResponses,
    state: Arc<Mutex<EngineState>>,
}

impl FakeHandle {
    fn record(&self, method: &str, line: u32, column: u32) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("{method} {line}:{column}"));
    }
}

impl AnalysisHandle for FakeHandle {
    fn syntax_errors(&self) -> Result<Vec<SyntaxErrorSpan>, EngineError> {
        Ok(self.responses.syntax_errors.clone())
    }

    fn complete(&self, line: u32, column: u32) -> Result<Vec<Completion>, EngineError> {
        self.record("complete", line, column);
        Ok(self.responses.completions.clone())
    }

    fn help(&self, line: u32, column: u32) -> Result<Vec<Name>, EngineError> {
        self.record("help", line, column);
        Ok(self.responses.help.clone())
    }

    fn infer(&self, line: u32, column: u32) -> Result<Vec<Name>, EngineError> {
        self.record("infer", line, column);
        Ok(self.responses.infer.clone())
    }

    fn signatures(&self, line: u32, column: u32) -> Result<Vec<Signature>, EngineError> {
        self.record("signatures", line, column);
        Ok(self.responses.signatures.clone())
    }

    fn goto(&self, line: u32, column: u32) -> Result<Vec<Name>, EngineError> {
        self.record("goto", line, column);
        Ok(self.responses.goto.clone())
    }

    fn references(&self, line: u32, column: u32) -> Result<Vec<Name>, EngineError> {
        self.record("references", line, column);
        Ok(self.responses.references.clone())
    }

    fn names(&self, _all_scopes: bool) -> Result<Vec<SymbolName>, EngineError> {
        Ok(self.responses.names.clone())
    }

    fn inline(&self, line: u32, column: u32) -> Result<Refactoring, EngineError> {
        self.record("inline", line, column);
        self.responses
            .inline
            .clone()
            .ok_or_else(|| EngineError::Refactoring("No name to inline here".to_string()))
    }
}

#[derive(Default)]
struct CheckerState {
    unused: Vec<PyflakesReport>,
    style: Vec<StyleFinding>,
    unused_calls: usize,
    style_calls: usize,
    style_options: Option<StyleOptions>,
}

/// pyflakes and pycodestyle stand-ins returning canned findings.
#[derive(Clone, Default)]
pub struct FakeCheckers {
    state: Arc<Mutex<CheckerState>>,
}

impl FakeCheckers {
    pub fn report(&self, unused: Vec<PyflakesReport>, style: Vec<StyleFinding>) {
        let mut state = self.state.lock().unwrap();
        state.unused = unused;
        state.style = style;
    }

    /// Number of pyflakes and pycodestyle runs.
    pub fn calls(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.unused_calls, state.style_calls)
    }

    /// Options of the last pycodestyle run.
    pub fn last_style_options(&self) -> Option<StyleOptions> {
        self.state.lock().unwrap().style_options.clone()
    }
}

impl UnusedNameChecker for FakeCheckers {
    fn unused_names(&self, _code: &str, _path: Option<&Path>) -> Result<Vec<PyflakesReport>, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.unused_calls += 1;
        Ok(state.unused.clone())
    }
}

impl StyleChecker for FakeCheckers {
    fn style_check(
        &self,
        _path: Option<&Path>,
        _lines: &[&str],
        options: &StyleOptions,
    ) -> Result<Vec<StyleFinding>, EngineError> {
        let mut state = self.state.lock().unwrap();
        state.style_calls += 1;
        state.style_options = Some(options.clone());
        Ok(state.style.clone())
    }
}

type Launch = (Option<PathBuf>, Option<PathBuf>);

/// Hands out the same fakes on every launch and records the arguments.
#[derive(Clone, Default)]
pub struct FakeLauncher {
    pub engine: FakeEngine,
    pub checkers: FakeCheckers,
    launches: Arc<Mutex<Vec<Launch>>>,
    fail: Arc<Mutex<bool>>,
}

impl FakeLauncher {
    pub fn launches(&self) -> Vec<Launch> {
        self.launches.lock().unwrap().clone()
    }

    pub fn fail_launch(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, venv: Option<&Path>, project_root: Option<&Path>) -> anyhow::Result<Backends> {
        if *self.fail.lock().unwrap() {
            anyhow::bail!("no interpreter at {venv:?}");
        }
        self.launches
            .lock()
            .unwrap()
            .push((venv.map(Path::to_path_buf), project_root.map(Path::to_path_buf)));
        Ok(Backends {
            engine: Box::new(self.engine.clone()),
            unused: Box::new(self.checkers.clone()),
            style: Box::new(self.checkers.clone()),
        })
    }
}
