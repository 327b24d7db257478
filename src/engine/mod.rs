// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Interface to the Python analysis engine.
//!
//! The engine is reached through an analysis worker process. Everything
//! above this module talks to the [`AnalysisEngine`] and [`AnalysisHandle`]
//! traits, so tests can substitute in-process fakes.
//!
//! Line numbers passed to and returned from the engine are 1-based; columns
//! are 0-based.

/// Worker-backed engine and validators.
pub mod jedi;
/// JSON-RPC client for the analysis worker process.
pub mod worker;

pub use jedi::{JediEngine, WorkerLauncher};
pub use worker::WorkerClient;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::validation::{StyleChecker, UnusedNameChecker};

/// Errors surfaced by the analysis engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The requested refactoring does not apply at the given position.
    #[error("refactoring not applicable: {0}")]
    Refactoring(String),
    /// The worker reported a failure while handling a request.
    #[error("analysis worker error: {0}")]
    Worker(String),
    /// The worker could not be reached (exited, timed out, or the pipe broke).
    #[error("analysis worker unavailable: {0}")]
    Unavailable(String),
    /// The worker answered with a payload of the wrong shape.
    #[error("malformed worker response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The Python environment the engine analyzes against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Interpreter of the environment.
    pub executable: PathBuf,
    /// `major.minor` version of the interpreter.
    pub version: String,
    /// The interpreter's module search path.
    #[serde(default)]
    pub sys_path: Vec<String>,
}

/// A syntax error reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxErrorSpan {
    pub line: u32,
    pub column: u32,
    pub until_line: u32,
    pub until_column: u32,
}

/// The engine's classification of a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameKind {
    Module,
    Class,
    Instance,
    Function,
    Param,
    Path,
    Keyword,
    Property,
    Statement,
    /// Classes synthesized by the engine for stub trees.
    #[serde(rename = "_pseudotreenameclass")]
    PseudoClass,
    #[serde(other)]
    Other,
}

/// Kind of a callable's parameter, named as Python's `inspect` names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    VarPositional,
    KeywordOnly,
    VarKeyword,
}

/// One parameter of a signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureParam {
    pub name: String,
    pub kind: ParamKind,
    /// Rendered parameter, e.g. `param x=1`.
    #[serde(default)]
    pub description: String,
}

impl SignatureParam {
    /// Whether the parameter declares a default value.
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.description.contains('=')
    }
}

/// A call signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Rendered signature, e.g. `f(a, b=1)`.
    pub label: String,
    /// Index of the parameter under the cursor, if any.
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default)]
    pub params: Vec<SignatureParam>,
}

/// A completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub name: String,
    /// Text that completes the partially typed name.
    pub complete: String,
    #[serde(rename = "type")]
    pub kind: NameKind,
    #[serde(default)]
    pub docstring: String,
    #[serde(default)]
    pub signatures: Vec<Signature>,
}

/// A definition, reference or inferred name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub name: String,
    #[serde(default)]
    pub module_path: Option<PathBuf>,
    pub line: u32,
    pub column: u32,
    #[serde(default)]
    pub docstring: String,
}

/// A name defined in a document, as listed for document symbols.
///
/// Names arrive in order of appearance, so a parent precedes its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolName {
    pub id: u32,
    #[serde(default)]
    pub parent_id: Option<u32>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NameKind,
    pub line: u32,
    pub column: u32,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub parent_full_name: Option<String>,
    #[serde(default)]
    pub module_name: String,
}

/// Old and new content of one file touched by a refactoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub old_code: String,
    pub new_code: String,
}

/// Result of a refactoring: every file it touches, ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refactoring {
    pub changed_files: BTreeMap<PathBuf, ChangedFile>,
}

/// Entry point to the analysis engine.
///
/// The environment and project root are fixed when the engine starts.
pub trait AnalysisEngine: Send + Sync {
    /// The environment the engine analyzes against.
    fn environment(&self) -> &Environment;

    /// The project root the engine resolves imports from.
    fn project_root(&self) -> Option<&Path>;

    /// Creates an analysis session bound to `code`.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot create the session.
    fn open(&self, code: &str, path: Option<&Path>)
    -> Result<Box<dyn AnalysisHandle>, EngineError>;
}

/// An analysis session bound to one version of a document's text.
#[allow(clippy::missing_errors_doc, reason = "every method fails only with EngineError")]
pub trait AnalysisHandle: Send {
    fn syntax_errors(&self) -> Result<Vec<SyntaxErrorSpan>, EngineError>;
    fn complete(&self, line: u32, column: u32) -> Result<Vec<Completion>, EngineError>;
    /// Names under the cursor, with full help text.
    fn help(&self, line: u32, column: u32) -> Result<Vec<Name>, EngineError>;
    /// Inferred values of the name under the cursor.
    fn infer(&self, line: u32, column: u32) -> Result<Vec<Name>, EngineError>;
    fn signatures(&self, line: u32, column: u32) -> Result<Vec<Signature>, EngineError>;
    fn goto(&self, line: u32, column: u32) -> Result<Vec<Name>, EngineError>;
    fn references(&self, line: u32, column: u32) -> Result<Vec<Name>, EngineError>;
    fn names(&self, all_scopes: bool) -> Result<Vec<SymbolName>, EngineError>;
    /// Inlines the variable under the cursor.
    ///
    /// Fails with [`EngineError::Refactoring`] when there is nothing to inline.
    fn inline(&self, line: u32, column: u32) -> Result<Refactoring, EngineError>;
}

/// The engine and the two validators that share its worker.
pub struct Backends {
    pub engine: Box<dyn AnalysisEngine>,
    pub unused: Box<dyn UnusedNameChecker>,
    pub style: Box<dyn StyleChecker>,
}

/// Starts the analysis backends once the editor has chosen an environment.
pub trait Launcher: Send {
    /// Starts the backends for the virtual environment `venv` (the default
    /// environment when `None`) and the project rooted at `project_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backends cannot be started.
    fn launch(&self, venv: Option<&Path>, project_root: Option<&Path>) -> anyhow::Result<Backends>;
}
