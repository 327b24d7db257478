// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Diagnostics for one document: engine syntax errors, pyflakes,
//! pycodestyle and (in the background) mypy.

/// pycodestyle options and findings.
pub mod style;
/// mypy runs and their scheduling.
pub mod type_check;
/// pyflakes reports.
pub mod unused;

pub use style::{StyleFinding, StyleOptions};
pub use type_check::{TypeCheckJob, TypeCheckScheduler};
pub use unused::PyflakesReport;

use lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::bridge::DocumentHandle;
use crate::engine::{EngineError, SyntaxErrorSpan};

/// The unused-name checker (pyflakes).
pub trait UnusedNameChecker: Send + Sync {
    /// Checks `code` and returns every reporter callback in order.
    ///
    /// # Errors
    ///
    /// Returns an error if the checker cannot be reached.
    fn unused_names(&self, code: &str, path: Option<&Path>)
    -> Result<Vec<PyflakesReport>, EngineError>;
}

/// The style checker (pycodestyle).
pub trait StyleChecker: Send + Sync {
    /// Runs every check over `lines`; filtering by code is left to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the checker cannot be reached.
    fn style_check(
        &self,
        path: Option<&Path>,
        lines: &[&str],
        options: &StyleOptions,
    ) -> Result<Vec<StyleFinding>, EngineError>;
}

/// Range of a finding that starts at `column` and runs to the end of its line.
///
/// The end never precedes the start. A line past the end of the buffer
/// yields an empty range at the start position.
pub(crate) fn token_range<S: AsRef<str>>(lines: &[S], line: u32, column: u32) -> Range {
    let start = Position::new(line, column);
    let end = lines.get(line as usize).map_or(column, |text| {
        let text = text.as_ref().trim_end_matches(['\n', '\r']);
        u32::try_from(text.encode_utf16().count())
            .unwrap_or(u32::MAX)
            .max(column)
    });
    Range::new(start, Position::new(line, end))
}

/// Diagnostics for engine syntax errors.
#[must_use]
pub fn syntax_diagnostics(errors: &[SyntaxErrorSpan]) -> Vec<Diagnostic> {
    errors
        .iter()
        .map(|e| Diagnostic {
            range: Range::new(
                Position::new(e.line.saturating_sub(1), e.column),
                Position::new(e.until_line.saturating_sub(1), e.until_column),
            ),
            severity: Some(DiagnosticSeverity::ERROR),
            source: Some("jedi".to_string()),
            message: "Invalid syntax".to_string(),
            ..Diagnostic::default()
        })
        .collect()
}

/// Outcome of the synchronous validation stages.
#[derive(Debug, Clone, PartialEq)]
pub enum Validation {
    /// The document does not parse; nothing else was checked.
    SyntaxErrors(Vec<Diagnostic>),
    /// pyflakes and pycodestyle findings, in that order.
    Findings(Vec<Diagnostic>),
}

impl Validation {
    /// The diagnostics to publish.
    #[must_use]
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        match self {
            Self::SyntaxErrors(diagnostics) | Self::Findings(diagnostics) => diagnostics,
        }
    }

    /// Whether the pass stopped at syntax errors.
    #[must_use]
    pub const fn is_syntax_error(&self) -> bool {
        matches!(self, Self::SyntaxErrors(_))
    }
}

/// Runs the engine, pyflakes and pycodestyle stages against a document.
pub struct Validator<'a> {
    pub unused: &'a dyn UnusedNameChecker,
    pub style: &'a dyn StyleChecker,
    /// pyflakes categories reported as errors.
    pub error_categories: &'a [String],
}

impl Validator<'_> {
    /// Validates the document behind `handle`.
    ///
    /// Syntax errors end the pass: when the engine reports any, they are the
    /// only diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine or a checker cannot be reached.
    pub fn run(
        &self,
        handle: &DocumentHandle,
        path: Option<&Path>,
        style_options: &StyleOptions,
    ) -> Result<Validation, EngineError> {
        let syntax_errors = handle.analysis().syntax_errors()?;
        if !syntax_errors.is_empty() {
            debug!(
                "{} syntax errors in {}",
                syntax_errors.len(),
                handle.uri().as_str()
            );
            return Ok(Validation::SyntaxErrors(syntax_diagnostics(&syntax_errors)));
        }

        let lines = handle.lines();
        let reports = self.unused.unused_names(&handle.text(), path)?;
        let mut diagnostics = unused::diagnostics(reports, lines, self.error_categories);

        let source_lines: Vec<&str> = handle.source_lines().iter().map(String::as_str).collect();
        let findings = self.style.style_check(path, &source_lines, style_options)?;
        diagnostics.extend(style::diagnostics(findings, lines, style_options));

        Ok(Validation::Findings(diagnostics))
    }
}

/// Values derived per workspace folder, recomputed when the settings
/// revision they were computed under moves on.
#[derive(Debug)]
pub struct FolderCache<V> {
    entries: HashMap<Option<PathBuf>, (u64, V)>,
}

impl<V> Default for FolderCache<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<V> FolderCache<V> {
    /// Returns the value for `folder`, computing it with `load` if absent or
    /// stale for `revision`.
    pub fn get_or_load<F>(&mut self, folder: Option<&Path>, revision: u64, load: F) -> &V
    where
        F: FnOnce() -> V,
    {
        match self.entries.entry(folder.map(Path::to_path_buf)) {
            Entry::Occupied(mut slot) => {
                if slot.get().0 != revision {
                    debug!("Recomputing folder cache entry for {:?}", folder);
                    slot.insert((revision, load()));
                }
                &slot.into_mut().1
            }
            Entry::Vacant(slot) => &slot.insert((revision, load())).1,
        }
    }
}
