// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! pyflakes reports.

use lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range};
use serde::{Deserialize, Serialize};

use super::token_range;

/// One callback from pyflakes' reporter. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PyflakesReport {
    /// A regular finding, such as an unused import.
    Flake {
        /// Message class name, e.g. `UnusedImport`.
        category: String,
        line: u32,
        column: u32,
        message: String,
    },
    /// pyflakes could not parse the file.
    SyntaxError {
        message: String,
        line: u32,
        #[serde(default)]
        column: Option<u32>,
    },
    /// pyflakes failed for a reason unrelated to the code.
    UnexpectedError { message: String },
}

/// Converts reports into diagnostics.
///
/// Flakes whose category is in `error_categories` become errors, the rest
/// warnings. pyflakes' own syntax and unexpected errors are always errors.
#[must_use]
pub fn diagnostics<S: AsRef<str>>(
    reports: Vec<PyflakesReport>,
    lines: &[S],
    error_categories: &[String],
) -> Vec<Diagnostic> {
    reports
        .into_iter()
        .map(|report| {
            let (range, severity, message) = match report {
                PyflakesReport::Flake {
                    category,
                    line,
                    column,
                    message,
                } => {
                    let severity = if error_categories.contains(&category) {
                        DiagnosticSeverity::ERROR
                    } else {
                        DiagnosticSeverity::WARNING
                    };
                    (
                        token_range(lines, line.saturating_sub(1), column),
                        severity,
                        message,
                    )
                }
                PyflakesReport::SyntaxError {
                    message,
                    line,
                    column,
                } => (
                    token_range(lines, line.saturating_sub(1), column.unwrap_or(0)),
                    DiagnosticSeverity::ERROR,
                    message,
                ),
                PyflakesReport::UnexpectedError { message } => (
                    Range::new(Position::new(0, 0), Position::new(0, 0)),
                    DiagnosticSeverity::ERROR,
                    message,
                ),
            };
            Diagnostic {
                range,
                severity: Some(severity),
                source: Some("pyflakes".to_string()),
                message,
                ..Diagnostic::default()
            }
        })
        .collect()
}
