// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! pyls-bridge is a Language Server Protocol adapter for Python.
//!
//! It exposes jedi's completion, navigation and refactoring, pyflakes and
//! pycodestyle diagnostics and optional mypy type checks to any LSP editor.
//! Refactorings come back from the engine as whole files and are turned into
//! minimal line edits with a line diff.

/// Documents, analysis handles and the language handler.
pub mod bridge;
/// Startup configuration and runtime settings.
pub mod config;
/// Line diffs and the text edits synthesized from them.
pub mod edits;
/// The analysis engine and its worker process.
pub mod engine;
/// LSP transport and dispatch.
pub mod lsp;
/// File path and URI conversions.
pub mod uri;
/// Diagnostics from the engine, pyflakes, pycodestyle and mypy.
pub mod validation;

#[cfg(test)]
mod testing;
