// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! pycodestyle options and findings.

use lsp_types::{Diagnostic, DiagnosticSeverity, NumberOrString};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use super::token_range;

/// Project files pycodestyle reads its `[pycodestyle]` section from, in order.
pub const PROJECT_CONFIG_FILES: &[&str] = &["setup.cfg", "tox.ini", ".pycodestyle"];

/// Codes pycodestyle ignores unless told otherwise.
pub const DEFAULT_IGNORE: &[&str] = &["E121", "E123", "E126", "E226", "E24", "E704", "W503", "W504"];

/// Line length pycodestyle enforces unless told otherwise.
pub const DEFAULT_MAX_LINE_LENGTH: u32 = 79;

const SECTION: &str = "pycodestyle";

/// Effective pycodestyle options for one workspace folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleOptions {
    pub ignore: Vec<String>,
    pub select: Vec<String>,
    pub max_line_length: u32,
    pub max_doc_length: Option<u32>,
    pub hang_closing: bool,
}

impl Default for StyleOptions {
    fn default() -> Self {
        Self {
            ignore: DEFAULT_IGNORE.iter().map(|s| (*s).to_string()).collect(),
            select: Vec::new(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_doc_length: None,
            hang_closing: false,
        }
    }
}

/// Options as written in one file; unset keys keep earlier values.
#[derive(Debug, Default)]
struct RawOptions {
    ignore: Option<Vec<String>>,
    select: Option<Vec<String>>,
    max_line_length: Option<u32>,
    max_doc_length: Option<u32>,
    hang_closing: Option<bool>,
}

impl StyleOptions {
    /// Reads the options for `folder`, then applies `override_file` on top.
    ///
    /// Missing files are skipped. A file that cannot be parsed is logged and
    /// skipped, so a broken `setup.cfg` never disables style checking.
    #[must_use]
    pub fn load(folder: Option<&Path>, override_file: Option<&Path>) -> Self {
        let mut raw = RawOptions::default();

        let project_files = folder
            .into_iter()
            .flat_map(|dir| PROJECT_CONFIG_FILES.iter().map(move |name| dir.join(name)));
        for path in project_files.chain(override_file.map(Path::to_path_buf)) {
            if !path.is_file() {
                continue;
            }
            match read_section(&path) {
                Ok(file) => raw.merge(file),
                Err(e) => warn!("Skipping pycodestyle config {}: {e}", path.display()),
            }
        }

        Self::from_raw(raw)
    }

    fn from_raw(raw: RawOptions) -> Self {
        let select = raw.select.unwrap_or_default();
        let ignore = if !select.is_empty() {
            // Selecting codes ignores everything that was not selected.
            vec![String::new()]
        } else {
            raw.ignore
                .unwrap_or_else(|| DEFAULT_IGNORE.iter().map(|s| (*s).to_string()).collect())
        };
        Self {
            ignore,
            select,
            max_line_length: raw.max_line_length.unwrap_or(DEFAULT_MAX_LINE_LENGTH),
            max_doc_length: raw.max_doc_length,
            hang_closing: raw.hang_closing.unwrap_or(false),
        }
    }

    /// Whether findings with `code` are suppressed.
    #[must_use]
    pub fn is_ignored(&self, code: &str) -> bool {
        self.ignore.iter().any(|prefix| code.starts_with(prefix.as_str()))
            && !self.select.iter().any(|prefix| code.starts_with(prefix.as_str()))
    }
}

impl RawOptions {
    fn merge(&mut self, other: Self) {
        if other.ignore.is_some() {
            self.ignore = other.ignore;
        }
        if other.select.is_some() {
            self.select = other.select;
        }
        if other.max_line_length.is_some() {
            self.max_line_length = other.max_line_length;
        }
        if other.max_doc_length.is_some() {
            self.max_doc_length = other.max_doc_length;
        }
        if other.hang_closing.is_some() {
            self.hang_closing = other.hang_closing;
        }
    }
}

fn read_section(path: &Path) -> Result<RawOptions, config::ConfigError> {
    let file = config::Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Ini))
        .build()?;

    let key = |name: &str| format!("{SECTION}.{name}");
    let list = |name: &str| -> Option<Vec<String>> {
        file.get_string(&key(name)).ok().map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .collect()
        })
    };
    let number = |name: &str| -> Result<Option<u32>, config::ConfigError> {
        match file.get_string(&key(name)) {
            Ok(value) => value.trim().parse().map(Some).map_err(|_| {
                config::ConfigError::Message(format!("{name} must be a number, got '{value}'"))
            }),
            Err(config::ConfigError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    };

    Ok(RawOptions {
        ignore: list("ignore"),
        select: list("select"),
        max_line_length: number("max-line-length")?,
        max_doc_length: number("max-doc-length")?,
        hang_closing: file.get_bool(&key("hang-closing")).ok(),
    })
}

/// One pycodestyle finding. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleFinding {
    pub line: u32,
    pub column: u32,
    /// Code followed by the message, e.g. `E501 line too long (88 > 79 characters)`.
    pub text: String,
}

impl StyleFinding {
    /// The check code: the first four characters of the text.
    #[must_use]
    pub fn code(&self) -> &str {
        self.text.get(..4).unwrap_or(&self.text)
    }
}

/// Converts findings that survive the options' filters into warnings.
#[must_use]
pub fn diagnostics<S: AsRef<str>>(
    findings: Vec<StyleFinding>,
    lines: &[S],
    options: &StyleOptions,
) -> Vec<Diagnostic> {
    findings
        .into_iter()
        .filter(|finding| !options.is_ignored(finding.code()))
        .map(|finding| {
            let code = finding.code().to_string();
            Diagnostic {
                range: token_range(lines, finding.line.saturating_sub(1), finding.column),
                severity: Some(DiagnosticSeverity::WARNING),
                code: Some(NumberOrString::String(code)),
                source: Some("pycodestyle".to_string()),
                message: finding.text,
                ..Diagnostic::default()
            }
        })
        .collect()
}

/// Per-folder options, keyed by workspace folder.
pub type StyleOptionsCache = super::FolderCache<StyleOptions>;
