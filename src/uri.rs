// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Conversions between file paths and document URIs.

use anyhow::{Result, anyhow};
use lsp_types::Uri;
use std::path::{Path, PathBuf};

/// Builds a `file://` URI for an absolute path, percent-encoding as needed.
///
/// # Errors
///
/// Returns an error if the path is relative or cannot be expressed as a URI.
pub fn path_to_uri(path: &Path) -> Result<Uri> {
    let url = url::Url::from_file_path(path)
        .map_err(|()| anyhow!("Invalid path for URI: {}", path.display()))?;
    url.as_str()
        .parse()
        .map_err(|e| anyhow!("Invalid path for URI: {}: {}", path.display(), e))
}

/// Returns the filesystem path of a `file://` URI.
#[must_use]
pub fn uri_to_path(uri: &Uri) -> Option<PathBuf> {
    url::Url::parse(uri.as_str()).ok()?.to_file_path().ok()
}
