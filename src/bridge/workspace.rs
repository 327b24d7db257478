// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Workspace root and folders, as announced by the editor.

use lsp_types::{InitializeParams, Uri, WorkspaceFolder, WorkspaceFoldersChangeEvent};
use std::path::PathBuf;
use tracing::debug;

use crate::uri::uri_to_path;

/// The editor's workspace: a root plus any number of folders.
#[derive(Debug, Clone, Default)]
pub struct Workspace {
    root: Option<PathBuf>,
    folders: Vec<WorkspaceFolder>,
}

impl Workspace {
    /// Reads the root and folders from `initialize`.
    ///
    /// The root is the root URI, falling back to the legacy root path and
    /// then to the first workspace folder.
    #[allow(deprecated, reason = "rootUri and rootPath are still sent by many editors")]
    pub fn from_initialize(params: &InitializeParams) -> Self {
        let folders = params.workspace_folders.clone().unwrap_or_default();
        let root = params
            .root_uri
            .as_ref()
            .and_then(uri_to_path)
            .or_else(|| params.root_path.as_ref().map(PathBuf::from))
            .or_else(|| folders.first().and_then(|f| uri_to_path(&f.uri)));
        debug!("Workspace root: {:?}, {} folders", root, folders.len());
        Self { root, folders }
    }

    pub fn root_path(&self) -> Option<&std::path::Path> {
        self.root.as_deref()
    }

    /// Applies a `workspace/didChangeWorkspaceFolders` event.
    pub fn apply(&mut self, event: WorkspaceFoldersChangeEvent) {
        self.folders
            .retain(|folder| !event.removed.iter().any(|r| r.uri == folder.uri));
        for folder in event.added {
            if !self.folders.iter().any(|f| f.uri == folder.uri) {
                debug!("Workspace folder added: {}", folder.uri.as_str());
                self.folders.push(folder);
            }
        }
    }

    /// Path of the deepest workspace folder containing `uri`, or the root
    /// when no folder does.
    ///
    /// Containment respects path boundaries: `/proj` does not contain
    /// `/project/a.py`.
    pub fn folder_path_for(&self, uri: &Uri) -> Option<PathBuf> {
        let document = uri.as_str();
        self.folders
            .iter()
            .filter(|folder| contains(folder.uri.as_str(), document))
            .max_by_key(|folder| folder.uri.as_str().len())
            .and_then(|folder| uri_to_path(&folder.uri))
            .or_else(|| self.root.clone())
    }
}

fn contains(folder: &str, document: &str) -> bool {
    document.strip_prefix(folder).is_some_and(|rest| {
        rest.is_empty() || rest.starts_with('/') || folder.ends_with('/')
    })
}
