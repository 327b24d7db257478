// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Turns a refactoring's changed files into versioned document edits.

use anyhow::{Context, Result};
use lsp_types::{OneOf, OptionalVersionedTextDocumentIdentifier, TextDocumentEdit, Uri};

use super::text_edits;
use crate::engine::Refactoring;
use crate::uri::path_to_uri;

/// Builds one edit group per file the refactoring actually changes.
///
/// Files are visited in path order. `version_of` supplies the version of a
/// document the editor has open, or `None` for files that are not open.
/// Files whose old and new content produce no edits are left out, so an
/// empty result means the refactoring has nothing to do.
///
/// # Errors
///
/// Returns an error if a file's edits cannot be computed or its path cannot
/// be turned into a URI.
pub fn document_changes<F>(refactoring: &Refactoring, version_of: F) -> Result<Vec<TextDocumentEdit>>
where
    F: Fn(&Uri) -> Option<i32>,
{
    let mut changes = Vec::new();

    for (path, file) in &refactoring.changed_files {
        let edits = text_edits(&file.old_code, &file.new_code)
            .with_context(|| format!("Failed to compute edits for {}", path.display()))?;
        if edits.is_empty() {
            continue;
        }

        let uri = path_to_uri(path)?;
        let version = version_of(&uri);
        changes.push(TextDocumentEdit {
            text_document: OptionalVersionedTextDocumentIdentifier { uri, version },
            edits: edits.into_iter().map(OneOf::Left).collect(),
        });
    }

    Ok(changes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::engine::ChangedFile;
    use lsp_types::{Position, Range, TextEdit};
    use std::path::PathBuf;

    fn changed(old: &str, new: &str) -> ChangedFile {
        ChangedFile {
            old_code: old.to_string(),
            new_code: new.to_string(),
        }
    }

    #[test]
    fn test_unchanged_file_is_omitted() {
        let mut refactoring = Refactoring::default();
        refactoring
            .changed_files
            .insert(PathBuf::from("/proj/a.py"), changed("x = 1\ny = x\n", "y = 1\n"));
        refactoring
            .changed_files
            .insert(PathBuf::from("/proj/b.py"), changed("pass\n", "pass\n"));

        let changes = document_changes(&refactoring, |_| Some(7)).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].text_document.uri.as_str(), "file:///proj/a.py");
        assert_eq!(changes[0].text_document.version, Some(7));
        assert_eq!(
            changes[0].edits,
            vec![OneOf::Left(TextEdit::new(
                Range::new(Position::new(0, 0), Position::new(2, 0)),
                "y = 1\n".to_string()
            ))]
        );
    }

    #[test]
    fn test_groups_follow_path_order_and_open_versions() {
        let mut refactoring = Refactoring::default();
        refactoring
            .changed_files
            .insert(PathBuf::from("/proj/z.py"), changed("a\n", "b\n"));
        refactoring
            .changed_files
            .insert(PathBuf::from("/proj/m.py"), changed("a\n", "c\n"));

        let changes = document_changes(&refactoring, |uri| {
            (uri.as_str() == "file:///proj/m.py").then_some(3)
        })
        .unwrap();

        let uris: Vec<_> = changes
            .iter()
            .map(|c| c.text_document.uri.as_str().to_string())
            .collect();
        assert_eq!(uris, vec!["file:///proj/m.py", "file:///proj/z.py"]);
        assert_eq!(changes[0].text_document.version, Some(3));
        assert_eq!(changes[1].text_document.version, None);
    }

    #[test]
    fn test_no_changes_is_empty() {
        let changes = document_changes(&Refactoring::default(), |_| None).unwrap();
        assert!(changes.is_empty());
    }
}
