/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use lsp_types::{Position, TextDocumentContentChangeEvent, TextDocumentItem, Uri};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, trace};

use crate::edits::diff::split_lines;
use crate::engine::EngineError;
use crate::uri::uri_to_path;

/// Errors raised while looking up or analyzing an open document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document not open: {0}")]
    NotOpen(String),

    #[error("Failed to analyze {uri}")]
    Analysis {
        uri: String,
        #[source]
        source: EngineError,
    },
}

/// The editor's copy of an open document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextDocument {
    pub uri: Uri,
    /// Filesystem path, for `file://` documents.
    pub path: Option<PathBuf>,
    pub language_id: String,
    pub version: i32,
    pub text: String,
}

/// Documents the editor has opened, keyed by URI.
///
/// The editor owns these documents: their text only ever changes through
/// `didChange` and `didSave`, never by reading the file on disk.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: HashMap<Uri, TextDocument>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a document. Reopening a URI replaces its content.
    pub fn open(&mut self, item: TextDocumentItem) {
        debug!(
            "Opening document: {} ({}, version {})",
            item.uri.as_str(),
            item.language_id,
            item.version
        );
        let document = TextDocument {
            path: uri_to_path(&item.uri),
            uri: item.uri.clone(),
            language_id: item.language_id,
            version: item.version,
            text: item.text,
        };
        self.documents.insert(item.uri, document);
    }

    /// Applies content changes in order and records the new version.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotOpen`] if the document is not open.
    pub fn change(
        &mut self,
        uri: &Uri,
        version: i32,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> Result<(), DocumentError> {
        let document = self
            .documents
            .get_mut(uri)
            .ok_or_else(|| DocumentError::NotOpen(uri.as_str().to_string()))?;

        for change in changes {
            match change.range {
                Some(range) => {
                    let start = offset_at(&document.text, range.start);
                    let end = offset_at(&document.text, range.end).max(start);
                    trace!("Replacing bytes {start}..{end} of {}", uri.as_str());
                    document.text.replace_range(start..end, &change.text);
                }
                None => document.text = change.text,
            }
        }
        document.version = version;
        Ok(())
    }

    /// Records a save; `text` replaces the content when the editor sends it.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotOpen`] if the document is not open.
    pub fn save(&mut self, uri: &Uri, text: Option<String>) -> Result<(), DocumentError> {
        let document = self
            .documents
            .get_mut(uri)
            .ok_or_else(|| DocumentError::NotOpen(uri.as_str().to_string()))?;
        if let Some(text) = text {
            document.text = text;
        }
        Ok(())
    }

    /// Stops tracking a document.
    pub fn close(&mut self, uri: &Uri) -> Option<TextDocument> {
        debug!("Closing document: {}", uri.as_str());
        self.documents.remove(uri)
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::NotOpen`] if the document is not open.
    pub fn get(&self, uri: &Uri) -> Result<&TextDocument, DocumentError> {
        self.documents
            .get(uri)
            .ok_or_else(|| DocumentError::NotOpen(uri.as_str().to_string()))
    }

    /// Version of an open document, `None` if it is not open.
    pub fn version(&self, uri: &Uri) -> Option<i32> {
        self.documents.get(uri).map(|d| d.version)
    }

    /// URIs of all open documents, sorted.
    pub fn uris(&self) -> Vec<Uri> {
        let mut uris: Vec<Uri> = self.documents.keys().cloned().collect();
        uris.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        uris
    }
}

/// Byte offset of the UTF-16 column `character` within `line`.
///
/// Columns past the end of the line clamp to its end.
pub(crate) fn byte_offset(line: &str, character: u32) -> usize {
    let target = character as usize;
    let mut units = 0;
    for (index, ch) in line.char_indices() {
        if units >= target {
            return index;
        }
        units += ch.len_utf16();
    }
    line.len()
}

/// Byte offset of an LSP position in `text`, clamped to the document.
///
/// Lines end at `\n`, `\r\n` or a lone `\r`.
fn offset_at(text: &str, position: Position) -> usize {
    let lines = split_lines(text);
    let Some(line) = lines.get(position.line as usize) else {
        return text.len();
    };
    let line_start: usize = lines[..position.line as usize].iter().copied().map(str::len).sum();
    let line = line.trim_end_matches(['\n', '\r']);
    line_start + byte_offset(line, position.character)
}
