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

use lsp_types::Uri;
use std::collections::HashMap;
use tracing::debug;

use super::documents::{DocumentError, DocumentStore};
use crate::edits::split_lines;
use crate::engine::{AnalysisEngine, AnalysisHandle};

/// An analysis session bound to one version of an open document.
///
/// Handles are never updated in place: an edit replaces the handle.
pub struct DocumentHandle {
    uri: Uri,
    version: i32,
    lines: Vec<String>,
    analysis: Box<dyn AnalysisHandle>,
}

impl DocumentHandle {
    pub const fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Document version the handle was built from.
    pub const fn version(&self) -> i32 {
        self.version
    }

    /// Lines of the text, terminators kept. Text ending in a newline has a
    /// trailing empty line.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines as a checker reading the file would see them: without the
    /// empty segment after the final newline.
    pub fn source_lines(&self) -> &[String] {
        match self.lines.split_last() {
            Some((last, rest)) if last.is_empty() => rest,
            _ => &self.lines,
        }
    }

    pub fn line(&self, line: u32) -> Option<&str> {
        self.lines.get(line as usize).map(String::as_str)
    }

    pub fn text(&self) -> String {
        self.lines.concat()
    }

    pub fn analysis(&self) -> &dyn AnalysisHandle {
        self.analysis.as_ref()
    }
}

/// At most one live [`DocumentHandle`] per open document.
#[derive(Default)]
pub struct HandleCache {
    handles: HashMap<Uri, DocumentHandle>,
}

impl HandleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached handle, building one from the store's current text
    /// when there is none or `force_refresh` is set.
    ///
    /// The old entry is dropped before a rebuild, so a failed build leaves
    /// no handle behind and the next call tries again.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not open or the engine cannot
    /// create a session for it.
    pub fn get_or_create(
        &mut self,
        uri: &Uri,
        force_refresh: bool,
        documents: &DocumentStore,
        engine: &dyn AnalysisEngine,
    ) -> Result<&DocumentHandle, DocumentError> {
        if !force_refresh && self.handles.contains_key(uri) {
            return self
                .handles
                .get(uri)
                .ok_or_else(|| DocumentError::NotOpen(uri.as_str().to_string()));
        }
        self.handles.remove(uri);

        let document = documents.get(uri)?;
        debug!(
            "Building analysis handle for {} (version {})",
            uri.as_str(),
            document.version
        );
        let analysis = engine
            .open(&document.text, document.path.as_deref())
            .map_err(|source| DocumentError::Analysis {
                uri: uri.as_str().to_string(),
                source,
            })?;

        let handle = DocumentHandle {
            uri: uri.clone(),
            version: document.version,
            lines: split_lines(&document.text)
                .into_iter()
                .map(str::to_string)
                .collect(),
            analysis,
        };
        Ok(self.handles.entry(uri.clone()).or_insert(handle))
    }

    /// Rebuilds the handle after the document changed.
    ///
    /// # Errors
    ///
    /// See [`Self::get_or_create`].
    pub fn invalidate_on_edit(
        &mut self,
        uri: &Uri,
        documents: &DocumentStore,
        engine: &dyn AnalysisEngine,
    ) -> Result<(), DocumentError> {
        self.get_or_create(uri, true, documents, engine).map(|_| ())
    }

    /// Drops the handle for a closed document.
    pub fn evict(&mut self, uri: &Uri) {
        if self.handles.remove(uri).is_some() {
            debug!("Evicted analysis handle for {}", uri.as_str());
        }
    }

    pub fn contains(&self, uri: &Uri) -> bool {
        self.handles.contains_key(uri)
    }

    /// Drops every handle.
    pub fn clear(&mut self) {
        self.handles.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::testing::FakeEngine;
    use lsp_types::{TextDocumentContentChangeEvent, TextDocumentItem};

    fn uri(name: &str) -> Uri {
        format!("file:///proj/{name}").parse().unwrap()
    }

    fn store(docs: &[(&str, &str)]) -> DocumentStore {
        let mut store = DocumentStore::new();
        for (name, text) in docs {
            store.open(TextDocumentItem::new(
                uri(name),
                "python".into(),
                1,
                (*text).to_string(),
            ));
        }
        store
    }

    #[test]
    fn test_handle_is_reused_until_refresh() {
        let engine = FakeEngine::default();
        let documents = store(&[("a.py", "x = 1\n")]);
        let mut cache = HandleCache::new();

        cache.get_or_create(&uri("a.py"), false, &documents, &engine).unwrap();
        cache.get_or_create(&uri("a.py"), false, &documents, &engine).unwrap();
        assert_eq!(engine.opened(), 1);

        cache.get_or_create(&uri("a.py"), true, &documents, &engine).unwrap();
        assert_eq!(engine.opened(), 2);
    }

    #[test]
    fn test_handle_carries_lines_and_version() {
        let engine = FakeEngine::default();
        let documents = store(&[("a.py", "import os\nx = 1\n")]);
        let mut cache = HandleCache::new();

        let handle = cache.get_or_create(&uri("a.py"), false, &documents, &engine).unwrap();
        assert_eq!(handle.lines(), ["import os\n", "x = 1\n", ""]);
        assert_eq!(handle.source_lines(), ["import os\n", "x = 1\n"]);
        assert_eq!(handle.line(1), Some("x = 1\n"));
        assert_eq!(handle.text(), "import os\nx = 1\n");
        assert_eq!(handle.version(), 1);
    }

    #[test]
    fn test_edit_rebuilds_from_new_text() {
        let engine = FakeEngine::default();
        let mut documents = store(&[("a.py", "x = 1\n")]);
        let mut cache = HandleCache::new();
        cache.get_or_create(&uri("a.py"), false, &documents, &engine).unwrap();

        documents
            .change(
                &uri("a.py"),
                2,
                vec![TextDocumentContentChangeEvent {
                    range: None,
                    range_length: None,
                    text: "y = 2\n".into(),
                }],
            )
            .unwrap();
        cache.invalidate_on_edit(&uri("a.py"), &documents, &engine).unwrap();

        let handle = cache.get_or_create(&uri("a.py"), false, &documents, &engine).unwrap();
        assert_eq!(handle.text(), "y = 2\n");
        assert_eq!(handle.version(), 2);
        assert_eq!(engine.last_opened_code().as_deref(), Some("y = 2\n"));
    }

    #[test]
    fn test_evict_then_get_builds_fresh_handle() {
        let engine = FakeEngine::default();
        let documents = store(&[("a.py", "x = 1\n")]);
        let mut cache = HandleCache::new();

        cache.get_or_create(&uri("a.py"), false, &documents, &engine).unwrap();
        cache.evict(&uri("a.py"));
        assert!(!cache.contains(&uri("a.py")));
        cache.evict(&uri("a.py"));

        cache.get_or_create(&uri("a.py"), false, &documents, &engine).unwrap();
        assert_eq!(engine.opened(), 2);
        assert!(cache.contains(&uri("a.py")));
    }

    #[test]
    fn test_failed_build_leaves_no_entry_and_spares_others() {
        let engine = FakeEngine::default();
        let documents = store(&[("a.py", "x = 1\n"), ("b.py", "y = 2\n")]);
        let mut cache = HandleCache::new();
        cache.get_or_create(&uri("a.py"), false, &documents, &engine).unwrap();
        cache.get_or_create(&uri("b.py"), false, &documents, &engine).unwrap();

        engine.fail_open(true);
        let err = cache
            .get_or_create(&uri("a.py"), true, &documents, &engine)
            .err()
            .unwrap();
        assert!(matches!(err, DocumentError::Analysis { .. }));
        assert!(!cache.contains(&uri("a.py")));
        assert!(cache.contains(&uri("b.py")));

        engine.fail_open(false);
        cache.get_or_create(&uri("a.py"), false, &documents, &engine).unwrap();
        assert!(cache.contains(&uri("a.py")));
    }

    #[test]
    fn test_unknown_document_is_not_open() {
        let engine = FakeEngine::default();
        let mut cache = HandleCache::new();
        let err = cache
            .get_or_create(&uri("nope.py"), false, &DocumentStore::new(), &engine)
            .err()
            .unwrap();
        assert!(matches!(err, DocumentError::NotOpen(_)));
    }
}
