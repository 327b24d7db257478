// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Diff-based text-edit synthesis.
//!
//! A refactoring reports each touched file as old and new content. The
//! content is split into lines, diffed at line granularity, and the
//! classified lines are merged into the smallest set of line-range edits
//! that turns the old buffer into the new one.

/// Edit synthesis from a line classification stream.
pub mod coalesce;
/// Line-granularity diffing.
pub mod diff;
/// Conversion of refactoring results into workspace edits.
pub mod refactor;

pub use coalesce::coalesce;
pub use diff::{diff_lines, split_lines};
pub use refactor::document_changes;

use lsp_types::TextEdit;
use thiserror::Error;

/// One step of a line diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChange<'a> {
    /// Present in both buffers.
    Unchanged(&'a str),
    /// Only in the original buffer.
    Removed(&'a str),
    /// Only in the revised buffer.
    Inserted(&'a str),
}

/// Errors raised while synthesizing edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditError {
    /// The diff listed an insertion before a removal within one run.
    #[error("diff output removes original line {line} after inserting into the same run")]
    RemovedAfterInserted {
        /// Original line number at which the removal appeared.
        line: u32,
    },
    /// The original buffer is longer than an LSP position can address.
    #[error("buffer has more lines than an LSP position can address")]
    TooManyLines,
}

/// Computes the edits that turn `old` into `new`.
///
/// # Errors
///
/// Returns an error if edit synthesis fails (see [`EditError`]).
pub fn text_edits(old: &str, new: &str) -> Result<Vec<TextEdit>, EditError> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    coalesce(diff_lines(&old_lines, &new_lines))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Applies edits whose ranges refer to the original buffer.
    fn replay(old: &str, edits: &[TextEdit]) -> String {
        let mut lines: Vec<String> = split_lines(old).into_iter().map(String::from).collect();
        // Later edits first so earlier line numbers stay valid.
        for edit in edits.iter().rev() {
            let start = edit.range.start.line as usize;
            let end = edit.range.end.line as usize;
            lines.splice(start..end, std::iter::once(edit.new_text.clone()));
        }
        lines.concat()
    }

    fn buffer() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop::sample::select(vec!["a\n", "b\n", "c\n", "pass\n", "\n", "x = 1\r\n", "end"]),
            0..12,
        )
        .prop_map(|lines| lines.concat())
    }

    proptest! {
        #[test]
        fn replaying_edits_reproduces_the_new_buffer(old in buffer(), new in buffer()) {
            let edits = text_edits(&old, &new).unwrap();
            prop_assert_eq!(replay(&old, &edits), new);
        }

        #[test]
        fn diffing_a_buffer_with_itself_yields_nothing(text in buffer()) {
            prop_assert!(text_edits(&text, &text).unwrap().is_empty());
        }

        #[test]
        fn edit_ranges_are_ordered_and_disjoint(old in buffer(), new in buffer()) {
            let edits = text_edits(&old, &new).unwrap();
            for pair in edits.windows(2) {
                prop_assert!(pair[0].range.end.line <= pair[1].range.start.line);
                prop_assert!(pair[0].range.start.line < pair[1].range.start.line);
            }
        }
    }

    #[test]
    fn text_edits_inline_refactoring() {
        let old = "x = 40 + 2\nprint(x)\n";
        let new = "print(40 + 2)\n";
        let edits = text_edits(old, new).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(replay(old, &edits), new);
    }
}
