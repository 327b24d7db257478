// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Turns a line classification stream into line-based text edits.

use lsp_types::{Position, Range, TextEdit};

use super::{EditError, LineChange};

/// An edit span that has been opened but not yet emitted.
struct PendingEdit {
    start: u32,
    replaces: bool,
    inserted: bool,
    text: String,
}

impl PendingEdit {
    const fn open(start: u32) -> Self {
        Self {
            start,
            replaces: false,
            inserted: false,
            text: String::new(),
        }
    }

    /// Closes the span with `cursor` positioned after its last removed line.
    fn finish(self, cursor: u32) -> TextEdit {
        let start = Position::new(self.start, 0);
        let end = if self.replaces {
            Position::new(cursor, 0)
        } else {
            start
        };
        TextEdit::new(Range::new(start, end), self.text)
    }
}

/// Merges each run of removed lines (optionally followed by inserted lines)
/// into one edit.
///
/// Ranges are expressed against the original buffer and come out in
/// increasing line order. A run of only inserted lines becomes a zero-width
/// insertion; a run of only removed lines becomes a replacement with empty
/// text.
///
/// # Errors
///
/// Returns [`EditError::RemovedAfterInserted`] if a removed line follows an
/// inserted line inside the same run, and [`EditError::TooManyLines`] if the
/// original buffer has more lines than an LSP position can address.
pub fn coalesce<'a, I>(changes: I) -> Result<Vec<TextEdit>, EditError>
where
    I: IntoIterator<Item = LineChange<'a>>,
{
    let mut edits = Vec::new();
    let mut cursor: u32 = 0;
    let mut pending: Option<PendingEdit> = None;

    for change in changes {
        match change {
            LineChange::Removed(_) => {
                let span = pending.get_or_insert_with(|| PendingEdit::open(cursor));
                if span.inserted {
                    return Err(EditError::RemovedAfterInserted { line: cursor });
                }
                span.replaces = true;
                cursor = advance(cursor)?;
            }
            LineChange::Inserted(line) => {
                let span = pending.get_or_insert_with(|| PendingEdit::open(cursor));
                span.inserted = true;
                span.text.push_str(line);
            }
            LineChange::Unchanged(_) => {
                if let Some(span) = pending.take() {
                    edits.push(span.finish(cursor));
                }
                cursor = advance(cursor)?;
            }
        }
    }

    if let Some(span) = pending.take() {
        edits.push(span.finish(cursor));
    }

    Ok(edits)
}

fn advance(cursor: u32) -> Result<u32, EditError> {
    cursor.checked_add(1).ok_or(EditError::TooManyLines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::edits::diff::diff_lines;

    fn edits_for(old: &[&str], new: &[&str]) -> Vec<TextEdit> {
        coalesce(diff_lines(old, new)).unwrap()
    }

    fn line_range(start: u32, end: u32) -> Range {
        Range::new(Position::new(start, 0), Position::new(end, 0))
    }

    #[test]
    fn single_line_replacement() {
        let edits = edits_for(&["a\n", "b\n", "c\n"], &["a\n", "x\n", "c\n"]);
        assert_eq!(edits, vec![TextEdit::new(line_range(1, 2), "x\n".into())]);
    }

    #[test]
    fn insertion_at_end_is_zero_width() {
        let edits = edits_for(&["a\n", "b\n"], &["a\n", "b\n", "c\n"]);
        assert_eq!(edits, vec![TextEdit::new(line_range(2, 2), "c\n".into())]);
    }

    #[test]
    fn insertion_in_the_middle_is_zero_width() {
        let edits = edits_for(&["a\n", "c\n"], &["a\n", "b\n", "c\n"]);
        assert_eq!(edits, vec![TextEdit::new(line_range(1, 1), "b\n".into())]);
    }

    #[test]
    fn pure_deletion_has_empty_text() {
        let edits = edits_for(&["a\n", "b\n", "c\n", "d\n"], &["a\n", "d\n"]);
        assert_eq!(edits, vec![TextEdit::new(line_range(1, 3), String::new())]);
    }

    #[test]
    fn multi_line_replacement_spans_every_removed_line() {
        let edits = edits_for(
            &["keep\n", "x = 1\n", "y = x\n", "keep\n"],
            &["keep\n", "y = 1\n", "keep\n"],
        );
        assert_eq!(edits, vec![TextEdit::new(line_range(1, 3), "y = 1\n".into())]);
    }

    #[test]
    fn separate_runs_become_separate_edits_in_order() {
        let edits = edits_for(
            &["a\n", "b\n", "c\n", "d\n", "e\n"],
            &["a\n", "B\n", "c\n", "d\n", "E\n"],
        );
        assert_eq!(
            edits,
            vec![
                TextEdit::new(line_range(1, 2), "B\n".into()),
                TextEdit::new(line_range(4, 5), "E\n".into()),
            ]
        );
    }

    #[test]
    fn identical_inputs_produce_no_edits() {
        let lines = ["import os\n", "print(os.sep)\n", ""];
        assert!(edits_for(&lines, &lines).is_empty());
    }

    #[test]
    fn removed_after_inserted_is_rejected() {
        let stream = vec![
            LineChange::Unchanged("a\n"),
            LineChange::Inserted("x\n"),
            LineChange::Removed("b\n"),
        ];
        assert_eq!(
            coalesce(stream),
            Err(EditError::RemovedAfterInserted { line: 1 })
        );
    }

    #[test]
    fn hand_built_stream_closes_pending_span_at_end() {
        let stream = vec![LineChange::Removed("a\n"), LineChange::Removed("b\n")];
        assert_eq!(
            coalesce(stream).unwrap(),
            vec![TextEdit::new(line_range(0, 2), String::new())]
        );
    }
}
