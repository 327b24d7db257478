// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Line-granularity comparison of two buffers.

use similar::{Algorithm, DiffTag};

use super::LineChange;

/// Splits a buffer into lines, keeping each line's terminator.
///
/// `\n`, `\r\n` and a lone `\r` all end a line. The segment after the last
/// terminator is always emitted, so a buffer ending in a newline (or an
/// empty buffer) yields a trailing empty line.
#[must_use]
pub fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&text[start..=i]);
                start = i + 1;
            }
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                lines.push(&text[start..i + 2]);
                i += 1;
                start = i + 1;
            }
            b'\r' => {
                lines.push(&text[start..=i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    lines.push(&text[start..]);
    lines
}

/// Classifies every line of `old` and `new` as unchanged, removed or inserted.
///
/// Unchanged and inserted lines, in order, reproduce `new`; unchanged and
/// removed lines reproduce `old`. Inside each run of changes the removed
/// lines come before the inserted ones.
#[must_use]
pub fn diff_lines<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<LineChange<'a>> {
    let ops = similar::capture_diff_slices(Algorithm::Myers, old, new);

    let mut changes = Vec::with_capacity(old.len().max(new.len()));
    let mut inserted = Vec::new();

    for op in ops {
        match op.tag() {
            DiffTag::Equal => {
                changes.append(&mut inserted);
                changes.extend(old[op.old_range()].iter().copied().map(LineChange::Unchanged));
            }
            DiffTag::Delete => {
                changes.extend(old[op.old_range()].iter().copied().map(LineChange::Removed));
            }
            DiffTag::Insert => {
                inserted.extend(new[op.new_range()].iter().copied().map(LineChange::Inserted));
            }
            DiffTag::Replace => {
                changes.extend(old[op.old_range()].iter().copied().map(LineChange::Removed));
                inserted.extend(new[op.new_range()].iter().copied().map(LineChange::Inserted));
            }
        }
    }
    changes.append(&mut inserted);
    changes
}
