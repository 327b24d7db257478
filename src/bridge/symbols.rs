// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Document symbols from the engine's name list.

use lsp_types::{
    ClientCapabilities, DocumentSymbol, DocumentSymbolResponse, Location, SymbolInformation,
    SymbolKind, Uri,
};
use std::collections::HashSet;
use thiserror::Error;

use crate::engine::{NameKind, SymbolName};
use crate::validation::token_range;

/// How document symbols are returned, fixed at `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolStyle {
    /// Nested `DocumentSymbol`s.
    Hierarchical,
    /// `SymbolInformation` with container names.
    Flat,
}

impl SymbolStyle {
    pub fn from_capabilities(capabilities: &ClientCapabilities) -> Self {
        let hierarchical = capabilities
            .text_document
            .as_ref()
            .and_then(|t| t.document_symbol.as_ref())
            .and_then(|s| s.hierarchical_document_symbol_support)
            .unwrap_or(false);
        if hierarchical {
            Self::Hierarchical
        } else {
            Self::Flat
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolTreeError {
    #[error("Symbol '{child}' is listed before its parent (id {parent})")]
    ParentAfterChild { child: String, parent: u32 },
}

/// Symbols for the names of one document, `None` when there are none.
///
/// `names` must list every parent before its children.
///
/// # Errors
///
/// Returns [`SymbolTreeError::ParentAfterChild`] if a name's parent appears
/// after it in the list.
pub fn document_symbols<S: AsRef<str>>(
    style: SymbolStyle,
    uri: &Uri,
    lines: &[S],
    names: &[SymbolName],
) -> Result<Option<DocumentSymbolResponse>, SymbolTreeError> {
    if names.is_empty() {
        return Ok(None);
    }
    let response = match style {
        SymbolStyle::Hierarchical => {
            check_order(names)?;
            let mut cursor = 0;
            DocumentSymbolResponse::Nested(nested(names, &mut cursor, None, lines))
        }
        SymbolStyle::Flat => DocumentSymbolResponse::Flat(
            names
                .iter()
                .filter(|name| name.kind != NameKind::Param)
                .map(|name| flat(name, uri, lines))
                .collect(),
        ),
    };
    Ok(Some(response))
}

fn check_order(names: &[SymbolName]) -> Result<(), SymbolTreeError> {
    let ids: HashSet<u32> = names.iter().map(|n| n.id).collect();
    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if let Some(parent) = name.parent_id
            && ids.contains(&parent)
            && !seen.contains(&parent)
        {
            return Err(SymbolTreeError::ParentAfterChild {
                child: name.name.clone(),
                parent,
            });
        }
        seen.insert(name.id);
    }
    Ok(())
}

/// Consumes the run of names starting at `cursor` that belong to `parent`.
///
/// The top level takes every remaining name, so a name whose parent is not
/// the enclosing symbol surfaces there.
#[allow(deprecated, reason = "DocumentSymbol::deprecated has to be initialized")]
fn nested<S: AsRef<str>>(
    names: &[SymbolName],
    cursor: &mut usize,
    parent: Option<u32>,
    lines: &[S],
) -> Vec<DocumentSymbol> {
    let mut symbols = Vec::new();
    while let Some(name) = names.get(*cursor) {
        if parent.is_some() && name.parent_id != parent {
            break;
        }
        *cursor += 1;
        if name.kind == NameKind::Param {
            continue;
        }
        let children = nested(names, cursor, Some(name.id), lines);
        let range = token_range(lines, name.line.saturating_sub(1), name.column);
        symbols.push(DocumentSymbol {
            name: name.name.clone(),
            detail: None,
            kind: symbol_kind(name.kind),
            tags: None,
            deprecated: None,
            range,
            selection_range: range,
            children: (!children.is_empty()).then_some(children),
        });
    }
    symbols
}

#[allow(deprecated, reason = "SymbolInformation::deprecated has to be initialized")]
fn flat<S: AsRef<str>>(name: &SymbolName, uri: &Uri, lines: &[S]) -> SymbolInformation {
    SymbolInformation {
        name: name.name.clone(),
        kind: symbol_kind(name.kind),
        tags: None,
        deprecated: None,
        location: Location::new(
            uri.clone(),
            token_range(lines, name.line.saturating_sub(1), name.column),
        ),
        container_name: container_name(name),
    }
}

/// Parent's full name relative to the module; `None` at module level.
fn container_name(name: &SymbolName) -> Option<String> {
    let parent = name.parent_full_name.as_deref()?;
    if parent == name.module_name {
        return None;
    }
    let relative = parent
        .strip_prefix(name.module_name.as_str())
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(parent);
    Some(relative.to_string())
}

const fn symbol_kind(kind: NameKind) -> SymbolKind {
    match kind {
        NameKind::Module => SymbolKind::MODULE,
        NameKind::Class | NameKind::PseudoClass => SymbolKind::CLASS,
        NameKind::Function => SymbolKind::FUNCTION,
        NameKind::Statement | NameKind::Instance => SymbolKind::VARIABLE,
        _ => SymbolKind::NULL,
    }
}
