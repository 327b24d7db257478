// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Completion items from engine completions.

use lsp_types::{
    ClientCapabilities, CompletionItem, CompletionItemKind, CompletionTextEdit, Documentation,
    InsertTextFormat, Position, Range, TextEdit,
};
use regex::Regex;

use super::documents::byte_offset;
use crate::engine::{Completion, NameKind, ParamKind, Signature};

/// How completion items are rendered, fixed at `initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStyle {
    /// One item per completion.
    Plain,
    /// Also one snippet item per call signature.
    Snippets,
}

impl CompletionStyle {
    pub fn from_capabilities(capabilities: &ClientCapabilities) -> Self {
        let snippets = capabilities
            .text_document
            .as_ref()
            .and_then(|t| t.completion.as_ref())
            .and_then(|c| c.completion_item.as_ref())
            .and_then(|i| i.snippet_support)
            .unwrap_or(false);
        if snippets { Self::Snippets } else { Self::Plain }
    }
}

/// Builds completion items in one [`CompletionStyle`].
#[derive(Debug, Clone)]
pub struct CompletionFormatter {
    style: CompletionStyle,
    word: Regex,
}

impl CompletionFormatter {
    /// # Errors
    ///
    /// Returns an error if the identifier pattern fails to compile.
    pub fn new(style: CompletionStyle) -> Result<Self, regex::Error> {
        Ok(Self {
            style,
            word: Regex::new(r"^\w*")?,
        })
    }

    pub const fn style(&self) -> CompletionStyle {
        self.style
    }

    /// Range a completion replaces: from the cursor to the end of the
    /// identifier the cursor sits in.
    pub fn replace_range(&self, line: &str, position: Position) -> Range {
        let rest = line.get(byte_offset(line, position.character)..).unwrap_or("");
        let word = self.word.find(rest).map_or("", |m| m.as_str());
        let width = u32::try_from(word.encode_utf16().count()).unwrap_or(0);
        Range::new(
            position,
            Position::new(position.line, position.character.saturating_add(width)),
        )
    }

    /// Items for `completions`, each replacing `range`.
    pub fn items(&self, completions: &[Completion], range: Range) -> Vec<CompletionItem> {
        let mut items = Vec::with_capacity(completions.len());
        for completion in completions {
            let item = base_item(completion, range);
            let snippets: Vec<CompletionItem> = if self.style == CompletionStyle::Snippets {
                completion
                    .signatures
                    .iter()
                    .map(|signature| snippet_item(&item, completion, signature))
                    .collect()
            } else {
                Vec::new()
            };
            // The plain item comes first, then one item per signature.
            items.push(item);
            items.extend(snippets);
        }
        items
    }
}

fn base_item(completion: &Completion, range: Range) -> CompletionItem {
    let mut label = completion.name.clone();
    // String completions keep their quote only if the inserted text does.
    if label.starts_with('\'') && !completion.complete.starts_with('\'') {
        label.remove(0);
    }
    CompletionItem {
        label,
        kind: Some(item_kind(completion.kind)),
        documentation: (!completion.docstring.is_empty())
            .then(|| Documentation::String(completion.docstring.clone())),
        sort_text: Some(sort_text(&completion.name)),
        text_edit: Some(CompletionTextEdit::Edit(TextEdit::new(
            range,
            completion.complete.clone(),
        ))),
        ..CompletionItem::default()
    }
}

fn snippet_item(base: &CompletionItem, completion: &Completion, signature: &Signature) -> CompletionItem {
    let mut names = Vec::new();
    let mut placeholders = Vec::new();
    for (index, param) in signature.params.iter().enumerate() {
        if param.kind == ParamKind::VarKeyword || param.has_default() {
            break;
        }
        if param.name == "/" {
            continue;
        }
        let keyword = if param.kind == ParamKind::KeywordOnly {
            format!("{}=", param.name)
        } else {
            String::new()
        };
        placeholders.push(format!("{keyword}${{{}:{}}}", index + 1, param.name));
        names.push(param.name.as_str());
    }
    CompletionItem {
        label: format!("{}({})", completion.name, names.join(", ")),
        insert_text: Some(format!("{}({})$0", completion.name, placeholders.join(", "))),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        text_edit: None,
        ..base.clone()
    }
}

const fn item_kind(kind: NameKind) -> CompletionItemKind {
    match kind {
        NameKind::Module => CompletionItemKind::MODULE,
        NameKind::Class => CompletionItemKind::CLASS,
        NameKind::Instance => CompletionItemKind::REFERENCE,
        NameKind::Function => CompletionItemKind::FUNCTION,
        NameKind::Param => CompletionItemKind::VARIABLE,
        NameKind::Keyword | NameKind::Statement => CompletionItemKind::KEYWORD,
        _ => CompletionItemKind::TEXT,
    }
}

/// Public names sort first, then `_private`, then `__dunder`.
fn sort_text(name: &str) -> String {
    let prefix = if name.starts_with("__") {
        "zz"
    } else if name.starts_with('_') {
        "za"
    } else {
        "aa"
    };
    format!("{prefix}{name}")
}
