// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Hover, signature help and location answers.

use lsp_types::{
    Hover, HoverContents, Location, MarkupContent, MarkupKind, ParameterInformation,
    ParameterLabel, Position, Range, SignatureHelp, SignatureInformation,
};
use tracing::debug;

use crate::engine::{Name, Signature};
use crate::uri::path_to_uri;

const DOCSTRING_SEPARATOR: &str = "\n----------\n";

/// Plain-text hover with every docstring, `None` when there is nothing to show.
pub fn hover(names: &[Name]) -> Option<Hover> {
    let text = names
        .iter()
        .map(|name| name.docstring.as_str())
        .collect::<Vec<_>>()
        .join(DOCSTRING_SEPARATOR);
    if text.is_empty() {
        return None;
    }
    Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::PlainText,
            value: text,
        }),
        range: None,
    })
}

/// The signature whose active parameter is furthest along.
///
/// Signatures with no active parameter are ignored; on a tie the first wins.
pub fn signature_help(signatures: &[Signature]) -> Option<SignatureHelp> {
    let mut best: Option<(&Signature, u32)> = None;
    for signature in signatures {
        let Some(index) = signature.index else {
            continue;
        };
        if best.is_none_or(|(_, current)| index > current) {
            best = Some((signature, index));
        }
    }

    let (signature, index) = best?;
    let parameters = signature
        .params
        .iter()
        .map(|param| ParameterInformation {
            label: ParameterLabel::Simple(param.name.clone()),
            documentation: None,
        })
        .collect();
    Some(SignatureHelp {
        signatures: vec![SignatureInformation {
            label: signature.label.clone(),
            documentation: None,
            parameters: Some(parameters),
            active_parameter: None,
        }],
        active_signature: Some(0),
        active_parameter: Some(index),
    })
}

/// Locations of `names`, spanning each name. Names outside any file are
/// dropped.
pub fn locations(names: &[Name]) -> Vec<Location> {
    names
        .iter()
        .filter_map(|name| {
            let path = name.module_path.as_deref()?;
            let uri = match path_to_uri(path) {
                Ok(uri) => uri,
                Err(e) => {
                    debug!("Skipping location: {e}");
                    return None;
                }
            };
            let line = name.line.saturating_sub(1);
            let width = u32::try_from(name.name.encode_utf16().count()).unwrap_or(0);
            Some(Location::new(
                uri,
                Range::new(
                    Position::new(line, name.column),
                    Position::new(line, name.column.saturating_add(width)),
                ),
            ))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::engine::{ParamKind, SignatureParam};
    use std::path::PathBuf;

    fn name(path: Option<&str>, text: &str, line: u32, column: u32, doc: &str) -> Name {
        Name {
            name: text.to_string(),
            module_path: path.map(PathBuf::from),
            line,
            column,
            docstring: doc.to_string(),
        }
    }

    fn signature(label: &str, index: Option<u32>) -> Signature {
        Signature {
            label: label.to_string(),
            index,
            params: vec![SignatureParam {
                name: "a".to_string(),
                kind: ParamKind::PositionalOrKeyword,
                description: "a".to_string(),
            }],
        }
    }

    #[test]
    fn test_hover_joins_docstrings() {
        let hover = hover(&[
            name(None, "f", 1, 0, "f(a)"),
            name(None, "g", 1, 0, "g(b)"),
        ])
        .unwrap();
        let HoverContents::Markup(markup) = hover.contents else {
            unreachable!("hover is always markup");
        };
        assert_eq!(markup.kind, MarkupKind::PlainText);
        assert_eq!(markup.value, "f(a)\n----------\ng(b)");
    }

    #[test]
    fn test_hover_without_text_is_null() {
        assert!(super::hover(&[]).is_none());
        assert!(super::hover(&[name(None, "x", 1, 0, "")]).is_none());
    }

    #[test]
    fn test_signature_with_highest_index_wins() {
        let help = signature_help(&[
            signature("f(a)", Some(0)),
            signature("g(a, b)", None),
            signature("h(a, b, c)", Some(2)),
            signature("k(a, b, c)", Some(2)),
        ])
        .unwrap();
        assert_eq!(help.signatures.len(), 1);
        assert_eq!(help.signatures[0].label, "h(a, b, c)");
        assert_eq!(help.active_signature, Some(0));
        assert_eq!(help.active_parameter, Some(2));
    }

    #[test]
    fn test_no_active_signature_is_null() {
        assert!(signature_help(&[signature("f(a)", None)]).is_none());
    }

    #[test]
    fn test_locations_span_the_name() {
        let locations = locations(&[
            name(Some("/proj/util.py"), "helper", 4, 4, ""),
            name(None, "builtin", 1, 0, ""),
        ]);
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].uri.as_str(), "file:///proj/util.py");
        assert_eq!(
            locations[0].range,
            Range::new(Position::new(3, 4), Position::new(3, 10))
        );
    }
}
