// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Completion item rendering.
pub mod completion;
/// Open documents and incremental sync.
pub mod documents;
/// One analysis handle per open document.
pub mod handles;
/// Hover, signature help and locations.
pub mod navigation;
/// The session that implements the language handler.
pub mod session;
/// Document symbol trees and lists.
pub mod symbols;
/// Workspace root and folders.
pub mod workspace;

pub use completion::{CompletionFormatter, CompletionStyle};
pub use documents::{DocumentError, DocumentStore, TextDocument};
pub use handles::{DocumentHandle, HandleCache};
pub use session::Session;
pub use symbols::{SymbolStyle, SymbolTreeError};
pub use workspace::Workspace;
