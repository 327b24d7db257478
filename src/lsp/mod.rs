// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Outbound messages to the editor.
pub mod outbound;
/// JSON-RPC message shapes and Content-Length framing.
pub mod protocol;
/// Dispatch loop and the typed handler trait.
pub mod server;

pub use outbound::ClientSink;
pub use server::{LanguageHandler, LanguageServer};
