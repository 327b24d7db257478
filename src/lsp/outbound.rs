// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Outbound half of the editor connection.
//!
//! Responses are written by the dispatch loop while diagnostics from
//! background type checks are written from tokio tasks, so the writer is a
//! shared, locked handle.

use anyhow::{Result, anyhow};
use lsp_types::{
    Diagnostic, MessageType, PublishDiagnosticsParams, ShowMessageParams, Uri,
};
use serde::Serialize;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

use super::protocol::{self, NotificationMessage, ResponseMessage};

/// Thread-safe writer handle. Wraps `std::io::Stdout` for production,
/// or a shared `Vec<u8>` for tests.
type Writer = Arc<Mutex<Box<dyn Write + Send>>>;

/// Cloneable handle for sending messages to the editor.
#[derive(Clone)]
pub struct ClientSink {
    writer: Writer,
}

impl ClientSink {
    /// Creates a sink that forwards to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::from_writer(Box::new(std::io::stdout()))
    }

    /// Creates a sink over an arbitrary writer.
    #[must_use]
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Sends a response to a request.
    ///
    /// # Errors
    ///
    /// Returns an error if the response cannot be serialized or written.
    pub fn send_response(&self, response: &ResponseMessage) -> Result<()> {
        self.write_message(response)
    }

    /// Sends a notification with the given method and params.
    ///
    /// # Errors
    ///
    /// Returns an error if the params cannot be serialized or written.
    pub fn notify<P: Serialize>(&self, method: &str, params: P) -> Result<()> {
        let notification = NotificationMessage::new(method, params)?;
        self.write_message(&notification)
    }

    /// Replaces the published diagnostics for a document.
    pub fn publish_diagnostics(&self, uri: Uri, diagnostics: Vec<Diagnostic>, version: Option<i32>) {
        debug!(
            "Publishing {} diagnostics for {}",
            diagnostics.len(),
            uri.as_str()
        );
        let params = PublishDiagnosticsParams {
            uri,
            diagnostics,
            version,
        };
        if let Err(e) = self.notify("textDocument/publishDiagnostics", params) {
            warn!("Failed to publish diagnostics: {e}");
        }
    }

    /// Shows a message in the editor. Best effort: failures are only logged.
    pub fn show_message(&self, typ: MessageType, message: impl Into<String>) {
        let params = ShowMessageParams {
            typ,
            message: message.into(),
        };
        if let Err(e) = self.notify("window/showMessage", params) {
            warn!("Failed to send showMessage: {e}");
        }
    }

    fn write_message<T: Serialize>(&self, message: &T) -> Result<()> {
        let body = serde_json::to_string(message)?;
        trace!("Sending: {}", body);

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("client writer mutex poisoned"))?;
        writer.write_all(&protocol::frame(&body))?;
        writer.flush()?;
        Ok(())
    }
}
