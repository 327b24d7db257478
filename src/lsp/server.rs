// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Language server dispatch loop.
//!
//! Reads Content-Length framed JSON-RPC from the editor, handles each
//! message to completion, and routes typed params to a [`LanguageHandler`].

use anyhow::{Context, Result};
use bytes::BytesMut;
use lsp_types::{
    CodeActionParams, CodeActionResponse, CompletionParams, CompletionResponse,
    DidChangeConfigurationParams, DidChangeTextDocumentParams, DidChangeWorkspaceFoldersParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams,
    DocumentSymbolParams, DocumentSymbolResponse, GotoDefinitionParams, GotoDefinitionResponse,
    Hover, HoverParams, InitializeParams, InitializeResult, Location, ReferenceParams,
    SignatureHelp, SignatureHelpParams, WillSaveTextDocumentParams,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Read;
use tracing::{debug, error, info, trace, warn};

use super::outbound::ClientSink;
use super::protocol::{
    self, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, Incoming, METHOD_NOT_FOUND,
    NotificationMessage, PARSE_ERROR, RequestMessage, ResponseMessage, SERVER_NOT_INITIALIZED,
};

/// Handles LSP methods with typed params.
///
/// Only `initialize` is mandatory; every other method defaults to an empty
/// answer so that handlers implement what they advertise.
pub trait LanguageHandler {
    /// Negotiates capabilities.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be set up.
    fn initialize(&mut self, params: InitializeParams) -> Result<InitializeResult>;

    /// Called for `shutdown`; release external resources here.
    ///
    /// # Errors
    ///
    /// Returns an error if cleanup fails.
    fn shutdown(&mut self) -> Result<()> {
        Ok(())
    }

    /// `textDocument/didOpen`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be processed.
    fn did_open(&mut self, _params: DidOpenTextDocumentParams) -> Result<()> {
        Ok(())
    }

    /// `textDocument/didChange`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be processed.
    fn did_change(&mut self, _params: DidChangeTextDocumentParams) -> Result<()> {
        Ok(())
    }

    /// `textDocument/didClose`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be processed.
    fn did_close(&mut self, _params: DidCloseTextDocumentParams) -> Result<()> {
        Ok(())
    }

    /// `textDocument/willSave`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be processed.
    fn will_save(&mut self, _params: WillSaveTextDocumentParams) -> Result<()> {
        Ok(())
    }

    /// `textDocument/didSave`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be processed.
    fn did_save(&mut self, _params: DidSaveTextDocumentParams) -> Result<()> {
        Ok(())
    }

    /// `workspace/didChangeConfiguration`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be processed.
    fn did_change_configuration(&mut self, _params: DidChangeConfigurationParams) -> Result<()> {
        Ok(())
    }

    /// `workspace/didChangeWorkspaceFolders`.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be processed.
    fn did_change_workspace_folders(
        &mut self,
        _params: DidChangeWorkspaceFoldersParams,
    ) -> Result<()> {
        Ok(())
    }

    /// `textDocument/completion`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn completion(&mut self, _params: CompletionParams) -> Result<Option<CompletionResponse>> {
        Ok(None)
    }

    /// `textDocument/hover`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn hover(&mut self, _params: HoverParams) -> Result<Option<Hover>> {
        Ok(None)
    }

    /// `textDocument/signatureHelp`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn signature_help(&mut self, _params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        Ok(None)
    }

    /// `textDocument/definition`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn definition(
        &mut self,
        _params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        Ok(None)
    }

    /// `textDocument/references`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn references(&mut self, _params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        Ok(None)
    }

    /// `textDocument/documentSymbol`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn document_symbol(
        &mut self,
        _params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        Ok(None)
    }

    /// `textDocument/codeAction`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    fn code_action(&mut self, _params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        Ok(None)
    }
}

/// Lifecycle of the editor connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Running,
    ShutdownRequested,
}

/// Outcome of a request handler before it is turned into a response.
enum Reply {
    Result(serde_json::Value),
    Error(i64, String),
}

/// LSP server that communicates over a byte stream (stdin in production).
pub struct LanguageServer<H: LanguageHandler> {
    handler: H,
    client: ClientSink,
    lifecycle: Lifecycle,
    exit_requested: bool,
}

impl<H: LanguageHandler> LanguageServer<H> {
    /// Creates a server that answers through `client`.
    pub const fn new(handler: H, client: ClientSink) -> Self {
        Self {
            handler,
            client,
            lifecycle: Lifecycle::Uninitialized,
            exit_requested: false,
        }
    }

    /// Runs the dispatch loop until `exit` or end of input.
    ///
    /// Returns `true` when the editor shut the server down cleanly
    /// (`shutdown` followed by `exit`).
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the input fails.
    pub fn run(&mut self, reader: &mut dyn Read) -> Result<bool> {
        let mut buffer = BytesMut::with_capacity(8192);
        let mut temp = [0u8; 4096];

        info!("Language server starting, waiting for messages on stdin");

        while !self.exit_requested {
            let n = reader.read(&mut temp).context("Failed to read from stdin")?;
            if n == 0 {
                info!("Input closed");
                break;
            }
            buffer.extend_from_slice(&temp[..n]);

            loop {
                match protocol::try_parse_message(&mut buffer) {
                    Ok(Some(body)) => {
                        trace!("Received: {}", body);
                        self.handle_body(&body);
                        if self.exit_requested {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!("Dropping unreadable input: {e}");
                        buffer.clear();
                        break;
                    }
                }
            }
        }

        Ok(self.lifecycle == Lifecycle::ShutdownRequested)
    }

    /// Borrow of the handler, for inspection in tests.
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    fn handle_body(&mut self, body: &str) {
        match protocol::classify(body) {
            Ok(Incoming::Request(request)) => {
                let response = self.handle_request(request);
                if let Err(e) = self.client.send_response(&response) {
                    error!("Failed to send response: {e}");
                }
            }
            Ok(Incoming::Notification(notification)) => self.handle_notification(notification),
            Ok(Incoming::Response(response)) => {
                // The server never issues requests of its own.
                debug!("Ignoring response for id {:?}", response.id);
            }
            Err(e) => {
                warn!("Failed to parse message: {e}");
                let response = ResponseMessage::error(None, PARSE_ERROR, e.to_string());
                if let Err(e) = self.client.send_response(&response) {
                    error!("Failed to send parse error: {e}");
                }
            }
        }
    }

    fn handle_request(&mut self, request: RequestMessage) -> ResponseMessage {
        debug!("Handling request: {} (id={:?})", request.method, request.id);

        let reply = match (self.lifecycle, request.method.as_str()) {
            (Lifecycle::Uninitialized, "initialize") => {
                let reply = dispatch(request.params, |p| self.handler.initialize(p));
                if matches!(reply, Reply::Result(_)) {
                    self.lifecycle = Lifecycle::Running;
                }
                reply
            }
            (_, "initialize") => Reply::Error(INVALID_REQUEST, "Server already initialized".into()),
            (Lifecycle::Uninitialized, _) => {
                Reply::Error(SERVER_NOT_INITIALIZED, "Server not initialized".into())
            }
            (Lifecycle::ShutdownRequested, _) => {
                Reply::Error(INVALID_REQUEST, "Server is shutting down".into())
            }
            (Lifecycle::Running, "shutdown") => {
                self.lifecycle = Lifecycle::ShutdownRequested;
                match self.handler.shutdown() {
                    Ok(()) => Reply::Result(serde_json::Value::Null),
                    Err(e) => Reply::Error(INTERNAL_ERROR, e.to_string()),
                }
            }
            (Lifecycle::Running, method) => self.route_request(method, request.params),
        };

        match reply {
            Reply::Result(value) => ResponseMessage::success(request.id, value),
            Reply::Error(code, message) => {
                if code == INTERNAL_ERROR {
                    warn!("Request {} failed: {message}", request.method);
                }
                ResponseMessage::error(Some(request.id), code, message)
            }
        }
    }

    fn route_request(&mut self, method: &str, params: serde_json::Value) -> Reply {
        let handler = &mut self.handler;
        match method {
            "textDocument/completion" => dispatch(params, |p| handler.completion(p)),
            "textDocument/hover" => dispatch(params, |p| handler.hover(p)),
            "textDocument/signatureHelp" => dispatch(params, |p| handler.signature_help(p)),
            "textDocument/definition" => dispatch(params, |p| handler.definition(p)),
            "textDocument/references" => dispatch(params, |p| handler.references(p)),
            "textDocument/documentSymbol" => dispatch(params, |p| handler.document_symbol(p)),
            "textDocument/codeAction" => dispatch(params, |p| handler.code_action(p)),
            _ => {
                warn!("Unknown method: {method}");
                Reply::Error(METHOD_NOT_FOUND, format!("Unknown method: {method}"))
            }
        }
    }

    fn handle_notification(&mut self, notification: NotificationMessage) {
        debug!("Handling notification: {}", notification.method);

        if notification.method == "exit" {
            info!("Exit requested");
            self.exit_requested = true;
            return;
        }
        if self.lifecycle != Lifecycle::Running {
            debug!(
                "Dropping notification {} outside of a running session",
                notification.method
            );
            return;
        }

        let handler = &mut self.handler;
        let params = notification.params;
        let result = match notification.method.as_str() {
            "initialized" => {
                info!("Client initialized");
                Ok(())
            }
            "$/cancelRequest" | "$/setTrace" => Ok(()),
            "textDocument/didOpen" => notify(params, |p| handler.did_open(p)),
            "textDocument/didChange" => notify(params, |p| handler.did_change(p)),
            "textDocument/didClose" => notify(params, |p| handler.did_close(p)),
            "textDocument/willSave" => notify(params, |p| handler.will_save(p)),
            "textDocument/didSave" => notify(params, |p| handler.did_save(p)),
            "workspace/didChangeConfiguration" => {
                notify(params, |p| handler.did_change_configuration(p))
            }
            "workspace/didChangeWorkspaceFolders" => {
                notify(params, |p| handler.did_change_workspace_folders(p))
            }
            other => {
                debug!("Ignoring unknown notification: {other}");
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("Notification {} failed: {e:#}", notification.method);
        }
    }
}

/// Decodes params, runs the handler and encodes its answer.
fn dispatch<P, R, F>(params: serde_json::Value, f: F) -> Reply
where
    P: DeserializeOwned,
    R: Serialize,
    F: FnOnce(P) -> Result<R>,
{
    let params = match serde_json::from_value::<P>(params) {
        Ok(params) => params,
        Err(e) => return Reply::Error(INVALID_PARAMS, format!("Invalid params: {e}")),
    };
    match f(params).and_then(|r| serde_json::to_value(r).map_err(Into::into)) {
        Ok(value) => Reply::Result(value),
        Err(e) => Reply::Error(INTERNAL_ERROR, format!("{e:#}")),
    }
}

fn notify<P, F>(params: serde_json::Value, f: F) -> Result<()>
where
    P: DeserializeOwned,
    F: FnOnce(P) -> Result<()>,
{
    let params = serde_json::from_value::<P>(params).context("Invalid notification params")?;
    f(params)
}
