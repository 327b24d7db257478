// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! The language handler: routes LSP methods to the engine, the validators
//! and the edit synthesis.

use anyhow::{Context, Result};
use lsp_types::{
    CodeAction, CodeActionKind, CodeActionOptions, CodeActionOrCommand, CodeActionParams,
    CodeActionProviderCapability, CodeActionResponse, CompletionList, CompletionOptions,
    CompletionParams, CompletionResponse, DidChangeConfigurationParams,
    DidChangeTextDocumentParams, DidChangeWorkspaceFoldersParams, DidCloseTextDocumentParams,
    DidOpenTextDocumentParams, DidSaveTextDocumentParams, DocumentChanges, DocumentSymbolParams,
    DocumentSymbolResponse, GotoDefinitionParams, GotoDefinitionResponse, Hover, HoverParams,
    HoverProviderCapability, InitializeParams, InitializeResult, Location, OneOf, Position,
    ReferenceParams, SaveOptions, ServerCapabilities, ServerInfo, SignatureHelp,
    SignatureHelpOptions, SignatureHelpParams, TextDocumentSyncCapability, TextDocumentSyncKind,
    TextDocumentSyncOptions, TextDocumentSyncSaveOptions, Uri, WorkspaceEdit,
    WorkspaceFoldersServerCapabilities, WorkspaceServerCapabilities,
};
use std::path::PathBuf;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::completion::{CompletionFormatter, CompletionStyle};
use super::documents::DocumentStore;
use super::handles::{DocumentHandle, HandleCache};
use super::navigation;
use super::symbols::{self, SymbolStyle};
use super::workspace::Workspace;
use crate::config::{Config, SETTINGS_NAMESPACE, Settings, SettingsRevision};
use crate::edits::document_changes;
use crate::engine::{Backends, EngineError, Launcher};
use crate::lsp::{ClientSink, LanguageHandler};
use crate::validation::style::StyleOptionsCache;
use crate::validation::type_check::find_config_file;
use crate::validation::{FolderCache, StyleOptions, TypeCheckJob, TypeCheckScheduler, Validator};

/// Version reported in `serverInfo`.
pub const VERSION: &str = env!("PYLS_BRIDGE_VERSION");

const NOT_STARTED: &str = "Analysis engine not started";

/// All state of one editor session.
pub struct Session {
    launcher: Box<dyn Launcher>,
    sink: ClientSink,
    /// Interpreter mypy runs under.
    python: String,
    settings: Settings,
    revision: SettingsRevision,
    backends: Option<Backends>,
    documents: DocumentStore,
    handles: HandleCache,
    workspace: Workspace,
    completion: Option<CompletionFormatter>,
    symbol_style: SymbolStyle,
    style_options: StyleOptionsCache,
    mypy_configs: FolderCache<String>,
    type_checks: TypeCheckScheduler,
}

impl Session {
    /// Creates a session; the backends start at `initialize`.
    pub fn new(config: Config, launcher: Box<dyn Launcher>, sink: ClientSink, runtime: Handle) -> Self {
        Self {
            launcher,
            sink,
            python: config.python,
            settings: config.settings,
            revision: SettingsRevision::default(),
            backends: None,
            documents: DocumentStore::new(),
            handles: HandleCache::new(),
            workspace: Workspace::default(),
            completion: None,
            symbol_style: SymbolStyle::Flat,
            style_options: StyleOptionsCache::default(),
            mypy_configs: FolderCache::default(),
            type_checks: TypeCheckScheduler::new(runtime),
        }
    }

    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    pub const fn documents(&self) -> &DocumentStore {
        &self.documents
    }

    pub const fn handles(&self) -> &HandleCache {
        &self.handles
    }

    pub const fn type_checks(&self) -> &TypeCheckScheduler {
        &self.type_checks
    }

    /// Validates a document and publishes the result, then starts a type
    /// check if one is due.
    fn validate(&mut self, uri: &Uri) -> Result<()> {
        let backends = self.backends.as_ref().context(NOT_STARTED)?;
        let handle = self
            .handles
            .get_or_create(uri, false, &self.documents, backends.engine.as_ref())?;
        let path = self.documents.get(uri)?.path.clone();
        let folder = self.workspace.folder_path_for(uri);

        let override_file = self.settings.pycodestyle_config.as_deref();
        let style_options = self
            .style_options
            .get_or_load(folder.as_deref(), self.revision.style, || {
                StyleOptions::load(folder.as_deref(), override_file)
            })
            .clone();

        let validator = Validator {
            unused: backends.unused.as_ref(),
            style: backends.style.as_ref(),
            error_categories: &self.settings.pyflakes_errors,
        };
        let validation = validator.run(handle, path.as_deref(), &style_options)?;
        let version = Some(handle.version());
        let syntax_error = validation.is_syntax_error();
        let diagnostics = validation.into_diagnostics();
        self.sink
            .publish_diagnostics(uri.clone(), diagnostics.clone(), version);

        let file = match path {
            Some(file) if self.settings.mypy_enabled && !syntax_error => file,
            _ => {
                self.type_checks.cancel(uri);
                return Ok(());
            }
        };

        let environment = backends.engine.environment();
        let config_file = self
            .mypy_configs
            .get_or_load(folder.as_deref(), self.revision.type_check, || {
                find_config_file(folder.as_deref())
            })
            .clone();
        let job = TypeCheckJob {
            python: self.python.clone(),
            target_executable: environment.executable.clone(),
            target_version: environment.version.clone(),
            config_file,
            file,
            lines: handle.lines().to_vec(),
        };

        let sink = self.sink.clone();
        let publish_uri = uri.clone();
        self.type_checks
            .schedule(uri.clone(), job.run(self.sink.clone()), move |findings| {
                let mut all = diagnostics;
                all.extend(findings);
                sink.publish_diagnostics(publish_uri, all, version);
            });
        Ok(())
    }
}

/// The cached handle for `uri`, built on demand.
fn handle_for<'a>(
    handles: &'a mut HandleCache,
    documents: &DocumentStore,
    backends: Option<&Backends>,
    uri: &Uri,
) -> Result<&'a DocumentHandle> {
    let backends = backends.context(NOT_STARTED)?;
    Ok(handles.get_or_create(uri, false, documents, backends.engine.as_ref())?)
}

/// Engine coordinates for an LSP position: 1-based line, same column.
const fn engine_position(position: Position) -> (u32, u32) {
    (position.line.saturating_add(1), position.character)
}

fn capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
            open_close: Some(true),
            change: Some(TextDocumentSyncKind::INCREMENTAL),
            will_save: None,
            will_save_wait_until: None,
            save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                include_text: Some(false),
            })),
        })),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec![".".to_string()]),
            ..CompletionOptions::default()
        }),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        signature_help_provider: Some(SignatureHelpOptions {
            trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
            ..SignatureHelpOptions::default()
        }),
        definition_provider: Some(OneOf::Left(true)),
        references_provider: Some(OneOf::Left(true)),
        document_symbol_provider: Some(OneOf::Left(true)),
        code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
            code_action_kinds: Some(vec![
                CodeActionKind::REFACTOR_INLINE,
                CodeActionKind::REFACTOR_EXTRACT,
            ]),
            ..CodeActionOptions::default()
        })),
        workspace: Some(WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: Some(OneOf::Left(true)),
            }),
            file_operations: None,
        }),
        ..ServerCapabilities::default()
    }
}

impl LanguageHandler for Session {
    fn initialize(&mut self, params: InitializeParams) -> Result<InitializeResult> {
        let venv = params
            .initialization_options
            .as_ref()
            .and_then(|options| options.get("venv"))
            .and_then(serde_json::Value::as_str)
            .map(PathBuf::from);

        self.workspace = Workspace::from_initialize(&params);
        let completion_style = CompletionStyle::from_capabilities(&params.capabilities);
        self.completion = Some(CompletionFormatter::new(completion_style)?);
        self.symbol_style = SymbolStyle::from_capabilities(&params.capabilities);
        debug!(
            "Client styles: completion {:?}, symbols {:?}",
            completion_style, self.symbol_style
        );

        let backends = self
            .launcher
            .launch(venv.as_deref(), self.workspace.root_path())
            .context("Failed to start the analysis engine")?;
        self.backends = Some(backends);

        info!("pyls-bridge {VERSION} initialized");
        Ok(InitializeResult {
            capabilities: capabilities(),
            server_info: Some(ServerInfo {
                name: "pyls-bridge".to_string(),
                version: Some(VERSION.to_string()),
            }),
        })
    }

    fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down");
        self.type_checks.cancel_all();
        self.handles.clear();
        Ok(())
    }

    fn did_open(&mut self, params: DidOpenTextDocumentParams) -> Result<()> {
        let uri = params.text_document.uri.clone();
        self.documents.open(params.text_document);
        // A reopened document must not keep a handle for its old text.
        self.handles.evict(&uri);
        self.validate(&uri)
    }

    fn did_change(&mut self, params: DidChangeTextDocumentParams) -> Result<()> {
        let uri = params.text_document.uri;
        self.documents
            .change(&uri, params.text_document.version, params.content_changes)?;
        self.type_checks.cancel(&uri);

        let backends = self.backends.as_ref().context(NOT_STARTED)?;
        self.handles
            .invalidate_on_edit(&uri, &self.documents, backends.engine.as_ref())?;
        Ok(())
    }

    fn did_close(&mut self, params: DidCloseTextDocumentParams) -> Result<()> {
        let uri = params.text_document.uri;
        self.documents.close(&uri);
        self.handles.evict(&uri);
        self.type_checks.forget(&uri);
        Ok(())
    }

    fn did_save(&mut self, params: DidSaveTextDocumentParams) -> Result<()> {
        let uri = params.text_document.uri;
        let has_text = params.text.is_some();
        self.documents.save(&uri, params.text)?;
        if has_text {
            self.handles.evict(&uri);
        }
        self.validate(&uri)
    }

    fn did_change_configuration(&mut self, params: DidChangeConfigurationParams) -> Result<()> {
        let Some(update) = params
            .settings
            .get(SETTINGS_NAMESPACE)
            .and_then(serde_json::Value::as_object)
        else {
            debug!("Configuration change without {SETTINGS_NAMESPACE} settings");
            return Ok(());
        };

        let change = self.settings.apply(update)?;
        self.revision.bump(change);
        debug!("Settings now {:?}", self.settings);

        if change.needs_revalidation() {
            for uri in self.documents.uris() {
                if let Err(e) = self.validate(&uri) {
                    warn!("Failed to validate {}: {e:#}", uri.as_str());
                }
            }
        }
        Ok(())
    }

    fn did_change_workspace_folders(&mut self, params: DidChangeWorkspaceFoldersParams) -> Result<()> {
        self.workspace.apply(params.event);
        Ok(())
    }

    fn completion(&mut self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position = params.text_document_position.position;
        let uri = params.text_document_position.text_document.uri;
        let formatter = self.completion.as_ref().context(NOT_STARTED)?;
        let handle = handle_for(&mut self.handles, &self.documents, self.backends.as_ref(), &uri)?;

        let (line, column) = engine_position(position);
        let completions = handle.analysis().complete(line, column)?;
        let range = formatter.replace_range(handle.line(position.line).unwrap_or(""), position);
        Ok(Some(CompletionResponse::List(CompletionList {
            is_incomplete: false,
            items: formatter.items(&completions, range),
        })))
    }

    fn hover(&mut self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params.position;
        let uri = params.text_document_position_params.text_document.uri;
        let handle = handle_for(&mut self.handles, &self.documents, self.backends.as_ref(), &uri)?;

        let (line, column) = engine_position(position);
        let names = if self.settings.help_on_hover {
            handle.analysis().help(line, column)?
        } else {
            handle.analysis().infer(line, column)?
        };
        Ok(navigation::hover(&names))
    }

    fn signature_help(&mut self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let position = params.text_document_position_params.position;
        let uri = params.text_document_position_params.text_document.uri;
        let handle = handle_for(&mut self.handles, &self.documents, self.backends.as_ref(), &uri)?;

        let (line, column) = engine_position(position);
        let signatures = handle.analysis().signatures(line, column)?;
        Ok(navigation::signature_help(&signatures))
    }

    fn definition(&mut self, params: GotoDefinitionParams) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params.position;
        let uri = params.text_document_position_params.text_document.uri;
        let handle = handle_for(&mut self.handles, &self.documents, self.backends.as_ref(), &uri)?;

        let (line, column) = engine_position(position);
        let names = handle.analysis().goto(line, column)?;
        Ok(Some(GotoDefinitionResponse::Array(navigation::locations(&names))))
    }

    fn references(&mut self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let position = params.text_document_position.position;
        let uri = params.text_document_position.text_document.uri;
        let handle = handle_for(&mut self.handles, &self.documents, self.backends.as_ref(), &uri)?;

        let (line, column) = engine_position(position);
        let names = handle.analysis().references(line, column)?;
        Ok(Some(navigation::locations(&names)))
    }

    fn document_symbol(&mut self, params: DocumentSymbolParams) -> Result<Option<DocumentSymbolResponse>> {
        let uri = params.text_document.uri;
        let handle = handle_for(&mut self.handles, &self.documents, self.backends.as_ref(), &uri)?;

        let names = handle.analysis().names(true)?;
        Ok(symbols::document_symbols(
            self.symbol_style,
            &uri,
            handle.lines(),
            &names,
        )?)
    }

    fn code_action(&mut self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        if params.range.start != params.range.end {
            return Ok(None);
        }
        let uri = params.text_document.uri;
        let handle = handle_for(&mut self.handles, &self.documents, self.backends.as_ref(), &uri)?;

        let (line, column) = engine_position(params.range.start);
        let refactoring = match handle.analysis().inline(line, column) {
            Ok(refactoring) => refactoring,
            Err(EngineError::Refactoring(reason)) => {
                debug!("Nothing to inline: {reason}");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let documents = &self.documents;
        let changes = document_changes(&refactoring, |uri| documents.version(uri))?;
        if changes.is_empty() {
            return Ok(None);
        }
        Ok(Some(vec![CodeActionOrCommand::CodeAction(CodeAction {
            title: "Inline variable".to_string(),
            kind: Some(CodeActionKind::REFACTOR_INLINE),
            edit: Some(WorkspaceEdit {
                document_changes: Some(DocumentChanges::Edits(changes)),
                ..WorkspaceEdit::default()
            }),
            ..CodeAction::default()
        })]))
    }
}
