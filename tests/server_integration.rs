// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Integration tests for the language server.
//!
//! Spawns `pyls-bridge` with the `mockengine` worker and speaks framed LSP
//! to it over stdio.

mod common;

use anyhow::{Context, Result};
use common::{Bridge, position};
use serde_json::{Value, json};

#[test]
fn test_initialize_advertises_capabilities() -> Result<()> {
    let mut bridge = Bridge::spawn(&[])?;
    let response = bridge.initialize()?;

    let result = &response["result"];
    assert_eq!(result["serverInfo"]["name"], "pyls-bridge");
    assert_eq!(result["capabilities"]["textDocumentSync"]["change"], 2);
    assert_eq!(
        result["capabilities"]["completionProvider"]["triggerCharacters"],
        json!(["."])
    );
    assert_eq!(
        result["capabilities"]["codeActionProvider"]["codeActionKinds"],
        json!(["refactor.inline", "refactor.extract"])
    );

    let status = bridge.shutdown()?;
    assert!(status.success(), "clean shutdown should exit 0");
    Ok(())
}

#[test]
fn test_requests_before_initialize_are_rejected() -> Result<()> {
    let mut bridge = Bridge::spawn(&[])?;
    let response = bridge.request("textDocument/hover", position("file:///x.py", 0, 0))?;
    assert_eq!(response["error"]["code"], -32002);
    Ok(())
}

#[test]
fn test_unknown_method_is_not_found() -> Result<()> {
    let mut bridge = Bridge::spawn(&[])?;
    bridge.initialize()?;
    let response = bridge.request("textDocument/rename", json!({}))?;
    assert_eq!(response["error"]["code"], -32601);
    Ok(())
}

#[test]
fn test_open_publishes_diagnostics() -> Result<()> {
    let mut bridge = Bridge::spawn(&[])?;
    bridge.initialize()?;
    let uri = bridge.open("app.py", "import os\nx = 1  \n")?;

    let params = bridge.notification("textDocument/publishDiagnostics")?;
    assert_eq!(params["uri"], uri);
    let diagnostics = params["diagnostics"]
        .as_array()
        .context("diagnostics should be an array")?;
    assert_eq!(diagnostics.len(), 2, "got {diagnostics:?}");

    assert_eq!(diagnostics[0]["source"], "pyflakes");
    assert_eq!(diagnostics[0]["message"], "'os' imported but unused");
    assert_eq!(diagnostics[0]["severity"], 2);

    assert_eq!(diagnostics[1]["source"], "pycodestyle");
    assert_eq!(diagnostics[1]["code"], "W291");
    assert_eq!(
        diagnostics[1]["range"],
        json!({"start": {"line": 1, "character": 5}, "end": {"line": 1, "character": 7}})
    );
    Ok(())
}

#[test]
fn test_syntax_error_is_the_only_diagnostic() -> Result<()> {
    let mut bridge = Bridge::spawn(&[])?;
    bridge.initialize()?;
    bridge.open("broken.py", "import os\ndef f(:\n")?;

    let params = bridge.notification("textDocument/publishDiagnostics")?;
    let diagnostics = params["diagnostics"]
        .as_array()
        .context("diagnostics should be an array")?;
    assert_eq!(diagnostics.len(), 1, "got {diagnostics:?}");
    assert_eq!(diagnostics[0]["source"], "jedi");
    assert_eq!(diagnostics[0]["message"], "Invalid syntax");
    Ok(())
}

#[test]
fn test_configuration_change_escalates_findings() -> Result<()> {
    let mut bridge = Bridge::spawn(&[])?;
    bridge.initialize()?;
    bridge.open("app.py", "import os\n")?;
    bridge.notification("textDocument/publishDiagnostics")?;

    bridge.notify(
        "workspace/didChangeConfiguration",
        json!({ "settings": { "pyls_bridge": { "pyflakes_errors": ["UnusedImport"] } } }),
    )?;
    let params = bridge.notification("textDocument/publishDiagnostics")?;
    assert_eq!(params["diagnostics"][0]["severity"], 1);
    Ok(())
}

#[test]
fn test_completion_after_edit() -> Result<()> {
    let mut bridge = Bridge::spawn(&[])?;
    bridge.initialize()?;
    let uri = bridge.open("app.py", "value = 1\n")?;

    bridge.notify(
        "textDocument/didChange",
        json!({
            "textDocument": { "uri": uri, "version": 2 },
            "contentChanges": [{
                "range": {
                    "start": { "line": 1, "character": 0 },
                    "end": { "line": 1, "character": 0 }
                },
                "text": "val"
            }]
        }),
    )?;

    let response = bridge.request("textDocument/completion", position(&uri, 1, 3))?;
    let items = response["result"]["items"]
        .as_array()
        .context("completion should answer with a list")?;
    assert_eq!(items.len(), 1, "got {items:?}");
    assert_eq!(items[0]["label"], "value");
    assert_eq!(items[0]["sortText"], "aavalue");
    assert_eq!(items[0]["textEdit"]["newText"], "ue");
    Ok(())
}

#[test]
fn test_navigation_requests() -> Result<()> {
    let mut bridge = Bridge::spawn(&[])?;
    bridge.initialize()?;
    let uri = bridge.open("app.py", "def area(a, b):\n    pass\narea(1, 2)\n")?;

    let hover = bridge.request("textDocument/hover", position(&uri, 2, 1))?;
    assert_eq!(hover["result"]["contents"]["value"], "help: area");

    let definition = bridge.request("textDocument/definition", position(&uri, 2, 1))?;
    assert_eq!(
        definition["result"],
        json!([{
            "uri": uri,
            "range": {"start": {"line": 0, "character": 4}, "end": {"line": 0, "character": 8}}
        }])
    );

    let references = bridge.request(
        "textDocument/references",
        json!({
            "textDocument": { "uri": uri },
            "position": { "line": 2, "character": 1 },
            "context": { "includeDeclaration": true },
        }),
    )?;
    assert_eq!(references["result"].as_array().map(Vec::len), Some(2));

    let signature = bridge.request("textDocument/signatureHelp", position(&uri, 2, 7))?;
    assert_eq!(signature["result"]["signatures"][0]["label"], "area(a, b)");
    assert_eq!(signature["result"]["activeParameter"], 1);

    let symbols = bridge.request(
        "textDocument/documentSymbol",
        json!({ "textDocument": { "uri": uri } }),
    )?;
    assert_eq!(symbols["result"][0]["name"], "area");
    assert_eq!(symbols["result"][0]["kind"], 12);
    Ok(())
}

#[test]
fn test_inline_code_action_returns_document_changes() -> Result<()> {
    let mut bridge = Bridge::spawn(&[])?;
    bridge.initialize()?;
    let uri = bridge.open("app.py", "x = 1\ny = x\n")?;

    let params = json!({
        "textDocument": { "uri": uri },
        "range": {
            "start": { "line": 0, "character": 0 },
            "end": { "line": 0, "character": 0 }
        },
        "context": { "diagnostics": [] },
    });
    let response = bridge.request("textDocument/codeAction", params)?;
    let action = &response["result"][0];
    assert_eq!(action["title"], "Inline variable");
    assert_eq!(action["kind"], "refactor.inline");

    let change = &action["edit"]["documentChanges"][0];
    assert_eq!(change["textDocument"]["uri"], uri);
    assert_eq!(change["textDocument"]["version"], 1);
    assert_eq!(
        change["edits"],
        json!([{
            "range": {"start": {"line": 0, "character": 0}, "end": {"line": 2, "character": 0}},
            "newText": "y = 1\n"
        }])
    );

    let nothing = bridge.request(
        "textDocument/codeAction",
        json!({
            "textDocument": { "uri": uri },
            "range": {
                "start": { "line": 0, "character": 1 },
                "end": { "line": 0, "character": 1 }
            },
            "context": { "diagnostics": [] },
        }),
    )?;
    assert_eq!(nothing["result"], Value::Null);
    Ok(())
}

#[test]
fn test_worker_failure_fails_only_that_request() -> Result<()> {
    let mut bridge = Bridge::spawn(&["--fail-on", "script/complete"])?;
    bridge.initialize()?;
    let uri = bridge.open("app.py", "value = 1\n")?;

    let completion = bridge.request("textDocument/completion", position(&uri, 0, 3))?;
    assert_eq!(completion["error"]["code"], -32603);

    let hover = bridge.request("textDocument/hover", position(&uri, 0, 1))?;
    assert!(hover.get("error").is_none(), "got {hover}");
    Ok(())
}

#[test]
fn test_crashed_worker_surfaces_as_request_errors() -> Result<()> {
    let mut bridge = Bridge::spawn(&["--crash-on-open"])?;
    bridge.initialize()?;
    let uri = bridge.open("app.py", "x = 1\n")?;

    let hover = bridge.request("textDocument/hover", position(&uri, 0, 0))?;
    assert_eq!(hover["error"]["code"], -32603);

    let status = bridge.shutdown()?;
    assert!(status.success());
    Ok(())
}
