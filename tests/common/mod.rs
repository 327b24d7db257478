// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! A framed LSP client driving the `pyls-bridge` binary.

#![allow(dead_code, reason = "Each test crate uses a different subset")]

use anyhow::{Context, Result, anyhow, bail};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;
use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Path of the mock analysis worker.
pub const MOCKENGINE: &str = env!("CARGO_BIN_EXE_mockengine");

/// A running bridge with a background reader for its stdout.
pub struct Bridge {
    child: Child,
    stdin: ChildStdin,
    messages: Receiver<Value>,
    /// Messages read while waiting for something else.
    pending: VecDeque<Value>,
    next_id: u64,
    workspace: TempDir,
}

impl Bridge {
    /// Spawns the bridge with `mockengine` plus `worker_args` as its worker.
    pub fn spawn(worker_args: &[&str]) -> Result<Self> {
        let mut worker = vec![MOCKENGINE];
        worker.extend_from_slice(worker_args);
        let worker = worker.join(" ");
        Self::spawn_with(|cmd, _| {
            cmd.arg("--worker").arg(&worker);
        })
    }

    /// Spawns the bridge after `configure` has adjusted its command.
    ///
    /// `configure` also receives the temporary workspace, which doubles as
    /// the config home so user-level settings never leak in.
    pub fn spawn_with(configure: impl FnOnce(&mut Command, &Path)) -> Result<Self> {
        let workspace = tempfile::tempdir()?;

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_pyls-bridge"));
        // Isolate from user-level config
        cmd.env("XDG_CONFIG_HOME", workspace.path());
        cmd.env_remove("PYLS_BRIDGE_PYTHON");
        cmd.env_remove("PYLS_BRIDGE_WORKER_COMMAND");
        configure(&mut cmd, workspace.path());
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().context("Failed to spawn pyls-bridge")?;
        let stdin = child.stdin.take().context("Failed to get stdin")?;
        let stdout = child.stdout.take().context("Failed to get stdout")?;

        let (tx, messages) = mpsc::channel();
        std::thread::spawn(move || {
            let mut reader = BufReader::new(stdout);
            while let Ok(Some(message)) = read_frame(&mut reader) {
                if tx.send(message).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            child,
            stdin,
            messages,
            pending: VecDeque::new(),
            next_id: 1,
            workspace,
        })
    }

    pub fn send(&mut self, message: &Value) -> Result<()> {
        let body = message.to_string();
        write!(self.stdin, "Content-Length: {}\r\n\r\n{body}", body.len())?;
        self.stdin.flush()?;
        Ok(())
    }

    pub fn notify(&mut self, method: &str, params: Value) -> Result<()> {
        self.send(&json!({ "jsonrpc": "2.0", "method": method, "params": params }))
    }

    /// Sends a request and returns its response, keeping anything else
    /// that arrives in the meantime.
    pub fn request(&mut self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;
        self.send(&json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params }))?;
        loop {
            let message = self.next_message()?;
            if message.get("id") == Some(&json!(id)) && message.get("method").is_none() {
                return Ok(message);
            }
            self.pending.push_back(message);
        }
    }

    /// Waits for the params of the next notification with `method`.
    pub fn notification(&mut self, method: &str) -> Result<Value> {
        if let Some(index) = self.pending.iter().position(|m| m["method"] == method) {
            return self
                .pending
                .remove(index)
                .map(|m| m["params"].clone())
                .context("pending message vanished");
        }
        loop {
            let message = self.next_message()?;
            if message["method"] == method {
                return Ok(message["params"].clone());
            }
            self.pending.push_back(message);
        }
    }

    fn next_message(&self) -> Result<Value> {
        self.messages
            .recv_timeout(TIMEOUT)
            .map_err(|e| anyhow!("No message from pyls-bridge: {e}"))
    }

    pub fn initialize(&mut self) -> Result<Value> {
        let root = file_uri(self.workspace.path())?;
        let response = self.request(
            "initialize",
            json!({
                "processId": null,
                "rootUri": root,
                "capabilities": {},
            }),
        )?;
        self.notify("initialized", json!({}))?;
        Ok(response)
    }

    /// Writes `name` into the workspace and opens it.
    pub fn open(&mut self, name: &str, text: &str) -> Result<String> {
        let path = self.workspace.path().join(name);
        std::fs::write(&path, text)?;
        let uri = file_uri(&path)?;
        self.notify(
            "textDocument/didOpen",
            json!({
                "textDocument": {
                    "uri": uri,
                    "languageId": "python",
                    "version": 1,
                    "text": text,
                }
            }),
        )?;
        Ok(uri)
    }

    /// Runs the shutdown handshake and waits for the process to exit.
    pub fn shutdown(mut self) -> Result<ExitStatus> {
        let response = self.request("shutdown", Value::Null)?;
        if response.get("error").is_some() {
            bail!("shutdown failed: {response}");
        }
        self.notify("exit", Value::Null)?;
        Ok(self.child.wait()?)
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}

pub fn file_uri(path: &Path) -> Result<String> {
    url::Url::from_file_path(path)
        .map(String::from)
        .map_err(|()| anyhow!("Not an absolute path: {}", path.display()))
}

/// Text document position params.
pub fn position(uri: &str, line: u32, character: u32) -> Value {
    json!({
        "textDocument": { "uri": uri },
        "position": { "line": line, "character": character },
    })
}

/// Reads one Content-Length framed message; `None` at end of stream.
fn read_frame(reader: &mut impl BufRead) -> Result<Option<Value>> {
    let mut length = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            length = Some(value.trim().parse::<usize>()?);
        }
    }
    let length = length.context("Missing Content-Length header")?;
    let mut body = vec![0; length];
    reader.read_exact(&mut body)?;
    Ok(Some(serde_json::from_slice(&body)?))
}
