// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! A deterministic mock analysis worker for testing.
//!
//! Speaks the worker protocol over stdin/stdout using Content-Length framed
//! JSON-RPC and answers from plain text scanning instead of Python. CLI flags
//! control failure modes. No tokio.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Mock analysis worker for integration testing.
#[derive(Parser, Debug)]
#[command(name = "mockengine")]
struct Args {
    /// Return a worker error for this method (repeatable).
    #[arg(long)]
    fail_on: Vec<String>,

    /// Exit without answering the first `script/open` (simulate crash).
    #[arg(long)]
    crash_on_open: bool,
}

/// A JSON-RPC message from the bridge.
#[derive(Debug, Deserialize)]
struct Request {
    id: Option<Value>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

/// A JSON-RPC response.
#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
    data: Value,
}

impl RpcError {
    fn worker(message: String) -> Self {
        Self {
            code: -32603,
            message,
            data: json!({ "kind": "worker" }),
        }
    }

    fn refactoring(message: &str) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
            data: json!({ "kind": "refactoring" }),
        }
    }
}

type Writer = Arc<Mutex<Box<dyn Write + Send>>>;

fn stdout_writer() -> Writer {
    Arc::new(Mutex::new(Box::new(std::io::stdout())))
}

#[cfg(test)]
fn buffer_writer() -> (Writer, Arc<Mutex<Vec<u8>>>) {
    let buf = Arc::new(Mutex::new(Vec::<u8>::new()));
    let writer: Box<dyn Write + Send> = Box::new(SharedVecWriter(buf.clone()));
    (Arc::new(Mutex::new(writer)), buf)
}

/// Write adapter for `Arc<Mutex<Vec<u8>>>` used in tests.
#[cfg(test)]
struct SharedVecWriter(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl Write for SharedVecWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A script opened by the bridge.
struct Script {
    code: String,
    path: Option<String>,
}

impl Script {
    fn line(&self, line: u64) -> Option<&str> {
        let index = usize::try_from(line.checked_sub(1)?).ok()?;
        self.code.lines().nth(index)
    }

    fn module_name(&self) -> String {
        self.path
            .as_deref()
            .and_then(|p| std::path::Path::new(p).file_stem())
            .map_or_else(|| "__main__".to_string(), |s| s.to_string_lossy().into_owned())
    }
}

struct MockEngine {
    args: Args,
    scripts: HashMap<u64, Script>,
    next_handle: u64,
    writer: Writer,
}

impl MockEngine {
    fn new(args: Args, writer: Writer) -> Self {
        Self {
            args,
            scripts: HashMap::new(),
            next_handle: 1,
            writer,
        }
    }

    /// Run the worker, reading from the given reader.
    fn run(&mut self, reader: &mut dyn Read) {
        let mut buffer = Vec::new();
        let mut temp = [0u8; 4096];

        loop {
            match reader.read(&mut temp) {
                Ok(0) | Err(_) => break,
                Ok(n) => buffer.extend_from_slice(&temp[..n]),
            }

            while let Some((message, consumed)) = try_parse_message(&buffer) {
                buffer.drain(..consumed);

                let Ok(request) = serde_json::from_str::<Request>(&message) else {
                    continue;
                };
                self.handle_message(request);
            }
        }
    }

    fn handle_message(&mut self, request: Request) {
        let Some(method) = request.method.clone() else {
            return;
        };
        let Some(id) = request.id else {
            if method == "script/release"
                && let Some(handle) = request.params.get("handle").and_then(Value::as_u64)
            {
                self.scripts.remove(&handle);
            }
            return;
        };

        if self.args.fail_on.iter().any(|m| m == &method) {
            let message = format!("mockengine: configured to fail on {method}");
            self.send_response(id, Err(RpcError::worker(message)));
            return;
        }
        if method == "script/open" && self.args.crash_on_open {
            std::process::exit(1);
        }

        let params = &request.params;
        let result = match method.as_str() {
            "initialize" => Ok(json!({
                "executable": "/mock/bin/python",
                "version": "3.12",
                "sys_path": ["/mock/lib/python3.12"],
            })),
            "script/open" => Ok(self.open(params)),
            "pyflakes/check" => Ok(pyflakes(params)),
            "pycodestyle/check" => Ok(pycodestyle(params)),
            _ => match method.strip_prefix("script/") {
                Some(op) => self.script_request(op, params),
                None => Err(RpcError {
                    code: -32601,
                    message: format!("mockengine: method not found: {method}"),
                    data: Value::Null,
                }),
            },
        };
        self.send_response(id, result);
    }

    fn open(&mut self, params: &Value) -> Value {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.scripts.insert(
            handle,
            Script {
                code: params["code"].as_str().unwrap_or_default().to_string(),
                path: params["path"].as_str().map(str::to_string),
            },
        );
        json!({ "handle": handle })
    }

    fn script_request(&self, op: &str, params: &Value) -> Result<Value, RpcError> {
        let handle = params["handle"].as_u64().unwrap_or_default();
        let script = self
            .scripts
            .get(&handle)
            .ok_or_else(|| RpcError::worker(format!("unknown script handle {handle}")))?;
        let line = params["line"].as_u64().unwrap_or(1);
        let column = params["column"].as_u64().and_then(|c| usize::try_from(c).ok()).unwrap_or(0);

        match op {
            "syntax_errors" => Ok(syntax_errors(script)),
            "names" => Ok(names(script)),
            "complete" => Ok(complete(script, line, column)),
            "help" | "infer" => Ok(describe(script, op, line, column)),
            "signatures" => Ok(signatures(script, line, column)),
            "goto" => Ok(goto(script, line, column)),
            "references" => Ok(references(script, line, column)),
            "inline" => inline(script, line, column),
            _ => Err(RpcError {
                code: -32601,
                message: format!("mockengine: method not found: script/{op}"),
                data: Value::Null,
            }),
        }
    }

    fn send_response(&self, id: Value, result: Result<Value, RpcError>) {
        let (result, error) = match result {
            Ok(value) => (Some(value), None),
            Err(e) => (None, Some(e)),
        };
        let response = Response {
            jsonrpc: "2.0".to_string(),
            id,
            result,
            error,
        };
        let Ok(json) = serde_json::to_string(&response) else {
            return;
        };
        write_framed(&self.writer, &json);
    }
}

/// Every `(:` is a syntax error.
fn syntax_errors(script: &Script) -> Value {
    let errors: Vec<Value> = script
        .code
        .lines()
        .enumerate()
        .filter_map(|(index, text)| {
            let column = text.find("(:")?;
            Some(json!({
                "line": index + 1,
                "column": column,
                "until_line": index + 1,
                "until_column": column + 2,
            }))
        })
        .collect();
    Value::Array(errors)
}

/// Words of the script that extend the word before the cursor.
fn complete(script: &Script, line: u64, column: usize) -> Value {
    let Some(text) = script.line(line) else {
        return json!([]);
    };
    let before = text.get(..column).unwrap_or(text);
    let prefix_start = before
        .rfind(|c: char| !is_word_char(c))
        .map_or(0, |i| i + 1);
    let prefix = &before[prefix_start..];

    let mut words: Vec<&str> = words(&script.code)
        .filter(|w| w.starts_with(prefix) && *w != prefix)
        .collect();
    words.sort_unstable();
    words.dedup();

    Value::Array(
        words
            .into_iter()
            .map(|word| {
                json!({
                    "name": word,
                    "complete": &word[prefix.len()..],
                    "type": "statement",
                    "docstring": "",
                    "signatures": [],
                })
            })
            .collect(),
    )
}

fn describe(script: &Script, op: &str, line: u64, column: usize) -> Value {
    let Some(word) = script.line(line).and_then(|t| extract_word(t, column)) else {
        return json!([]);
    };
    json!([{
        "name": word,
        "module_path": script.path,
        "line": line,
        "column": column,
        "docstring": format!("{op}: {word}"),
    }])
}

/// The call around the cursor, with the comma count as the active parameter.
fn signatures(script: &Script, line: u64, column: usize) -> Value {
    let Some(text) = script.line(line) else {
        return json!([]);
    };
    let before = text.get(..column).unwrap_or(text);
    let Some(open) = before.rfind('(') else {
        return json!([]);
    };
    let name_start = before[..open]
        .rfind(|c: char| !is_word_char(c))
        .map_or(0, |i| i + 1);
    let name = &before[name_start..open];
    if name.is_empty() {
        return json!([]);
    }
    let index = before[open..].matches(',').count();
    json!([{
        "label": format!("{name}(a, b)"),
        "index": index,
        "params": [
            { "name": "a", "kind": "POSITIONAL_OR_KEYWORD", "description": "param a" },
            { "name": "b", "kind": "POSITIONAL_OR_KEYWORD", "description": "param b" },
        ],
    }])
}

/// First `def word`, `class word` or `word =` in the script.
fn goto(script: &Script, line: u64, column: usize) -> Value {
    let Some(word) = script.line(line).and_then(|t| extract_word(t, column)) else {
        return json!([]);
    };
    let found = script.code.lines().enumerate().find_map(|(index, text)| {
        let trimmed = text.trim_start();
        let indent = text.len() - trimmed.len();
        definition(trimmed)
            .filter(|(name, _)| *name == word)
            .map(|(_, offset)| (index, indent + offset))
    });
    found.map_or_else(
        || json!([]),
        |(index, col)| {
            json!([{
                "name": word,
                "module_path": script.path,
                "line": index + 1,
                "column": col,
            }])
        },
    )
}

fn references(script: &Script, line: u64, column: usize) -> Value {
    let Some(word) = script.line(line).and_then(|t| extract_word(t, column)) else {
        return json!([]);
    };
    let mut found = Vec::new();
    for (index, text) in script.code.lines().enumerate() {
        for col in occurrences(text, &word) {
            found.push(json!({
                "name": word,
                "module_path": script.path,
                "line": index + 1,
                "column": col,
            }));
        }
    }
    Value::Array(found)
}

/// Definitions, nested by indentation.
fn names(script: &Script) -> Value {
    let module = script.module_name();
    let mut result = Vec::new();
    // (indent, id, full name) of enclosing definitions.
    let mut scopes: Vec<(usize, usize, String)> = Vec::new();

    for (index, text) in script.code.lines().enumerate() {
        let trimmed = text.trim_start();
        let indent = text.len() - trimmed.len();
        let Some((name, offset)) = definition(trimmed) else {
            continue;
        };
        while scopes.last().is_some_and(|(level, _, _)| *level >= indent) {
            scopes.pop();
        }
        let kind = if trimmed.starts_with("class ") {
            "class"
        } else if trimmed.starts_with("def ") {
            "function"
        } else {
            "statement"
        };
        let parent = scopes.last();
        let parent_full_name = parent.map_or_else(|| module.clone(), |(_, _, n)| n.clone());
        let full_name = format!("{parent_full_name}.{name}");
        let id = result.len();
        result.push(json!({
            "id": id,
            "parent_id": parent.map(|(_, id, _)| *id),
            "name": name,
            "type": kind,
            "line": index + 1,
            "column": indent + offset,
            "full_name": full_name,
            "parent_full_name": parent_full_name,
            "module_name": module,
        }));
        if kind != "statement" {
            scopes.push((indent, id, full_name));
        }
    }
    Value::Array(result)
}

/// Replaces uses of `word` with its assigned value and drops the assignment.
fn inline(script: &Script, line: u64, column: usize) -> Result<Value, RpcError> {
    let word = script
        .line(line)
        .and_then(|t| extract_word(t, column))
        .ok_or_else(|| RpcError::refactoring("There is no name under the cursor"))?;
    let path = script
        .path
        .as_deref()
        .ok_or_else(|| RpcError::refactoring("Cannot inline in an unsaved file"))?;

    let assignment = format!("{word} = ");
    let mut value = None;
    let mut kept = Vec::new();
    for text in script.code.split_inclusive('\n') {
        match text.strip_prefix(&assignment) {
            Some(rest) if value.is_none() => value = Some(rest.trim_end().to_string()),
            _ => kept.push(text),
        }
    }
    let value = value.ok_or_else(|| RpcError::refactoring("No assignment to inline"))?;

    let new_code: String = kept
        .into_iter()
        .map(|text| replace_word(text, &word, &value))
        .collect();
    let mut changed_files = serde_json::Map::new();
    changed_files.insert(
        path.to_string(),
        json!({ "old_code": script.code, "new_code": new_code }),
    );
    Ok(json!({ "changed_files": changed_files }))
}

/// One `UnusedImport` per `import x` whose name is never used again.
fn pyflakes(params: &Value) -> Value {
    let code = params["code"].as_str().unwrap_or_default();
    let mut reports = Vec::new();
    for (index, text) in code.lines().enumerate() {
        let Some(module) = text.strip_prefix("import ").map(str::trim) else {
            continue;
        };
        let uses: usize = code
            .lines()
            .map(|line| occurrences(line, module).len())
            .sum();
        if uses <= 1 {
            reports.push(json!({
                "kind": "flake",
                "category": "UnusedImport",
                "line": index + 1,
                "column": 0,
                "message": format!("'{module}' imported but unused"),
            }));
        }
    }
    Value::Array(reports)
}

/// `E501` for long lines and `W291` for trailing whitespace.
fn pycodestyle(params: &Value) -> Value {
    let max = params["options"]["max_line_length"]
        .as_u64()
        .and_then(|m| usize::try_from(m).ok())
        .unwrap_or(79);
    let mut findings = Vec::new();
    let lines = params["lines"].as_array().cloned().unwrap_or_default();
    for (index, line) in lines.iter().enumerate() {
        let text = line.as_str().unwrap_or_default().trim_end_matches(['\n', '\r']);
        let length = text.chars().count();
        if length > max {
            findings.push(json!({
                "line": index + 1,
                "column": max,
                "text": format!("E501 line too long ({length} > {max} characters)"),
            }));
        }
        let trimmed = text.trim_end();
        if trimmed.len() < text.len() {
            findings.push(json!({
                "line": index + 1,
                "column": trimmed.len(),
                "text": "W291 trailing whitespace",
            }));
        }
    }
    Value::Array(findings)
}

/// Name and column offset of a `def`, `class` or assignment line.
fn definition(trimmed: &str) -> Option<(&str, usize)> {
    for keyword in ["def ", "class "] {
        if let Some(rest) = trimmed.strip_prefix(keyword) {
            let end = rest.find(|c: char| !is_word_char(c)).unwrap_or(rest.len());
            return (end > 0).then(|| (&rest[..end], keyword.len()));
        }
    }
    let end = trimmed.find(|c: char| !is_word_char(c))?;
    let rest = &trimmed[end..];
    (end > 0 && rest.starts_with(" = ")).then(|| (&trimmed[..end], 0))
}

/// Byte columns where `word` appears as a whole word.
fn occurrences(text: &str, word: &str) -> Vec<usize> {
    text.match_indices(word)
        .filter(|(start, _)| {
            let before = text[..*start].chars().next_back();
            let after = text[start + word.len()..].chars().next();
            !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
        })
        .map(|(start, _)| start)
        .collect()
}

fn replace_word(text: &str, word: &str, value: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last = 0;
    for start in occurrences(text, word) {
        result.push_str(&text[last..start]);
        result.push_str(value);
        last = start + word.len();
    }
    result.push_str(&text[last..]);
    result
}

fn words(code: &str) -> impl Iterator<Item = &str> {
    code.split(|c: char| !is_word_char(c))
        .filter(|w| !w.is_empty() && !w.starts_with(|c: char| c.is_ascii_digit()))
}

/// Write a Content-Length framed JSON string.
fn write_framed(writer: &Writer, json: &str) {
    let header = format!("Content-Length: {}\r\n\r\n", json.len());
    let Ok(mut w) = writer.lock() else { return };
    let _ = w.write_all(header.as_bytes());
    let _ = w.write_all(json.as_bytes());
    let _ = w.flush();
}

/// Parse a Content-Length framed message from a buffer.
/// Returns the message string and the number of bytes consumed.
fn try_parse_message(buffer: &[u8]) -> Option<(String, usize)> {
    let header_end = buffer.windows(4).position(|w| w == b"\r\n\r\n")?;
    let headers = std::str::from_utf8(&buffer[..header_end]).ok()?;

    let mut content_length: Option<usize> = None;
    for line in headers.lines() {
        if line.to_ascii_lowercase().starts_with("content-length:") {
            content_length = line
                .split_once(':')
                .and_then(|(_, v)| v.trim().parse().ok());
        }
    }

    let content_length = content_length?;
    let total = header_end + 4 + content_length;

    if buffer.len() < total {
        return None;
    }

    let body = std::str::from_utf8(&buffer[header_end + 4..total]).ok()?;
    Some((body.to_string(), total))
}

/// Extract the word at a given column of a line.
fn extract_word(text: &str, col: usize) -> Option<String> {
    let bytes = text.as_bytes();
    if col >= bytes.len() || !is_word_char(char::from(bytes[col])) {
        return None;
    }

    let start = (0..=col)
        .rev()
        .find(|&i| !is_word_char(char::from(bytes[i])))
        .map_or(0, |i| i + 1);
    let end = (col..bytes.len())
        .find(|&i| !is_word_char(char::from(bytes[i])))
        .unwrap_or(bytes.len());

    Some(text[start..end].to_string())
}

const fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn main() {
    let args = Args::parse();
    let writer = stdout_writer();
    let mut engine = MockEngine::new(args, writer);
    let mut stdin = std::io::stdin().lock();
    engine.run(&mut stdin);
}
