/*
 * Copyright (C) 2026 Mark Wells Dev
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

//! JSON-RPC message shapes and Content-Length framing.
//!
//! Both the editor connection and the analysis worker connection use the
//! same framing, so everything here is transport-agnostic.

use anyhow::{Context, Result};
use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};

/// Invalid JSON was received.
pub const PARSE_ERROR: i64 = -32700;
/// The method does not exist.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Invalid method parameters.
pub const INVALID_PARAMS: i64 = -32602;
/// Internal error while handling the request.
pub const INTERNAL_ERROR: i64 = -32603;
/// A request arrived before `initialize`.
pub const SERVER_NOT_INITIALIZED: i64 = -32002;
/// A request arrived after `shutdown`.
pub const INVALID_REQUEST: i64 = -32600;

fn default_null() -> serde_json::Value {
    serde_json::Value::Null
}

/// A JSON-RPC request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RequestMessage {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// Request id echoed in the response.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default = "default_null")]
    pub params: serde_json::Value,
}

/// A JSON-RPC response.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResponseMessage {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// Id of the request being answered.
    pub id: Option<RequestId>,
    /// Result on success. `Some(Value::Null)` serializes as `result: null`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

/// A JSON-RPC notification.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NotificationMessage {
    /// Protocol version, always `"2.0"`.
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default = "default_null")]
    pub params: serde_json::Value,
}

/// Request id, either numeric or textual.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric id.
    Number(i64),
    /// String id.
    String(String),
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResponseError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
    /// Additional data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

impl ResponseMessage {
    /// Builds a successful response. `Value::Null` is sent as `result: null`.
    #[must_use]
    pub fn success(id: RequestId, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    /// Builds an error response.
    #[must_use]
    pub fn error(id: Option<RequestId>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(ResponseError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

impl NotificationMessage {
    /// Builds a notification from serializable params.
    ///
    /// # Errors
    ///
    /// Returns an error if the params cannot be serialized.
    pub fn new<P: Serialize>(method: &str, params: P) -> Result<Self> {
        Ok(Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        })
    }
}

/// An incoming message, classified by the presence of `method` and `id`.
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Has both `method` and `id`.
    Request(RequestMessage),
    /// Has `method` but no `id`.
    Notification(NotificationMessage),
    /// Has `id` but no `method`.
    Response(ResponseMessage),
}

/// Classifies a decoded message body.
///
/// # Errors
///
/// Returns an error if the body is not JSON or matches none of the shapes.
pub fn classify(body: &str) -> Result<Incoming> {
    let value: serde_json::Value = serde_json::from_str(body).context("Invalid JSON body")?;

    let has_method = value.get("method").is_some_and(serde_json::Value::is_string);
    let has_id = value.get("id").is_some_and(|id| !id.is_null());

    let incoming = match (has_method, has_id) {
        (true, true) => Incoming::Request(serde_json::from_value(value)?),
        (true, false) => Incoming::Notification(serde_json::from_value(value)?),
        (false, _) => Incoming::Response(serde_json::from_value(value)?),
    };
    Ok(incoming)
}

/// Frames a serialized message with its Content-Length header.
#[must_use]
pub fn frame(body: &str) -> Vec<u8> {
    let mut out = format!("Content-Length: {}\r\n\r\n", body.len()).into_bytes();
    out.extend_from_slice(body.as_bytes());
    out
}

/// Helper to parse the Content-Length header and body from a buffer
///
/// Returns `Ok(None)` until a complete message is buffered.
///
/// # Errors
///
/// Returns an error if the header block is not UTF-8 or the length is not a number.
pub fn try_parse_message(buffer: &mut BytesMut) -> Result<Option<String>> {
    let Some(header_end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") else {
        return Ok(None);
    };

    let headers_str =
        std::str::from_utf8(&buffer[..header_end]).context("Failed to parse headers as UTF-8")?;

    let mut content_length = None;
    for line in headers_str.lines() {
        if let Some((name, value)) = line.split_once(':')
            && name.trim().eq_ignore_ascii_case("content-length")
        {
            content_length = Some(
                value
                    .trim()
                    .parse::<usize>()
                    .context("Invalid Content-Length")?,
            );
        }
    }

    let Some(content_len) = content_length else {
        // Header block without a length: drop it so the stream can resync.
        buffer.advance(header_end + 4);
        return Ok(None);
    };

    let total_len = header_end + 4 + content_len;
    if buffer.len() < total_len {
        return Ok(None);
    }

    buffer.advance(header_end + 4);
    let message_bytes = buffer.split_to(content_len);
    let message = String::from_utf8(message_bytes.to_vec())?;
    Ok(Some(message))
}
