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

use anyhow::{Context, Result};
use bytes::BytesMut;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, error, trace, warn};

use super::EngineError;
use crate::lsp::protocol::{self, NotificationMessage, RequestId, RequestMessage, ResponseMessage};

/// Default timeout for worker requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

type PendingMap = Arc<Mutex<HashMap<RequestId, oneshot::Sender<ResponseMessage>>>>;

/// Manages communication with the analysis worker process.
///
/// Outbound frames go through an unbounded channel drained by a writer task,
/// so notifications can be queued from synchronous code (including `Drop`).
pub struct WorkerClient {
    next_id: AtomicI64,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    _reader_handle: tokio::task::JoinHandle<()>,
    _writer_handle: tokio::task::JoinHandle<()>,
    _child: Child,
}

impl WorkerClient {
    /// Spawns the worker process and starts the reader and writer tasks.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be started.
    pub async fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn analysis worker: {program}"))?;

        let stdin = child.stdin.take().context("worker stdin not captured")?;
        let stdout = child.stdout.take().context("worker stdout not captured")?;

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let (outbound, queue) = mpsc::unbounded_channel();

        let writer_handle = tokio::spawn(Self::writer_task(stdin, queue, alive.clone()));
        let reader_handle = tokio::spawn(Self::reader_task(stdout, pending.clone(), alive.clone()));

        Ok(Self {
            next_id: AtomicI64::new(1),
            outbound,
            pending,
            alive,
            _reader_handle: reader_handle,
            _writer_handle: writer_handle,
            _child: child,
        })
    }

    async fn writer_task(
        mut stdin: ChildStdin,
        mut queue: mpsc::UnboundedReceiver<Vec<u8>>,
        alive: Arc<AtomicBool>,
    ) {
        while let Some(frame) = queue.recv().await {
            let written = async {
                stdin.write_all(&frame).await?;
                stdin.flush().await
            }
            .await;
            if let Err(e) = written {
                error!("Error writing to analysis worker: {}", e);
                alive.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    /// Background task that reads worker messages and routes responses to pending requests.
    async fn reader_task(stdout: ChildStdout, pending: PendingMap, alive: Arc<AtomicBool>) {
        let mut reader = BufReader::new(stdout);
        let mut buffer = BytesMut::with_capacity(8192);

        loop {
            let mut temp = [0u8; 4096];
            match reader.read(&mut temp).await {
                Ok(0) => {
                    debug!("Analysis worker stdout closed");
                    break;
                }
                Ok(n) => buffer.extend_from_slice(&temp[..n]),
                Err(e) => {
                    error!("Error reading from analysis worker: {}", e);
                    break;
                }
            }

            loop {
                let message_str = match protocol::try_parse_message(&mut buffer) {
                    Ok(Some(message)) => message,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Dropping malformed worker frame: {}", e);
                        buffer.clear();
                        break;
                    }
                };
                trace!("Received worker message: {}", message_str);

                match protocol::classify(&message_str) {
                    Ok(protocol::Incoming::Response(response)) => {
                        if let Some(id) = &response.id {
                            let mut pending = pending.lock().await;
                            if let Some(sender) = pending.remove(id) {
                                let _ = sender.send(response);
                            } else {
                                warn!("Received response for unknown request id: {:?}", id);
                            }
                        }
                    }
                    Ok(protocol::Incoming::Notification(notification)) => {
                        trace!("Ignoring worker notification: {}", notification.method);
                    }
                    Ok(protocol::Incoming::Request(request)) => {
                        warn!("Ignoring worker request: {}", request.method);
                    }
                    Err(e) => warn!("Failed to parse worker message: {}", e),
                }
            }
        }

        alive.store(false, Ordering::SeqCst);
        // Dropping the senders fails every request still waiting.
        pending.lock().await.clear();
        warn!("Analysis worker reader exiting - worker connection lost");
    }

    /// Sends a request and waits for the response with timeout.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Unavailable`] if the worker is gone or does not
    /// answer in time, the worker's own error if it reports one, and
    /// [`EngineError::Decode`] if the result has the wrong shape.
    pub async fn request<P: serde::Serialize, R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R, EngineError> {
        if !self.is_alive() {
            return Err(EngineError::Unavailable("worker has exited".to_string()));
        }

        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));
        let request = RequestMessage {
            jsonrpc: "2.0".to_string(),
            id: id.clone(),
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        };

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if let Err(e) = self.send_message(&request) {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let response = match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(EngineError::Unavailable(
                    "worker closed connection".to_string(),
                ));
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(EngineError::Unavailable(format!(
                    "request '{method}' timed out after {REQUEST_TIMEOUT:?}"
                )));
            }
        };

        if let Some(error) = response.error {
            let kind = error
                .data
                .as_ref()
                .and_then(|data| data.get("kind"))
                .and_then(serde_json::Value::as_str);
            return Err(match kind {
                Some("refactoring") => EngineError::Refactoring(error.message),
                _ => EngineError::Worker(format!("{}: {}", error.code, error.message)),
            });
        }

        let result = response.result.unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(result)?)
    }

    /// Queues a notification (no response expected).
    ///
    /// # Errors
    ///
    /// Returns an error if the worker is gone or the params cannot be serialized.
    pub fn notify<P: serde::Serialize>(&self, method: &str, params: P) -> Result<(), EngineError> {
        let notification = NotificationMessage {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        };
        self.send_message(&notification)
    }

    fn send_message<T: serde::Serialize>(&self, message: &T) -> Result<(), EngineError> {
        let body = serde_json::to_string(message)?;
        trace!("Sending worker message: {}", body);
        self.outbound
            .send(protocol::frame(&body))
            .map_err(|_| EngineError::Unavailable("worker writer has stopped".to_string()))
    }

    /// Returns true if the worker connection is still alive.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}
