//! Live JSON-RPC link over TCP.
//!
//! Frames are newline-terminated JSON documents. One request is in flight
//! at a time: the connection sits behind an async mutex that is held from
//! write until the correlated response has been read.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::link::RpcLink;
use crate::wire::{self, RpcCommand, RpcReply};

/// An open connection to the server.
struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    async fn roundtrip(&mut self, request: &Value) -> Result<Value> {
        let mut frame = serde_json::to_string(request)?;
        frame.push('\n');
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.flush().await?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Err(LinkError::Closed);
        }
        Ok(serde_json::from_str(line.trim_end())?)
    }
}

/// JSON-RPC client link to a live server.
pub struct JsonRpcLink {
    config: LinkConfig,
    conn: Mutex<Option<Connection>>,
    connected: AtomicBool,
    verbose: AtomicBool,
    next_id: AtomicU64,
}

impl JsonRpcLink {
    /// Create a new, unconnected link.
    #[must_use]
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
            connected: AtomicBool::new(false),
            verbose: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    /// Get the link configuration.
    #[must_use]
    pub const fn config(&self) -> &LinkConfig {
        &self.config
    }

    fn reserve_ids(&self, count: usize) -> u64 {
        self.next_id.fetch_add(count as u64, Ordering::Relaxed)
    }

    /// Send one request frame and read one response frame.
    ///
    /// Any error that leaves the stream in an unknown position drops the
    /// connection, so a late response can never be read as the answer to
    /// a later request.
    async fn exchange(&self, request: &Value) -> Result<Value> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(LinkError::NotConnected)?;

        if self.is_verbose() {
            tracing::info!(endpoint = %self.config.endpoint(), "[verbose] sending: {request}");
        }

        let timeout = self.config.request_timeout();
        let result = match tokio::time::timeout(timeout, conn.roundtrip(request)).await {
            Ok(result) => result,
            Err(_) => Err(LinkError::Timeout(timeout)),
        };

        match &result {
            Ok(response) if self.is_verbose() => {
                tracing::info!(endpoint = %self.config.endpoint(), "[verbose] received: {response}");
            }
            Err(e) if e.drops_connection() => {
                tracing::warn!(
                    endpoint = %self.config.endpoint(),
                    error = %e,
                    "Dropping server connection"
                );
                *guard = None;
                self.connected.store(false, Ordering::Release);
            }
            _ => {}
        }

        result
    }
}

impl std::fmt::Debug for JsonRpcLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcLink")
            .field("endpoint", &self.config.endpoint())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RpcLink for JsonRpcLink {
    async fn connect(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let endpoint = self.config.endpoint();
        let timeout = self.config.connect_timeout();
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&endpoint))
            .await
            .map_err(|_| LinkError::ConnectTimeout {
                endpoint: endpoint.clone(),
                timeout,
            })?
            .map_err(|source| LinkError::Connect {
                endpoint: endpoint.clone(),
                source,
            })?;
        stream.set_nodelay(true)?;

        let (read, write) = stream.into_split();
        *guard = Some(Connection {
            reader: BufReader::new(read),
            writer: write,
        });
        self.connected.store(true, Ordering::Release);

        tracing::debug!(endpoint = %endpoint, "Connected to server");
        Ok(())
    }

    async fn disconnect(&self) {
        let mut guard = self.conn.lock().await;
        if let Some(mut conn) = guard.take() {
            // best effort, the peer may already be gone
            let _ = conn.writer.shutdown().await;
            tracing::debug!(endpoint = %self.config.endpoint(), "Disconnected from server");
        }
        self.connected.store(false, Ordering::Release);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn transmit(&self, method: &str, params: Value) -> RpcReply {
        let id = self.reserve_ids(1);
        let request = wire::request(id, method, &params);

        tracing::debug!(method = %method, id, "Invoking RPC method");

        match self.exchange(&request).await {
            Ok(response) => {
                let reply = wire::decode_response(id, &response);
                if !reply.success {
                    tracing::debug!(method = %method, id, error = %reply.message(), "RPC method failed");
                }
                reply
            }
            Err(e) => {
                tracing::error!(method = %method, id, error = %e, "RPC transport failure");
                RpcReply::fail(e.to_string())
            }
        }
    }

    async fn transmit_batch(&self, batch: &[RpcCommand]) -> Vec<RpcReply> {
        if batch.is_empty() {
            return Vec::new();
        }

        let first_id = self.reserve_ids(batch.len());
        let request = wire::batch_request(first_id, batch);

        tracing::debug!(count = batch.len(), first_id, "Invoking RPC batch");

        match self.exchange(&request).await {
            Ok(response) => wire::decode_batch_response(first_id, batch.len(), &response),
            Err(e) => {
                tracing::error!(count = batch.len(), error = %e, "RPC batch transport failure");
                vec![RpcReply::fail(e.to_string()); batch.len()]
            }
        }
    }

    fn set_verbose(&self, verbose: bool) {
        self.verbose.store(verbose, Ordering::Relaxed);
    }

    fn is_verbose(&self) -> bool {
        self.verbose.load(Ordering::Relaxed)
    }

    fn endpoint(&self) -> String {
        self.config.endpoint()
    }
}
