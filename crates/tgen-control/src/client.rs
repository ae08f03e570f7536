//! Client orchestrator.
//!
//! [`StatelessClient`] owns the link and the port table. It bootstraps a
//! session on `connect`, fans port-scoped operations out over a
//! [`PortSelector`], and folds the per-port results into one
//! [`CmdResult`]. Fan-out is sequential: each port's call completes before
//! the next one is issued, in selector order.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tgen_core::{CoreError, PortId, PortState};
use tgen_rpc::{build_link, RpcCommand, RpcLink, RpcReply};

use crate::error::{ClientError, Result};
use crate::port::Port;
use crate::result::{CmdResult, Reporter, TracingReporter};
use crate::selector::PortSelector;
use crate::telemetry::{NullTelemetry, TelemetrySource};
use crate::types::{ClientConfig, PortSnapshot, StreamDescriptor, StreamId, StreamPack, SystemInfo};

/// Control client for one traffic-generation server.
pub struct StatelessClient {
    config: ClientConfig,
    link: Arc<dyn RpcLink>,
    telemetry: Arc<dyn TelemetrySource>,
    pub(crate) reporter: Arc<dyn Reporter>,
    system_info: Option<SystemInfo>,
    supported_cmds: Vec<String>,
    ports: Vec<Port>,
    connected: bool,
}

impl StatelessClient {
    /// Create a client whose link is built from `config.link`.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let link = build_link(&config.link);
        Self::with_link(config, link)
    }

    /// Create a client over an existing link.
    #[must_use]
    pub fn with_link(config: ClientConfig, link: Arc<dyn RpcLink>) -> Self {
        Self {
            config,
            link,
            telemetry: Arc::new(NullTelemetry),
            reporter: Arc::new(TracingReporter),
            system_info: None,
            supported_cmds: Vec::new(),
            ports: Vec::new(),
            connected: false,
        }
    }

    /// Use `telemetry` as the statistics source.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySource>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Use `reporter` to observe composite-command stages.
    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Bring up a session.
    ///
    /// Connects the link, caches system info and supported commands,
    /// builds the port table, acquires every port and resyncs with the
    /// server. The first failing step ends the sequence and its result is
    /// returned; the client only counts as connected once all steps pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the server's replies cannot be interpreted.
    pub async fn connect(&mut self) -> Result<CmdResult> {
        self.connected = false;

        if let Err(e) = self.link.connect().await {
            tracing::error!(endpoint = %self.link.endpoint(), error = %e, "Connection failed");
            return Ok(CmdResult::fail(e.to_string()));
        }

        let reply = self.transmit("get_system_info", json!({})).await;
        if !reply.success {
            return Ok(CmdResult::from_reply(&reply));
        }
        let info: SystemInfo =
            serde_json::from_value(reply.data).map_err(|e| ClientError::MalformedReply {
                method: "get_system_info",
                reason: e.to_string(),
            })?;

        let reply = self.transmit("get_supported_cmds", json!({})).await;
        if !reply.success {
            return Ok(CmdResult::from_reply(&reply));
        }
        self.supported_cmds =
            serde_json::from_value(reply.data).map_err(|e| ClientError::MalformedReply {
                method: "get_supported_cmds",
                reason: e.to_string(),
            })?;

        self.ports = (0..info.port_count)
            .map(|id| Port::new(PortId::new(id), &self.config.user, Arc::clone(&self.link)))
            .collect();
        tracing::info!(
            endpoint = %self.link.endpoint(),
            port_count = info.port_count,
            version = info.version.as_deref().unwrap_or("unknown"),
            "Discovered server"
        );
        self.system_info = Some(info);

        let rc = self
            .acquire(PortSelector::All, self.config.force_acquire_on_connect)
            .await?;
        if rc.bad() {
            return Ok(rc);
        }

        let rc = self
            .sync_with_server(self.config.sync_streams_on_connect)
            .await?;
        if rc.bad() {
            return Ok(rc);
        }

        self.connected = true;
        tracing::info!(user = %self.config.user, "Session established");
        Ok(CmdResult::ok())
    }

    /// Tear the session down. Safe to call when not connected.
    pub async fn disconnect(&mut self) {
        self.connected = false;
        self.ports.clear();
        self.system_info = None;
        self.supported_cmds.clear();
        self.link.disconnect().await;
    }

    /// Whether `connect` completed.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    // =========================================================================
    // Cached queries (no server traffic)
    // =========================================================================

    /// The client's configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Commands the server advertised.
    #[must_use]
    pub fn supported_cmds(&self) -> &[String] {
        &self.supported_cmds
    }

    /// System info captured at connect time.
    #[must_use]
    pub const fn system_info(&self) -> Option<&SystemInfo> {
        self.system_info.as_ref()
    }

    /// Server software version, when reported.
    #[must_use]
    pub fn server_version(&self) -> Option<&str> {
        self.system_info.as_ref()?.version.as_deref()
    }

    /// Number of ports in the current session.
    #[must_use]
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Ids of all ports.
    #[must_use]
    pub fn port_ids(&self) -> Vec<PortId> {
        self.ports.iter().map(Port::id).collect()
    }

    /// A port by id.
    #[must_use]
    pub fn port(&self, port_id: PortId) -> Option<&Port> {
        self.ports.get(port_id.index())
    }

    /// Ids of ports held by this client.
    #[must_use]
    pub fn acquired_ports(&self) -> Vec<PortId> {
        self.ports
            .iter()
            .filter(|p| p.is_acquired())
            .map(Port::id)
            .collect()
    }

    /// Ids of ports that are transmitting or paused.
    #[must_use]
    pub fn active_ports(&self) -> Vec<PortId> {
        self.ports
            .iter()
            .filter(|p| p.is_active())
            .map(Port::id)
            .collect()
    }

    /// Cached state of every port, in id order.
    #[must_use]
    pub fn port_states(&self) -> Vec<(PortId, PortState)> {
        self.ports.iter().map(|p| (p.id(), p.state())).collect()
    }

    /// An attached stream.
    #[must_use]
    pub fn get_stream(&self, port_id: PortId, stream_id: StreamId) -> Option<&StreamDescriptor> {
        self.port(port_id)?.stream(stream_id)
    }

    /// All streams attached to a port.
    #[must_use]
    pub fn get_all_streams(&self, port_id: PortId) -> Option<&BTreeMap<StreamId, StreamDescriptor>> {
        self.port(port_id).map(Port::streams)
    }

    /// Ids of the streams attached to a port.
    #[must_use]
    pub fn get_stream_id_list(&self, port_id: PortId) -> Vec<StreamId> {
        self.port(port_id).map(Port::stream_ids).unwrap_or_default()
    }

    /// Latest asynchronous statistics snapshot.
    #[must_use]
    pub fn get_stats_async(&self) -> Option<Value> {
        self.telemetry.latest()
    }

    /// `host:port` of the RPC channel.
    #[must_use]
    pub fn connection_endpoint(&self) -> String {
        self.link.endpoint()
    }

    /// Toggle echoing of wire traffic.
    pub fn set_verbose(&self, verbose: bool) {
        self.link.set_verbose(verbose);
    }

    // =========================================================================
    // Server actions
    // =========================================================================

    /// Send a raw command.
    pub async fn transmit(&self, method: &str, params: Value) -> RpcReply {
        self.link.transmit(method, params).await
    }

    /// Send raw commands in one round trip.
    pub async fn transmit_batch(&self, batch: &[RpcCommand]) -> Vec<RpcReply> {
        self.link.transmit_batch(batch).await
    }

    /// Check that the server answers.
    pub async fn ping(&self) -> CmdResult {
        CmdResult::from_reply(&self.transmit("ping", json!({})).await)
    }

    /// Overwrite every port's cache from the server.
    ///
    /// Stops at the first snapshot a port rejects.
    ///
    /// # Errors
    ///
    /// Returns an error if the reply is not a list of snapshots, names a
    /// port outside the table, or carries an unknown state tag.
    pub async fn sync_with_server(&mut self, sync_streams: bool) -> Result<CmdResult> {
        let params = json!({
            "user": self.config.user,
            "sync_streams": sync_streams,
        });
        let reply = self.transmit("sync_user", params).await;
        if !reply.success {
            return Ok(CmdResult::from_reply(&reply));
        }

        let snapshots: Vec<PortSnapshot> =
            serde_json::from_value(reply.data).map_err(|e| ClientError::MalformedReply {
                method: "sync_user",
                reason: e.to_string(),
            })?;

        let port_count = self.ports.len();
        for snapshot in &snapshots {
            let port = self.ports.get_mut(snapshot.port_id.index()).ok_or(
                CoreError::PortOutOfRange {
                    port_id: snapshot.port_id,
                    port_count,
                },
            )?;
            port.sync(snapshot)?;
        }

        tracing::debug!(ports = snapshots.len(), sync_streams, "Synced with server");
        Ok(CmdResult::ok())
    }

    // =========================================================================
    // Port commands
    // =========================================================================

    fn resolve(&self, ports: impl Into<PortSelector>) -> Result<Vec<PortId>> {
        Ok(ports.into().resolve(self.ports.len())?)
    }

    fn port_mut(&mut self, port_id: PortId) -> &mut Port {
        // ids come from `resolve`, which bounds them by the table size
        &mut self.ports[port_id.index()]
    }

    /// Acquire the selected ports.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector names a port that does not exist.
    pub async fn acquire(&mut self, ports: impl Into<PortSelector>, force: bool) -> Result<CmdResult> {
        let mut rc = CmdResult::new();
        for id in self.resolve(ports)? {
            rc.add(self.port_mut(id).acquire(force).await);
        }
        Ok(rc)
    }

    /// Release the selected ports.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector names a port that does not exist.
    pub async fn release(&mut self, ports: impl Into<PortSelector>) -> Result<CmdResult> {
        let mut rc = CmdResult::new();
        for id in self.resolve(ports)? {
            rc.add(self.port_mut(id).release().await);
        }
        Ok(rc)
    }

    /// Attach one stream to each selected port.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector names a port that does not exist.
    pub async fn add_stream(
        &mut self,
        stream_id: StreamId,
        stream: &StreamDescriptor,
        ports: impl Into<PortSelector>,
    ) -> Result<CmdResult> {
        let mut rc = CmdResult::new();
        for id in self.resolve(ports)? {
            rc.add(self.port_mut(id).add_stream(stream_id, stream.clone()).await);
        }
        Ok(rc)
    }

    /// Attach every stream of `packs` to each selected port.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector names a port that does not exist.
    pub async fn add_stream_pack(
        &mut self,
        packs: &[StreamPack],
        ports: impl Into<PortSelector>,
    ) -> Result<CmdResult> {
        let ids = self.resolve(ports)?;
        let mut rc = CmdResult::new();
        for pack in packs {
            rc.add(
                self.add_stream(pack.stream_id, &pack.stream, ids.clone())
                    .await?,
            );
        }
        Ok(rc)
    }

    /// Detach one stream from each selected port.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector names a port that does not exist.
    pub async fn remove_stream(
        &mut self,
        stream_id: StreamId,
        ports: impl Into<PortSelector>,
    ) -> Result<CmdResult> {
        let mut rc = CmdResult::new();
        for id in self.resolve(ports)? {
            rc.add(self.port_mut(id).remove_stream(stream_id).await);
        }
        Ok(rc)
    }

    /// Detach every stream from each selected port.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector names a port that does not exist.
    pub async fn remove_all_streams(&mut self, ports: impl Into<PortSelector>) -> Result<CmdResult> {
        let mut rc = CmdResult::new();
        for id in self.resolve(ports)? {
            rc.add(self.port_mut(id).remove_all_streams().await);
        }
        Ok(rc)
    }

    /// Start traffic on the selected ports.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector names a port that does not exist.
    pub async fn start_traffic(
        &mut self,
        multiplier: f64,
        ports: impl Into<PortSelector>,
    ) -> Result<CmdResult> {
        let mut rc = CmdResult::new();
        for id in self.resolve(ports)? {
            rc.add(self.port_mut(id).start(multiplier).await);
        }
        Ok(rc)
    }

    /// Stop traffic on the selected ports.
    ///
    /// # Errors
    ///
    /// Returns an error if the selector names a port that does not exist.
    pub async fn stop_traffic(
        &mut self,
        ports: impl Into<PortSelector>,
        force: bool,
    ) -> Result<CmdResult> {
        let mut rc = CmdResult::new();
        for id in self.resolve(ports)? {
            rc.add(self.port_mut(id).stop(force).await);
        }
        Ok(rc)
    }
}

impl std::fmt::Debug for StatelessClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatelessClient")
            .field("user", &self.config.user)
            .field("endpoint", &self.link.endpoint())
            .field("connected", &self.connected)
            .field("ports", &self.ports)
            .finish_non_exhaustive()
    }
}
