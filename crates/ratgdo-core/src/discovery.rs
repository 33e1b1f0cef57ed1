// ── Discovery probe ──
//
// Runs a reconnecting client until the first well-formed heartbeat, hands
// the identity in its title to the caller, and shuts itself down.
//
// Heartbeat payload:
//
//   {"title":"RATGDO32DISCO ABC123","comment":"","ota":true,"log":true,"lang":"en"}

use std::sync::Arc;

use ratgdo_api::{Connector, HttpConnector, SseEvent};
use serde::Deserialize;
use tokio::sync::{oneshot, watch};
use tracing::{Span, debug, info, info_span, trace, warn};

use crate::client::{ConnectionState, Dispatch, EventDispatcher, ReconnectingStreamClient};
use crate::config::{DeviceAddress, StreamConfig};
use crate::error::CoreError;
use crate::model::Identity;

type IdentityCallback = Box<dyn FnOnce(&DeviceAddress, Identity) + Send>;

#[derive(Deserialize)]
struct PingPayload {
    title: String,
}

struct DiscoveryDispatcher {
    address: DeviceAddress,
    ping_event: String,
    on_identity: Option<IdentityCallback>,
}

impl EventDispatcher for DiscoveryDispatcher {
    fn dispatch(&mut self, event: &SseEvent) -> Result<Dispatch, CoreError> {
        if event.name != self.ping_event {
            trace!(event = %event.name, "not a heartbeat; ignoring");
            return Ok(Dispatch::Continue);
        }

        if event.data.is_empty() {
            warn!("skipping empty ping");
            return Ok(Dispatch::Continue);
        }

        let ping: PingPayload = serde_json::from_str(&event.data).map_err(|e| {
            debug!(data = %event.data, "unparseable ping");
            CoreError::decode(&self.ping_event, e)
        })?;

        let identity = Identity::from_title(&ping.title).ok_or_else(|| {
            CoreError::decode(
                &self.ping_event,
                format!("title {:?} does not hold a model and a serial", ping.title),
            )
        })?;

        info!(model = %identity.model, serial = %identity.serial, "publishing accessory with model data");
        if let Some(callback) = self.on_identity.take() {
            callback(&self.address, identity);
        }
        debug!("callback called; shutting down this listener");

        Ok(Dispatch::Terminate)
    }
}

/// One-shot identity handshake with a device.
///
/// Retries forever at the client's cadence until a heartbeat with a usable
/// title arrives, or until [`close`](Self::close) is called. The callback
/// fires at most once.
#[derive(Debug, Clone)]
pub struct DiscoveryProbe {
    client: ReconnectingStreamClient,
}

impl DiscoveryProbe {
    /// Start probing over HTTP.
    pub fn spawn<F>(
        address: DeviceAddress,
        config: StreamConfig,
        logger: &Span,
        on_identity: F,
    ) -> Result<Self, CoreError>
    where
        F: FnOnce(&DeviceAddress, Identity) + Send + 'static,
    {
        let http = config.transport().build_stream_client()?;
        let connector = Arc::new(HttpConnector::new(http));
        Self::spawn_with_connector(address, config, logger, connector, on_identity)
    }

    /// Start probing over a caller-supplied connector.
    pub fn spawn_with_connector<F>(
        address: DeviceAddress,
        config: StreamConfig,
        logger: &Span,
        connector: Arc<dyn Connector>,
        on_identity: F,
    ) -> Result<Self, CoreError>
    where
        F: FnOnce(&DeviceAddress, Identity) + Send + 'static,
    {
        let span = info_span!(parent: logger, "discovery", device = %address);
        let dispatcher = DiscoveryDispatcher {
            address: address.clone(),
            ping_event: config.keepalive_event.clone(),
            on_identity: Some(Box::new(on_identity)),
        };

        let client = ReconnectingStreamClient::spawn(address, config, connector, dispatcher, span)?;
        Ok(Self { client })
    }

    /// Probe over HTTP and wait for the identity.
    ///
    /// Never gives up on its own; wrap it in a timeout if needed. Dropping
    /// the future stops the probe.
    pub async fn discover(address: DeviceAddress, config: StreamConfig) -> Result<Identity, CoreError> {
        let http = config.transport().build_stream_client()?;
        Self::discover_with_connector(address, config, Arc::new(HttpConnector::new(http))).await
    }

    pub async fn discover_with_connector(
        address: DeviceAddress,
        config: StreamConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Identity, CoreError> {
        let (tx, rx) = oneshot::channel();
        let probe = Self::spawn_with_connector(address, config, &Span::current(), connector, move |_, identity| {
            let _ = tx.send(identity);
        })?;
        let _guard = CloseOnDrop(probe);

        rx.await.map_err(|_| CoreError::Closed)
    }

    pub fn address(&self) -> &DeviceAddress {
        self.client.address()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.client.watch_state()
    }

    /// Give up on the handshake. No callback fires after this returns.
    pub fn close(&self) {
        self.client.close();
    }

    /// Wait until the probe has shut down, by success or by `close()`.
    pub async fn terminated(&self) {
        self.client.terminated().await;
    }
}

struct CloseOnDrop(DiscoveryProbe);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}
