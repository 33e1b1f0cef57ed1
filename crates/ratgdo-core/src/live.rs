// ── Live state client ──
//
// Keeps a device's event stream up for as long as the owner wants, projects
// every `state` event into a `DeviceState` snapshot and broadcasts the
// characteristics that changed. Never stops on its own.

use std::sync::Arc;

use ratgdo_api::{CommandClient, Connector, HttpConnector, SseEvent};
use tokio::sync::{broadcast, watch};
use tracing::{Span, debug, info, info_span, trace};

use crate::client::{ConnectionState, Dispatch, EventDispatcher, ReconnectingStreamClient};
use crate::config::{DeviceAddress, StreamConfig};
use crate::error::CoreError;
use crate::model::{
    CharacteristicUpdate, CurrentDoorState, DeviceState, LockState, TargetDoorState,
};
use crate::projector;
use crate::stream::StateStream;

const STATE_EVENT: &str = "state";
const LOG_EVENT: &str = "log";
const UPDATE_CHANNEL_SIZE: usize = 64;

// ── Dispatcher ───────────────────────────────────────────────────────

struct LiveDispatcher {
    keepalive_event: String,
    state: watch::Sender<DeviceState>,
    updates: broadcast::Sender<CharacteristicUpdate>,
    last_log: Option<String>,
}

impl LiveDispatcher {
    fn publish(&self, updates: Vec<CharacteristicUpdate>) {
        for update in updates {
            // No receivers is fine.
            let _ = self.updates.send(update);
        }
    }

    fn on_state(&self, payload: &str) -> Result<(), CoreError> {
        let event = projector::decode_state(payload)?;

        let mut outcome = Ok(Vec::new());
        self.state.send_if_modified(|state| {
            let before = state.clone();
            outcome = projector::apply_state_event(state, event);
            *state != before
        });

        match outcome {
            Ok(updates) => {
                self.publish(updates);
                Ok(())
            }
            Err(e @ CoreError::Corroboration { .. }) => {
                projector::log_failure(&e);
                self.publish(vec![CharacteristicUpdate::FirmwareRevision(None)]);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn on_log(&mut self, line: &str) {
        debug!(line = %line, "esphome log");
        self.last_log = Some(line.to_owned());

        let mut updates = Vec::new();
        self.state.send_if_modified(|state| {
            updates = projector::apply_log_line(state, line);
            !updates.is_empty()
        });
        self.publish(updates);
    }
}

impl EventDispatcher for LiveDispatcher {
    fn dispatch(&mut self, event: &SseEvent) -> Result<Dispatch, CoreError> {
        match event.name.as_str() {
            STATE_EVENT => self.on_state(&event.data)?,
            LOG_EVENT => self.on_log(&event.data),
            name if name == self.keepalive_event => trace!("keepalive"),
            name => debug!(event = %name, "ignoring event"),
        }
        Ok(Dispatch::Continue)
    }

    fn diagnostic(&self) -> Option<&str> {
        self.last_log.as_deref()
    }
}

// ── LiveStateClient ──────────────────────────────────────────────────

/// Live, queryable view of one device.
///
/// Queries read a snapshot; nothing here blocks on the network. Call
/// [`close`](Self::close) on shutdown.
#[derive(Debug, Clone)]
pub struct LiveStateClient {
    client: ReconnectingStreamClient,
    state: watch::Receiver<DeviceState>,
    updates: broadcast::Sender<CharacteristicUpdate>,
    commands: CommandClient,
}

impl LiveStateClient {
    /// Start streaming over HTTP.
    pub fn spawn(address: DeviceAddress, config: StreamConfig, logger: &Span) -> Result<Self, CoreError> {
        let http = config.transport().build_stream_client()?;
        let connector = Arc::new(HttpConnector::new(http));
        Self::spawn_with_connector(address, config, logger, connector)
    }

    /// Start streaming over a caller-supplied connector. Door commands
    /// still go over HTTP.
    pub fn spawn_with_connector(
        address: DeviceAddress,
        config: StreamConfig,
        logger: &Span,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, CoreError> {
        let commands = CommandClient::new(
            config.transport().build_command_client()?,
            address.base_url()?,
        );

        let (state_tx, state) = watch::channel(DeviceState::default());
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);

        let dispatcher = LiveDispatcher {
            keepalive_event: config.keepalive_event.clone(),
            state: state_tx,
            updates: updates.clone(),
            last_log: None,
        };

        let span = info_span!(parent: logger, "live", device = %address);
        let client = ReconnectingStreamClient::spawn(address, config, connector, dispatcher, span)?;

        Ok(Self {
            client,
            state,
            updates,
            commands,
        })
    }

    pub fn address(&self) -> &DeviceAddress {
        self.client.address()
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Copy of the whole snapshot.
    pub fn snapshot(&self) -> DeviceState {
        self.state.borrow().clone()
    }

    /// `None` until the door has reported motion or a resting position.
    pub fn current_door_state(&self) -> Option<CurrentDoorState> {
        self.state.borrow().current_door_state()
    }

    /// Fails with [`CoreError::InvariantViolation`] rather than guess.
    pub fn target_door_state(&self) -> Result<TargetDoorState, CoreError> {
        let state = self.state.borrow();
        let target = state.target_door_state()?;
        debug!(%target, operation = %state.operation, door = %state.door, "target door state");
        Ok(target)
    }

    pub fn obstruction_detected(&self) -> Option<bool> {
        self.state.borrow().obstruction_detected
    }

    pub fn lock_state(&self) -> LockState {
        self.state.borrow().lock
    }

    pub fn firmware_revision(&self) -> Option<String> {
        self.state.borrow().firmware_revision.clone()
    }

    /// Percent open.
    pub fn position(&self) -> Option<u8> {
        self.state.borrow().position
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Whole-snapshot subscription.
    pub fn subscribe(&self) -> StateStream {
        StateStream::new(self.state.clone())
    }

    /// Characteristic change notifications.
    pub fn changes(&self) -> broadcast::Receiver<CharacteristicUpdate> {
        self.updates.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.client.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.client.watch_state()
    }

    // ── Commands & lifecycle ─────────────────────────────────────────

    /// Ask the door to move. Fire-and-forget; the outcome shows up on the
    /// event stream.
    pub fn request_target(&self, target: TargetDoorState) {
        info!(%target, "set target door state");
        self.commands.send_detached(target.command());
    }

    /// The command client, for callers that want to await the response.
    pub fn commands(&self) -> &CommandClient {
        &self.commands
    }

    /// Stop streaming. No change notification is sent after this returns.
    pub fn close(&self) {
        self.client.close();
    }

    pub async fn terminated(&self) {
        self.client.terminated().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{DoorOperation, DoorState};
    use crate::testing::{FakeConnector, FakeSession, wait_for_state};

    const CLOSED_IDLE: &str =
        r#"{"id":"cover-door","value":0,"state":"CLOSED","current_operation":"IDLE","position":0}"#;
    const OPENING: &str =
        r#"{"id":"cover-door","value":0,"state":"CLOSED","current_operation":"OPENING","position":0.3}"#;

    async fn start() -> (LiveStateClient, FakeConnector, FakeSession) {
        let connector = FakeConnector::new();
        let client = LiveStateClient::spawn_with_connector(
            DeviceAddress::new("10.0.0.5", 80),
            StreamConfig::default(),
            &Span::none(),
            Arc::new(connector.clone()),
        )
        .unwrap();

        let session = connector.next_session().await;
        session.open().await;
        wait_for_state(&client.watch_connection(), ConnectionState::Connected).await;
        (client, connector, session)
    }

    /// Send a state event and wait until the snapshot reflects it.
    async fn push(client: &LiveStateClient, session: &FakeSession, payload: &str) {
        let mut stream = client.subscribe();
        session.event("state", payload).await;
        stream.changed().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn queries_start_unknown() {
        let (client, _connector, _session) = start().await;

        assert_eq!(client.current_door_state(), None);
        assert!(matches!(
            client.target_door_state(),
            Err(CoreError::InvariantViolation { .. })
        ));
        assert_eq!(client.obstruction_detected(), None);
        assert_eq!(client.lock_state(), LockState::Unknown);
        assert_eq!(client.firmware_revision(), None);
        assert_eq!(client.position(), None);
        client.close();
    }

    #[tokio::test(start_paused = true)]
    async fn cover_door_drives_door_queries() {
        let (client, _connector, session) = start().await;

        push(&client, &session, CLOSED_IDLE).await;
        assert_eq!(client.current_door_state(), Some(CurrentDoorState::Closed));
        assert_eq!(client.target_door_state().unwrap(), TargetDoorState::Closed);

        push(&client, &session, OPENING).await;
        assert_eq!(client.current_door_state(), Some(CurrentDoorState::Opening));
        assert_eq!(client.target_door_state().unwrap(), TargetDoorState::Open);
        assert_eq!(client.position(), Some(30));
        client.close();
    }

    #[tokio::test(start_paused = true)]
    async fn changes_are_broadcast() {
        let (client, _connector, session) = start().await;
        let mut changes = client.changes();

        session.event("state", OPENING).await;
        session
            .event("state", r#"{"id":"binary_sensor-obstruction","name":"Obstruction","value":true,"state":"ON"}"#)
            .await;
        session
            .event("state", r#"{"id":"lock-lock_remotes","value":1,"state":"LOCKED"}"#)
            .await;

        assert_eq!(
            changes.recv().await.unwrap(),
            CharacteristicUpdate::CurrentDoorState(CurrentDoorState::Opening)
        );
        assert_eq!(
            changes.recv().await.unwrap(),
            CharacteristicUpdate::TargetDoorState(TargetDoorState::Open)
        );
        assert_eq!(
            changes.recv().await.unwrap(),
            CharacteristicUpdate::ObstructionDetected(true)
        );
        assert_eq!(
            changes.recv().await.unwrap(),
            CharacteristicUpdate::LockState(LockState::Secured)
        );
        assert_eq!(client.obstruction_detected(), Some(true));
        assert_eq!(client.lock_state(), LockState::Secured);
        client.close();
    }

    #[tokio::test(start_paused = true)]
    async fn firmware_corroboration() {
        let (client, _connector, session) = start().await;
        let mut changes = client.changes();

        push(
            &client,
            &session,
            r#"{"id":"text_sensor-firmware_version","value":"1.2.3","state":"1.2.3"}"#,
        )
        .await;
        assert_eq!(client.firmware_revision().as_deref(), Some("1.2.3"));

        push(
            &client,
            &session,
            r#"{"id":"text_sensor-firmware_version","value":"1.2.3","state":"1.2.4"}"#,
        )
        .await;
        assert_eq!(client.firmware_revision(), None);

        assert_eq!(
            changes.recv().await.unwrap(),
            CharacteristicUpdate::FirmwareRevision(Some("1.2.3".into()))
        );
        assert_eq!(
            changes.recv().await.unwrap(),
            CharacteristicUpdate::FirmwareRevision(None)
        );
        assert_eq!(client.connection_state(), ConnectionState::Connected);
        client.close();
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_state_keeps_stream_and_snapshot() {
        let (client, connector, session) = start().await;
        push(&client, &session, CLOSED_IDLE).await;
        let before = client.snapshot();

        session.event("state", "").await;
        session.event("state", "{garbage").await;
        session.event("state", r#"{"id":"cover-door"}"#).await;
        push(
            &client,
            &session,
            r#"{"id":"binary_sensor-obstruction","name":"Obstruction","value":false,"state":"OFF"}"#,
        )
        .await;

        let after = client.snapshot();
        assert_eq!(after.door, before.door);
        assert_eq!(after.operation, before.operation);
        assert_eq!(after.obstruction_detected, Some(false));
        assert_eq!(connector.opens(), 1);
        assert!(!session.is_closed());
        client.close();
    }

    #[tokio::test(start_paused = true)]
    async fn log_fallback_until_structured_state() {
        let (client, _connector, session) = start().await;

        let mut stream = client.subscribe();
        session
            .event("log", "\u{1b}[0;36m[D][ratgdo:412]: Door state=OPEN foo\u{1b}[0m")
            .await;
        stream.changed().await.unwrap();
        assert_eq!(client.snapshot().door, DoorState::Open);

        push(&client, &session, CLOSED_IDLE).await;
        assert_eq!(client.snapshot().door, DoorState::Closed);

        session.event("log", "[D][ratgdo:412]: Door state=OPEN").await;
        // A later state event proves the log line was processed first.
        push(
            &client,
            &session,
            r#"{"id":"lock-lock_remotes","value":0,"state":"UNLOCKED"}"#,
        )
        .await;
        assert_eq!(client.snapshot().door, DoorState::Closed);
        assert_eq!(client.snapshot().operation, DoorOperation::Idle);
        client.close();
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_holds_connection_and_state_survives_reconnect() {
        let (client, connector, session) = start().await;
        push(&client, &session, CLOSED_IDLE).await;

        for _ in 0..3 {
            tokio::time::sleep(Duration::from_secs(15)).await;
            session.event("ping", "").await;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(connector.opens(), 1);

        // Silence: watchdog cycles the connection, snapshot is kept.
        let next = connector.next_session().await;
        assert!(session.is_closed());
        assert_eq!(client.current_door_state(), Some(CurrentDoorState::Closed));

        next.open().await;
        wait_for_state(&client.watch_connection(), ConnectionState::Connected).await;
        client.close();
    }

    #[tokio::test(start_paused = true)]
    async fn no_notifications_after_close() {
        let (client, _connector, session) = start().await;
        let mut changes = client.changes();

        client.close();
        client.close();
        session.event("state", OPENING).await;
        client.terminated().await;

        assert!(matches!(
            changes.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
        assert_eq!(client.current_door_state(), None);
    }
}
