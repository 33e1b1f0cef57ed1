// ── DeviceState projector ──
//
// Pure decode + merge. `decode_state` turns a raw `state` event payload into
// a typed `StateEvent`; `apply_state_event` merges it into a `DeviceState`
// and reports which characteristics changed. `apply_log_line` is the
// bootstrap fallback that reads the door state out of the text log channel
// until a structured reading arrives.
//
// ESPHome entity ids look like `<domain>-<object_id>`, e.g. `cover-door`,
// `binary_sensor-obstruction`, `text_sensor-firmware_version`.

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::error::CoreError;
use crate::model::{
    CharacteristicUpdate, DeviceState, DoorOperation, DoorState, LockState,
};

const STATE_EVENT: &str = "state";

const COVER_DOOR_ID: &str = "cover-door";
const FIRMWARE_ID: &str = "text_sensor-firmware_version";
const REMOTE_LOCK_ID: &str = "lock-lock_remotes";
const BINARY_SENSOR_PREFIX: &str = "binary_sensor-";
const BUTTON_PREFIX: &str = "button-";

const OBSTRUCTION_SENSOR: &str = "obstruction";
const DRY_CONTACT_PREFIX: &str = "dry_contact_";

const LOG_DOOR_OPEN: &str = "Door state=OPEN";
const LOG_DOOR_CLOSED: &str = "Door state=CLOSED";

// ── Decoded events ───────────────────────────────────────────────────

/// A `state` event, classified by entity id.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    CoverDoor {
        door: DoorState,
        operation: DoorOperation,
        /// Percent open, if the device reported a position.
        position: Option<u8>,
    },
    BinarySensor {
        sensor: String,
        name: String,
        value: bool,
        state: String,
    },
    Button {
        button: String,
        name: String,
    },
    FirmwareVersion {
        value: Option<String>,
        state: Option<String>,
    },
    RemoteLock {
        value: serde_json::Value,
        state: String,
    },
    /// Any entity this client has no use for.
    Other { id: String },
}

// ── Wire payloads ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Envelope {
    id: String,
}

#[derive(Deserialize)]
struct CoverPayload {
    state: String,
    current_operation: String,
    #[serde(default)]
    position: Option<f64>,
}

#[derive(Deserialize)]
struct BinarySensorPayload {
    #[serde(default)]
    name: String,
    value: bool,
    #[serde(default)]
    state: String,
}

#[derive(Deserialize)]
struct ButtonPayload {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct TextSensorPayload {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Deserialize)]
struct LockPayload {
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    state: String,
}

fn parse<'a, T: Deserialize<'a>>(payload: &'a str) -> Result<T, CoreError> {
    serde_json::from_str(payload).map_err(|e| CoreError::decode(STATE_EVENT, e))
}

/// Decode a `state` event payload.
pub fn decode_state(payload: &str) -> Result<StateEvent, CoreError> {
    let Envelope { id } = parse(payload)?;

    if id == COVER_DOOR_ID {
        let cover: CoverPayload = parse(payload)?;
        return Ok(StateEvent::CoverDoor {
            door: DoorState::from_device(&cover.state),
            operation: DoorOperation::from_device(&cover.current_operation),
            position: cover.position.map(fraction_to_percent),
        });
    }

    if let Some(sensor) = id.strip_prefix(BINARY_SENSOR_PREFIX) {
        let b: BinarySensorPayload = parse(payload)?;
        return Ok(StateEvent::BinarySensor {
            sensor: sensor.to_owned(),
            name: b.name,
            value: b.value,
            state: b.state,
        });
    }

    if let Some(button) = id.strip_prefix(BUTTON_PREFIX) {
        let b: ButtonPayload = parse(payload)?;
        return Ok(StateEvent::Button {
            button: button.to_owned(),
            name: b.name,
        });
    }

    if id == FIRMWARE_ID {
        let t: TextSensorPayload = parse(payload)?;
        return Ok(StateEvent::FirmwareVersion {
            value: t.value,
            state: t.state,
        });
    }

    if id == REMOTE_LOCK_ID {
        let l: LockPayload = parse(payload)?;
        return Ok(StateEvent::RemoteLock {
            value: l.value,
            state: l.state,
        });
    }

    Ok(StateEvent::Other { id })
}

/// ESPHome reports cover position as a fraction, 0.0 closed to 1.0 open.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::as_conversions)]
fn fraction_to_percent(fraction: f64) -> u8 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u8
}

// ── Merge ────────────────────────────────────────────────────────────

/// Merge a decoded event into the snapshot.
///
/// Returns the characteristics to push to collaborators. A firmware
/// value/state mismatch clears the revision and returns
/// [`CoreError::Corroboration`] so the caller can log it.
pub fn apply_state_event(
    state: &mut DeviceState,
    event: StateEvent,
) -> Result<Vec<CharacteristicUpdate>, CoreError> {
    let mut updates = Vec::new();

    match event {
        StateEvent::CoverDoor {
            door,
            operation,
            position,
        } => {
            state.door = door;
            state.operation = operation;
            state.position = position;
            debug!(%door, %operation, ?position, "door update");

            if let Some(current) = state.current_door_state() {
                updates.push(CharacteristicUpdate::CurrentDoorState(current));
            }
            match state.target_door_state() {
                Ok(target) => updates.push(CharacteristicUpdate::TargetDoorState(target)),
                Err(e) => warn!(error = %e, "target door state not published"),
            }
        }

        StateEvent::BinarySensor {
            sensor,
            name,
            value,
            state: reported,
        } => {
            if sensor == OBSTRUCTION_SENSOR {
                state.obstruction_detected = Some(value);
                updates.push(CharacteristicUpdate::ObstructionDetected(value));
            } else if sensor.starts_with(DRY_CONTACT_PREFIX) {
                info!(sensor = %sensor, name = %name, state = %reported, value, "dry contact reported");
            } else {
                info!(sensor = %sensor, name = %name, state = %reported, value, "sensor reported");
            }
        }

        StateEvent::Button { button, name } => {
            info!(button = %button, name = %name, "button exists");
        }

        StateEvent::FirmwareVersion { value, state: reported } => match value {
            Some(v) if !v.is_empty() && reported.as_deref() == Some(v.as_str()) => {
                info!(firmware = %v, "firmware version");
                state.firmware_revision = Some(v.clone());
                updates.push(CharacteristicUpdate::FirmwareRevision(Some(v)));
            }
            value => {
                state.firmware_revision = None;
                return Err(CoreError::Corroboration {
                    value: value.unwrap_or_default(),
                    state: reported.unwrap_or_default(),
                });
            }
        },

        StateEvent::RemoteLock { value, state: reported } => {
            state.lock = LockState::from_device(&reported);
            match state.lock {
                LockState::Secured => info!("remote lock is LOCKED"),
                LockState::Unsecured => info!("remote lock is UNLOCKED"),
                LockState::Unknown => {
                    warn!(value = %value, state = %reported, "unsupported remote-lock state");
                }
            }
            updates.push(CharacteristicUpdate::LockState(state.lock));
        }

        StateEvent::Other { id } => {
            debug!(id = %id, "discarding uninteresting state event");
        }
    }

    Ok(updates)
}

/// Seed the door state from a text log line while it is still unknown.
///
/// Log lines look like `\x1b[0;36m[D][ratgdo:123]: Door state=OPEN\x1b[0m`.
/// Once the door state is known by any means, log lines are ignored.
pub fn apply_log_line(state: &mut DeviceState, line: &str) -> Vec<CharacteristicUpdate> {
    if state.door.is_known() {
        return Vec::new();
    }

    let Some((_, message)) = line.split_once(": ") else {
        debug!(line = %line, "log line has no message separator; skipping");
        return Vec::new();
    };

    let door = if message.starts_with(LOG_DOOR_OPEN) {
        DoorState::Open
    } else if message.starts_with(LOG_DOOR_CLOSED) {
        DoorState::Closed
    } else {
        return Vec::new();
    };

    state.door = door;
    debug!(%door, "door state seeded from log");

    state
        .current_door_state()
        .map(CharacteristicUpdate::CurrentDoorState)
        .into_iter()
        .collect()
}

/// Log a projector failure at the level its kind deserves.
pub(crate) fn log_failure(err: &CoreError) {
    match err {
        CoreError::Corroboration { value, state } => {
            error!(value = %value, state = %state, "mismatched firmware versions in value/state");
        }
        other => error!(error = %other, "cannot apply state event"),
    }
}
