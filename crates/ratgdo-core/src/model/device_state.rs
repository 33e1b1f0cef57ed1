// ── DeviceState snapshot ──
//
// In-memory projection of one controller. Every field starts unknown and is
// refined by incoming events, last write wins. Collaborators only ever see
// clones.

use serde::Serialize;

use super::door::{CurrentDoorState, DoorOperation, DoorState, LockState, TargetDoorState};
use crate::error::CoreError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceState {
    pub door: DoorState,
    pub operation: DoorOperation,
    /// Percent open, 0–100.
    pub position: Option<u8>,
    pub obstruction_detected: Option<bool>,
    pub firmware_revision: Option<String>,
    pub lock: LockState,
}

impl DeviceState {
    /// Motion wins over the resting state; `None` while the door is
    /// neither moving nor known to be open or closed.
    pub fn current_door_state(&self) -> Option<CurrentDoorState> {
        match (self.operation, self.door) {
            (DoorOperation::Opening, _) => Some(CurrentDoorState::Opening),
            (DoorOperation::Closing, _) => Some(CurrentDoorState::Closing),
            (_, DoorState::Open) => Some(CurrentDoorState::Open),
            (_, DoorState::Closed) => Some(CurrentDoorState::Closed),
            (_, DoorState::Unknown) => None,
        }
    }

    /// Opening targets open, closing targets closed, idle targets where the
    /// door rests.
    ///
    /// Fails rather than guess when the operation is unknown or the idle
    /// door's position is unknown.
    pub fn target_door_state(&self) -> Result<TargetDoorState, CoreError> {
        match (self.operation, self.door) {
            (DoorOperation::Opening, _) => Ok(TargetDoorState::Open),
            (DoorOperation::Closing, _) => Ok(TargetDoorState::Closed),
            (DoorOperation::Idle, DoorState::Open) => Ok(TargetDoorState::Open),
            (DoorOperation::Idle, DoorState::Closed) => Ok(TargetDoorState::Closed),
            (DoorOperation::Idle, DoorState::Unknown) => Err(CoreError::InvariantViolation {
                message: "door is idle but its state is unknown".into(),
            }),
            (DoorOperation::Unknown, _) => Err(CoreError::InvariantViolation {
                message: "current door operation is unknown".into(),
            }),
        }
    }
}

/// A characteristic that changed, pushed to collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "characteristic", content = "value", rename_all = "snake_case")]
pub enum CharacteristicUpdate {
    CurrentDoorState(CurrentDoorState),
    TargetDoorState(TargetDoorState),
    ObstructionDetected(bool),
    LockState(LockState),
    FirmwareRevision(Option<String>),
}
