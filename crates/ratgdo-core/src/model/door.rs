// ── Door, operation and lock enums ──
//
// `DoorState`/`DoorOperation`/`LockState` mirror what the device reports.
// `CurrentDoorState`/`TargetDoorState` are the derived, externally visible
// characteristics computed in `DeviceState`.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Resting position as last reported by the `cover-door` entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DoorState {
    Closed,
    Open,
    #[default]
    Unknown,
}

impl DoorState {
    /// Map the device's `state` string (`"OPEN"` / `"CLOSED"`).
    pub fn from_device(raw: &str) -> Self {
        match raw {
            "OPEN" => Self::Open,
            "CLOSED" => Self::Closed,
            _ => Self::Unknown,
        }
    }

    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Motion as last reported by the `cover-door` entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DoorOperation {
    Idle,
    Opening,
    Closing,
    #[default]
    Unknown,
}

impl DoorOperation {
    /// Map the device's `current_operation` string.
    pub fn from_device(raw: &str) -> Self {
        match raw {
            "IDLE" => Self::Idle,
            "OPENING" => Self::Opening,
            "CLOSING" => Self::Closing,
            _ => Self::Unknown,
        }
    }
}

/// State of the remote-control lockout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LockState {
    Secured,
    Unsecured,
    #[default]
    Unknown,
}

impl LockState {
    /// Map the `lock-lock_remotes` `state` string.
    pub fn from_device(raw: &str) -> Self {
        match raw {
            "LOCKED" => Self::Secured,
            "UNLOCKED" => Self::Unsecured,
            _ => Self::Unknown,
        }
    }
}

/// What the door is doing right now, motion taking priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CurrentDoorState {
    Open,
    Closed,
    Opening,
    Closing,
}

/// Where the door is headed (or resting, when idle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TargetDoorState {
    Open,
    Closed,
}

impl TargetDoorState {
    /// The command that drives the door toward this target.
    pub fn command(self) -> ratgdo_api::DoorCommand {
        match self {
            Self::Open => ratgdo_api::DoorCommand::Open,
            Self::Closed => ratgdo_api::DoorCommand::Close,
        }
    }
}
