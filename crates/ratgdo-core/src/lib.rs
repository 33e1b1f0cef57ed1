// ratgdo-core: Self-healing event-stream clients and device-state projection.

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod live;
pub mod model;
pub mod projector;
pub mod stream;
pub mod watchdog;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{ConnectionState, Dispatch, EventDispatcher, ReconnectingStreamClient};
pub use config::{DeviceAddress, StreamConfig};
pub use discovery::DiscoveryProbe;
pub use error::CoreError;
pub use live::LiveStateClient;
pub use stream::{StateStream, StateWatchStream};
pub use watchdog::LivenessWatchdog;

pub use model::{
    CharacteristicUpdate, CurrentDoorState, DeviceState, DoorOperation, DoorState, Identity,
    LockState, TargetDoorState,
};

// Transport types collaborators need for custom connectors and commands.
pub use ratgdo_api::{CommandClient, Connector, DoorCommand, HttpConnector};
