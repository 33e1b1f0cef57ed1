// ── Device domain model ──
//
// Everything a collaborator reads about a controller: the state snapshot,
// the characteristics derived from it, and the identity from discovery.

pub mod device_state;
pub mod door;
pub mod identity;

pub use device_state::{CharacteristicUpdate, DeviceState};
pub use door::{CurrentDoorState, DoorOperation, DoorState, LockState, TargetDoorState};
pub use identity::Identity;
