// ratgdo-api: Event-stream transport and command client for ratgdo (ESPHome) devices

pub mod command;
pub mod error;
pub mod sse;
pub mod stream;
pub mod transport;

pub use command::{CommandClient, DoorCommand};
pub use error::Error;
pub use sse::{SseDecoder, SseEvent};
pub use stream::{Connector, HttpConnector, Notification, StreamHandle};
pub use transport::TransportConfig;
