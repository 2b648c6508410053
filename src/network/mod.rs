//! WebSocket side of the telemetry feed: wire types, decoding, endpoint resolution,
//! the connection state machine and the socket transport.
pub mod address;
pub mod decoder;
pub mod protocol;
pub mod reconnect;
pub mod transport;

pub use address::{resolve_address, WsAddress};
pub use decoder::FrameDecoder;
pub use reconnect::{ConnectionManager, ConnectionState, ConnectionStatus, RetryPolicy};
pub use transport::{Connector, Link, TransportEvent, TransportEventKind, WsConnector};
