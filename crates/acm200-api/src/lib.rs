// acm200-api: Async Rust client for the Blustream ACM200 ASCII command interface

pub mod client;
pub mod error;
pub mod protocol;
pub mod transport;

pub use client::{DeviceClient, SwitchReceipt};
pub use error::{Error, IoStep};
pub use protocol::{RouteMap, StatusTarget};
pub use transport::{DeviceAddress, TcpTransport, Transport, TransportConfig};
