// acm200-core: Routing poller and per-device facade between acm200-api and consumers (CLI).

pub mod config;
pub mod error;
pub mod matrix;
pub mod model;
pub mod poller;
pub mod sink;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::MatrixConfig;
pub use error::CoreError;
pub use matrix::{Matrix, RoutingControl};
pub use poller::{PollPhase, RoutingPoller};
pub use sink::{PollStatus, RouteSink};

pub use model::{DeviceInfo, InputLabels, Route, RoutingSnapshot, output_name, unique_labels};

// Transport-level types consumers commonly need alongside the facade.
pub use acm200_api::{DeviceAddress, SwitchReceipt, Transport, TransportConfig};
