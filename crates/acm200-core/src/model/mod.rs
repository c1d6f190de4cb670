// ── Domain model ──
//
// Routing snapshots, display labels, and device identity. Plain data;
// nothing in here performs I/O.

pub mod device;
pub mod labels;
pub mod snapshot;

pub use device::DeviceInfo;
pub use labels::{InputLabels, output_name, unique_labels};
pub use snapshot::{Route, RoutingSnapshot};
