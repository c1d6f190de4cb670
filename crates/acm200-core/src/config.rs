// ── Runtime matrix configuration ──
//
// Describes *which* matrix to talk to and how often to poll it.
// Never touches disk: the CLI (or any other host) builds a `MatrixConfig`
// and hands it in.

use std::collections::BTreeMap;
use std::time::Duration;

use acm200_api::{DeviceAddress, TransportConfig};

use crate::error::CoreError;

pub use acm200_api::transport::DEFAULT_PORT;

pub const DEFAULT_NUM_INPUTS: u16 = 4;
pub const DEFAULT_NUM_OUTPUTS: u16 = 9;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Polling faster than this just queues cycles behind each other.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Configuration for one matrix.
#[derive(Debug, Clone)]
pub struct MatrixConfig {
    /// Hostname or IP of the matrix.
    pub host: String,
    /// Telnet port (23 unless remapped).
    pub port: u16,
    /// Number of inputs (TX) exposed as sources.
    pub num_inputs: u16,
    /// Number of outputs (RX) polled for routes.
    pub num_outputs: u16,
    /// Requested poll period; see [`effective_poll_interval`](Self::effective_poll_interval).
    pub poll_interval: Duration,
    /// Per-command time bounds.
    pub transport: TransportConfig,
    /// Friendly input names keyed by input id.
    pub input_names: BTreeMap<u16, String>,
    /// Friendly output names keyed by output id.
    pub output_names: BTreeMap<u16, String>,
}

impl MatrixConfig {
    /// Configuration with stock defaults for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            num_inputs: DEFAULT_NUM_INPUTS,
            num_outputs: DEFAULT_NUM_OUTPUTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            transport: TransportConfig::default(),
            input_names: BTreeMap::new(),
            output_names: BTreeMap::new(),
        }
    }

    /// The TCP endpoint, validated.
    pub fn address(&self) -> Result<DeviceAddress, CoreError> {
        DeviceAddress::new(self.host.clone(), self.port).map_err(|e| CoreError::Config {
            message: e.to_string(),
        })
    }

    /// Poll period with the minimum floor applied.
    pub fn effective_poll_interval(&self) -> Duration {
        self.poll_interval.max(MIN_POLL_INTERVAL)
    }

    /// Reject configurations the matrix can never satisfy.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.address()?;
        check_count("num_inputs", self.num_inputs)?;
        check_count("num_outputs", self.num_outputs)?;
        check_names("input_names", &self.input_names, self.num_inputs)?;
        check_names("output_names", &self.output_names, self.num_outputs)?;
        Ok(())
    }
}

fn check_count(field: &str, count: u16) -> Result<(), CoreError> {
    if count == 0 || count > acm200_api::protocol::MAX_PORT_ID {
        return Err(CoreError::Config {
            message: format!(
                "{field} must be between 1 and {}, got {count}",
                acm200_api::protocol::MAX_PORT_ID
            ),
        });
    }
    Ok(())
}

fn check_names(field: &str, names: &BTreeMap<u16, String>, count: u16) -> Result<(), CoreError> {
    match names.keys().find(|id| **id == 0 || **id > count) {
        Some(id) => Err(CoreError::Config {
            message: format!("{field} has id {id}, outside 1..={count}"),
        }),
        None => Ok(()),
    }
}
