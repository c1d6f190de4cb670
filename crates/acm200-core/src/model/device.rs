use serde::Serialize;

use crate::config::MatrixConfig;

pub const MANUFACTURER: &str = "Blustream";
pub const MODEL: &str = "ACM200";
pub const CONFIGURATION_URL: &str = "https://www.blustream.co.uk/";

/// Identity of one configured matrix, as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// `host:port`; two configurations with the same key are the same matrix.
    pub unique_key: String,
    pub name: String,
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub configuration_url: &'static str,
    pub num_inputs: u16,
    pub num_outputs: u16,
}

impl DeviceInfo {
    pub fn from_config(config: &MatrixConfig) -> Self {
        let host = config.host.trim();
        Self {
            unique_key: format!("{host}:{}", config.port),
            name: format!("{MANUFACTURER} {MODEL} ({host})"),
            manufacturer: MANUFACTURER,
            model: MODEL,
            configuration_url: CONFIGURATION_URL,
            num_inputs: config.num_inputs,
            num_outputs: config.num_outputs,
        }
    }
}
