//! Shared configuration for acm200 tools.
//!
//! TOML profiles (one per matrix), figment loading with an environment
//! overlay, and translation to `acm200_core::MatrixConfig`. The CLI adds
//! flag-aware wrappers on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use acm200_core::config::{DEFAULT_NUM_INPUTS, DEFAULT_NUM_OUTPUTS, DEFAULT_PORT};
use acm200_core::{DeviceInfo, MatrixConfig, TransportConfig};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "ACM200_CONFIG";

const ENV_PREFIX: &str = "ACM200_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named matrix profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() })
    }

    /// Name of the profile to use: the explicit one, else `default_profile`.
    pub fn active_profile_name<'a>(&'a self, explicit: Option<&'a str>) -> Option<&'a str> {
        explicit.or(self.default_profile.as_deref())
    }

    /// Another profile that already points at `host:port`.
    pub fn find_duplicate(&self, host: &str, port: u16, except: Option<&str>) -> Option<&str> {
        let key = unique_key(host, port);
        self.profiles
            .iter()
            .filter(|(name, _)| Some(name.as_str()) != except)
            .find(|(_, profile)| unique_key(&profile.host, profile.port) == key)
            .map(|(name, _)| name.as_str())
    }
}

fn unique_key(host: &str, port: u16) -> String {
    format!("{}:{port}", host.trim().to_ascii_lowercase())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Overall per-command response deadline, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    5
}

/// One matrix.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Hostname or IP address.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_num_inputs")]
    pub num_inputs: u16,

    #[serde(default = "default_num_outputs")]
    pub num_outputs: u16,

    /// Seconds between polls; values under 2 are raised to 2.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,

    /// Override the global timeout.
    pub timeout: Option<u64>,

    /// Friendly input names keyed by input id ("1", "2", ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_names: BTreeMap<String, String>,

    /// Friendly output names keyed by output id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output_names: BTreeMap<String, String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_num_inputs() -> u16 {
    DEFAULT_NUM_INPUTS
}
fn default_num_outputs() -> u16 {
    DEFAULT_NUM_OUTPUTS
}
fn default_poll_interval() -> u64 {
    5
}

impl Profile {
    /// A profile with stock counts for `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            num_inputs: default_num_inputs(),
            num_outputs: default_num_outputs(),
            poll_interval: default_poll_interval(),
            timeout: None,
            input_names: BTreeMap::new(),
            output_names: BTreeMap::new(),
        }
    }

    /// Name (or with an empty `name`, un-name) input `id`.
    pub fn set_input_name(&mut self, id: u16, name: &str) -> Result<(), ConfigError> {
        set_name(&mut self.input_names, "input", id, self.num_inputs, name)
    }

    /// Name (or with an empty `name`, un-name) output `id`.
    pub fn set_output_name(&mut self, id: u16, name: &str) -> Result<(), ConfigError> {
        set_name(&mut self.output_names, "output", id, self.num_outputs, name)
    }
}

fn set_name(
    names: &mut BTreeMap<String, String>,
    kind: &str,
    id: u16,
    count: u16,
    name: &str,
) -> Result<(), ConfigError> {
    if id == 0 || id > count {
        return Err(ConfigError::Validation {
            field: format!("{kind} id"),
            reason: format!("{id} is outside 1..={count}"),
        });
    }
    let name = name.trim();
    if name.is_empty() {
        names.remove(&id.to_string());
    } else {
        names.insert(id.to_string(), name.to_owned());
    }
    Ok(())
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `ACM200_CONFIG`, else the platform
/// config directory.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "acm200", "acm200").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("acm200");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
///
/// Environment keys use `__` for nesting, e.g. `ACM200_DEFAULTS__OUTPUT=json`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist or is unreadable.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_names(
    field: &str,
    names: &BTreeMap<String, String>,
) -> Result<BTreeMap<u16, String>, ConfigError> {
    names
        .iter()
        .map(|(key, name)| {
            key.trim()
                .parse::<u16>()
                .map(|id| (id, name.clone()))
                .map_err(|_| ConfigError::Validation {
                    field: field.into(),
                    reason: format!("'{key}' is not a port number"),
                })
        })
        .collect()
}

/// Build a validated `MatrixConfig` from a profile.
pub fn profile_to_matrix_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<MatrixConfig, ConfigError> {
    let timeout = profile.timeout.unwrap_or(defaults.timeout);
    if timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    let mut config = MatrixConfig::new(profile.host.trim());
    config.port = profile.port;
    config.num_inputs = profile.num_inputs;
    config.num_outputs = profile.num_outputs;
    config.poll_interval = Duration::from_secs(profile.poll_interval);
    config.transport = TransportConfig {
        response_deadline: Duration::from_secs(timeout),
        ..TransportConfig::default()
    };
    config.input_names = parse_names("input_names", &profile.input_names)?;
    config.output_names = parse_names("output_names", &profile.output_names)?;

    config.validate().map_err(|e| ConfigError::Validation {
        field: "profile".into(),
        reason: e.to_string(),
    })?;
    Ok(config)
}

/// Identity of the matrix a profile points at.
pub fn profile_device_info(profile: &Profile) -> DeviceInfo {
    let mut config = MatrixConfig::new(profile.host.trim());
    config.port = profile.port;
    config.num_inputs = profile.num_inputs;
    config.num_outputs = profile.num_outputs;
    DeviceInfo::from_config(&config)
}
