//! CLI-aware configuration resolution.
//!
//! Profiles come from `acm200-config`; global flags override them. Core
//! only ever sees the resulting `MatrixConfig`.

use acm200_config::{Config, Profile};
use acm200_core::MatrixConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use acm200_config::{config_path, load_config, load_config_or_default, save_config};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config
        .active_profile_name(global.profile.as_deref())
        .unwrap_or("default")
        .to_owned()
}

/// Comma-separated profile names for help text.
pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// The profile to use, with `--host`/`--port`/`--timeout` applied.
///
/// With no matching profile, `--host` alone describes a stock matrix.
pub fn resolve_profile(global: &GlobalOpts, config: &Config) -> Result<Profile, CliError> {
    let name = active_profile_name(global, config);

    let mut profile = match config.profiles.get(&name) {
        Some(profile) => profile.clone(),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name,
                available: available_profiles(config),
            });
        }
        None => {
            let host = global.host.as_deref().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?;
            Profile::new(host)
        }
    };

    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(timeout) = global.timeout {
        profile.timeout = Some(timeout);
    }
    Ok(profile)
}

/// Build a validated `MatrixConfig` from the config file and CLI overrides.
pub fn resolve_matrix_config(global: &GlobalOpts) -> Result<MatrixConfig, CliError> {
    let cfg = load_config()?;
    let profile = resolve_profile(global, &cfg)?;
    Ok(acm200_config::profile_to_matrix_config(&profile, &cfg.defaults)?)
}
