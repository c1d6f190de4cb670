//! Config subcommand handlers.

use dialoguer::Input;

use acm200_config::{Config, Profile, profile_device_info, profile_to_matrix_config};
use acm200_core::config::{DEFAULT_NUM_INPUTS, DEFAULT_NUM_OUTPUTS, DEFAULT_PORT};

use crate::cli::{AddProfileArgs, ConfigArgs, ConfigCommand, GlobalOpts, PortKind};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

/// Validate `profile` and store it under `name`, refusing a second
/// profile for the same matrix.
fn insert_profile(
    cfg: &mut Config,
    name: &str,
    profile: Profile,
    make_default: bool,
) -> Result<(), CliError> {
    if cfg.profiles.contains_key(name) {
        return Err(CliError::Conflict {
            resource_type: "profile".into(),
            identifier: name.into(),
        });
    }
    if let Some(existing) = cfg.find_duplicate(&profile.host, profile.port, None) {
        let info = profile_device_info(&profile);
        return Err(CliError::Conflict {
            resource_type: "matrix".into(),
            identifier: format!("{} (profile '{existing}')", info.unique_key),
        });
    }

    profile_to_matrix_config(&profile, &cfg.defaults)?;

    cfg.profiles.insert(name.to_owned(), profile);
    if make_default || cfg.profiles.len() == 1 {
        cfg.default_profile = Some(name.to_owned());
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("acm200 configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let mut cfg = config::load_config_or_default();

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let host: String = Input::new()
                .with_prompt("Matrix hostname or IP")
                .interact_text()
                .map_err(prompt_err)?;

            let port: u16 = Input::new()
                .with_prompt("Telnet port")
                .default(DEFAULT_PORT)
                .interact_text()
                .map_err(prompt_err)?;

            let num_inputs: u16 = Input::new()
                .with_prompt("Number of inputs")
                .default(DEFAULT_NUM_INPUTS)
                .interact_text()
                .map_err(prompt_err)?;

            let num_outputs: u16 = Input::new()
                .with_prompt("Number of outputs")
                .default(DEFAULT_NUM_OUTPUTS)
                .interact_text()
                .map_err(prompt_err)?;

            let mut profile = Profile::new(host.trim());
            profile.port = port;
            profile.num_inputs = num_inputs;
            profile.num_outputs = num_outputs;

            insert_profile(&mut cfg, &profile_name, profile, true)?;
            config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Test it: acm200 routes");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let text = toml::to_string_pretty(&cfg).map_err(|e| CliError::Render {
                message: e.to_string(),
            })?;
            let out = output::render_single(
                global.output,
                &cfg,
                |_| text.trim_end().to_owned(),
                |c| c.profiles.keys().cloned().collect::<Vec<_>>().join("\n"),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            println!("{}", config::config_path().display());
            Ok(())
        }

        // ── Add <name> ──────────────────────────────────────────────
        ConfigCommand::Add(AddProfileArgs {
            name,
            address,
            telnet_port,
            inputs,
            outputs,
            poll_interval,
            default,
        }) => {
            let mut cfg = config::load_config()?;

            let mut profile = Profile::new(address.trim());
            profile.port = telnet_port;
            profile.num_inputs = inputs;
            profile.num_outputs = outputs;
            profile.poll_interval = poll_interval;

            insert_profile(&mut cfg, &name, profile, default)?;
            config::save_config(&cfg)?;
            eprintln!("✓ Added profile '{name}'");
            Ok(())
        }

        // ── SetName <input|output> <id> <name> ──────────────────────
        ConfigCommand::SetName { kind, id, name } => {
            let mut cfg = config::load_config()?;
            let profile_name = config::active_profile_name(global, &cfg);
            let available = config::available_profiles(&cfg);

            let profile = cfg
                .profiles
                .get_mut(&profile_name)
                .ok_or_else(|| CliError::ProfileNotFound {
                    name: profile_name.clone(),
                    available,
                })?;

            match kind {
                PortKind::Input => profile.set_input_name(id, &name)?,
                PortKind::Output => profile.set_output_name(id, &name)?,
            }

            config::save_config(&cfg)?;
            let side = match kind {
                PortKind::Input => "IN",
                PortKind::Output => "OUT",
            };
            eprintln!("✓ Named {side}{id:03} on profile '{profile_name}'");
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: acm200 config init");
            } else {
                for (name, profile) in &cfg.profiles {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}\t{}:{}", profile.host, profile.port);
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;

            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: config::available_profiles(&cfg),
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }
    }
}
