//! Command dispatch: bridges CLI args -> `Matrix` calls -> output formatting.

pub mod config_cmd;
pub mod device;
pub mod routing;
pub mod watch;

use acm200_core::MatrixConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a matrix-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: MatrixConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Switch(args) => routing::switch(config, args, global).await,
        Command::Route(args) => routing::route(config, args, global).await,
        Command::Routes => routing::routes(config, global).await,
        Command::Watch(args) => watch::handle(config, args, global).await,
        Command::Inputs => device::inputs(&config, global),
        Command::Info => device::info(&config, global),
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
