//! Dispatch of plugin-registered subcommands.

use super::open_engine;
use anyhow::{anyhow, Context, Result};
use clap::Command;
use std::path::Path;

/// Parse `args` (subcommand name first) against the plugins' commands and
/// run the matching handler
pub fn run_plugin_command(config_path: &Path, args: Vec<String>) -> Result<()> {
    let mut engine = open_engine(config_path)?;
    let surface = engine.register_commands()?;

    let root = surface.augment(
        Command::new("quire")
            .no_binary_name(true)
            .subcommand_required(true),
    );
    let matches = root.try_get_matches_from(args)?;
    let (name, sub_matches) = matches
        .subcommand()
        .context("No plugin subcommand given")?;

    let handler = surface
        .handler(name)
        .ok_or_else(|| anyhow!("No plugin registered the '{}' command", name))?;
    handler(&mut engine, sub_matches).with_context(|| format!("'{}' failed", name))?;

    engine.teardown()?;
    Ok(())
}
