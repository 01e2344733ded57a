//! # quire CLI
//!
//! Command-line interface for the quire static site generator.

mod commands;

use clap::{ArgAction, Parser, Subcommand};
use quire_core::{Phase, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quire")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(long, env = "QUIRE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the site
    Build {
        /// Stop after this phase
        #[arg(long, default_value = "save")]
        to: Phase,
    },

    /// Query documents and print one projection per match
    List {
        /// Filter expression
        #[arg(long, default_value = "True")]
        filter: String,

        /// Sort key expression
        #[arg(long, default_value = "True")]
        sort: String,

        /// Projection expression
        #[arg(long, default_value = "post.path")]
        map: String,

        /// Reverse the resolved order (newest first for date sorts)
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        reverse: bool,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,

        /// Phase to build up to before querying
        #[arg(long, default_value = "pre_render")]
        phase: Phase,
    },

    /// Show the single document matching a filter
    Show {
        /// Filter expression that must match exactly one document
        filter: String,

        /// Print only this field
        #[arg(long)]
        field: Option<String>,

        /// Phase to build up to before querying
        #[arg(long, default_value = "render")]
        phase: Phase,
    },

    /// Resolve a site attribute, running the build as far as needed
    Get {
        /// Attribute name (e.g. tag_index)
        attribute: String,
    },

    /// List attributes and the phases and plugins that produce them
    Capabilities {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Manage the persistent cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Subcommands registered by plugins
    #[command(external_subcommand)]
    Plugin(Vec<String>),
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Remove every cache entry
    Clear,

    /// Show the number of cached entries
    Stats,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for command output
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Build { to } => commands::build_site(&cli.config, to),
        Commands::List {
            filter,
            sort,
            map,
            reverse,
            json,
            phase,
        } => {
            let opts = commands::ListOptions {
                filter,
                sort,
                map,
                reverse,
                json,
                phase,
            };
            commands::list_documents(&cli.config, &opts)
        }
        Commands::Show {
            filter,
            field,
            phase,
        } => commands::show_document(&cli.config, &filter, field.as_deref(), phase),
        Commands::Get { attribute } => commands::get_attribute(&cli.config, &attribute),
        Commands::Capabilities { json } => commands::list_capabilities(&cli.config, json),
        Commands::Cache { command } => match command {
            CacheCommands::Clear => commands::clear_cache(&cli.config),
            CacheCommands::Stats => commands::cache_stats(&cli.config),
        },
        Commands::Plugin(args) => commands::run_plugin_command(&cli.config, args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_phase_arguments_parse() {
        let cli = Cli::try_parse_from(["quire", "build", "--to", "post_render"]).unwrap();
        assert!(matches!(cli.command, Commands::Build { to: Phase::PostRender }));

        let cli = Cli::try_parse_from(["quire", "list", "--reverse", "false"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::List { reverse: false, phase: Phase::PreRender, .. }
        ));

        assert!(Cli::try_parse_from(["quire", "build", "--to", "publish"]).is_err());
    }

    #[test]
    fn test_unknown_subcommand_goes_to_plugins() {
        let cli = Cli::try_parse_from(["quire", "tags", "rust"]).unwrap();
        match cli.command {
            Commands::Plugin(args) => assert_eq!(args, vec!["tags", "rust"]),
            _ => panic!("expected a plugin subcommand"),
        }
    }
}
