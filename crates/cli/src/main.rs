//! Stratum CLI — the main entry point.
//!
//! Commands:
//! - `demo`    — Run the greet scenario under the chosen layers
//! - `layers`  — Show the base layers activated from config
//! - `config`  — Validate, show, or locate the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stratum",
    about = "Stratum — layered dispatch for context-oriented Rust",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.stratum/config.toml
    #[arg(short, long, global = true, env = "STRATUM_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Greet someone with layers activated around the call
    Demo {
        /// Activate a layer for the call (repeatable, last is outermost)
        #[arg(short, long = "layer", value_name = "NAME")]
        layers: Vec<String>,

        /// Print the advice registered on the greet method
        #[arg(long)]
        describe: bool,

        /// Who to greet
        name: String,
    },

    /// Show base layers and every known layer name
    Layers {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Check the configuration for errors
    Validate,
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let logging = commands::load_config(cli.config.as_deref())
        .map(|config| config.logging)
        .unwrap_or_default();
    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        logging.level
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Demo {
            layers,
            describe,
            name,
        } => commands::demo::run(config_path, &layers, &name, describe)?,
        Commands::Layers { json } => commands::layers::run(config_path, json)?,
        Commands::Config { action } => match action {
            ConfigAction::Validate => commands::config_cmd::validate(config_path)?,
            ConfigAction::Show => commands::config_cmd::show(config_path)?,
            ConfigAction::Path => commands::config_cmd::path(config_path)?,
        },
    }

    Ok(())
}
