//! sleuth CLI: the main entry point.
//!
//! Commands:
//! - `research`  Run one research session and print the report
//! - `providers` Show configured providers in attempt order
//! - `config`    Show, initialize or locate the configuration file

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(
    name = "sleuth",
    about = "sleuth: an autonomous research agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Use this config file instead of ~/.sleuth/config.toml
    #[arg(short, long, global = true, env = "SLEUTH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Research a question and print the report
    Research(commands::research::ResearchArgs),

    /// List configured LLM providers in attempt order
    Providers,

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the config file path
    Path,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Research(args) => commands::research::run(config_path, args).await,
        Commands::Providers => commands::providers::run(config_path).await,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await,
            ConfigAction::Init { force } => commands::config_cmd::init(config_path, force).await,
            ConfigAction::Path => commands::config_cmd::path(config_path).await,
        },
    }
}
