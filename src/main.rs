use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod cli;
mod core;
mod daemon;

use cli::auth::LoginArgs;
use cli::drift::DriftArgs;
use cli::imports::{ImportsCommand, PluginsCommand};
use cli::providers::ProvidersCommand;
use cli::resources::ResourcesCommand;
use cli::runs::RunsCommand;
use cli::tags::TagsCommand;
use cli::watchlists::WatchlistsCommand;
use crate::core::settings::Settings;

#[derive(Parser)]
#[command(name = "invctl")]
#[command(author, version, about = "Console and run monitor for the inventory collection service")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store credentials for the service
    Login(LoginArgs),

    /// Forget the stored credentials
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Manage providers
    Providers {
        #[command(subcommand)]
        command: ProvidersCommand,
    },

    /// Inspect collection runs
    Runs {
        #[command(subcommand)]
        command: RunsCommand,
    },

    /// Browse discovered resources
    Resources {
        #[command(subcommand)]
        command: ResourcesCommand,
    },

    /// Manage tags
    Tags {
        #[command(subcommand)]
        command: TagsCommand,
    },

    /// Manage watchlists
    Watchlists {
        #[command(subcommand)]
        command: WatchlistsCommand,
    },

    /// Show the drift timeline
    Drift(DriftArgs),

    /// Upload and review metrics imports
    Imports {
        #[command(subcommand)]
        command: ImportsCommand,
    },

    /// Manage collector plugins
    Plugins {
        #[command(subcommand)]
        command: PluginsCommand,
    },

    /// Start the run monitor
    Daemon {
        /// Also send logs to the systemd journal
        #[arg(long)]
        journald: bool,
    },

    /// Trigger a run monitor refresh via D-Bus
    Refresh,

    /// Show the run monitor's current summary via D-Bus
    Summary,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(default_level: &str, json: bool, journald: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let journald_layer = if journald {
        match tracing_journald::layer() {
            Ok(layer) => Some(layer),
            Err(e) => {
                eprintln!("journald unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(journald_layer);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

/// Logging and settings for the one-shot console commands.
fn console(log_json: bool) -> anyhow::Result<Settings> {
    init_logging("warn", log_json, false);
    Settings::load()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Login(args) => {
            let settings = console(cli.log_json)?;
            cli::auth::login(&settings, args).await
        }
        Commands::Logout => {
            console(cli.log_json)?;
            cli::auth::logout()
        }
        Commands::Whoami => {
            let settings = console(cli.log_json)?;
            cli::auth::whoami(&settings)
        }
        Commands::Providers { command } => {
            let settings = console(cli.log_json)?;
            cli::providers::run(&cli::connect(&settings)?, command).await
        }
        Commands::Runs { command } => {
            let settings = console(cli.log_json)?;
            cli::runs::run(&cli::connect(&settings)?, command).await
        }
        Commands::Resources { command } => {
            let settings = console(cli.log_json)?;
            cli::resources::run(&cli::connect(&settings)?, command).await
        }
        Commands::Tags { command } => {
            let settings = console(cli.log_json)?;
            cli::tags::run(&cli::connect(&settings)?, command).await
        }
        Commands::Watchlists { command } => {
            let settings = console(cli.log_json)?;
            cli::watchlists::run(&cli::connect(&settings)?, command).await
        }
        Commands::Drift(args) => {
            let settings = console(cli.log_json)?;
            cli::drift::run(&cli::connect(&settings)?, args).await
        }
        Commands::Imports { command } => {
            let settings = console(cli.log_json)?;
            cli::imports::run(&cli::connect(&settings)?, command).await
        }
        Commands::Plugins { command } => {
            let settings = console(cli.log_json)?;
            cli::imports::run_plugins(&cli::connect(&settings)?, command).await
        }
        Commands::Daemon { journald } => {
            let settings = Settings::load()?;
            let level = if settings.debug { "debug" } else { "info" };
            init_logging(level, cli.log_json, journald);
            daemon::run(settings).await
        }
        Commands::Refresh => {
            init_logging("warn", cli.log_json, false);
            cli::refresh::run().await
        }
        Commands::Summary => {
            init_logging("warn", cli.log_json, false);
            cli::refresh::summary().await
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_runs_watch() {
        let cli = Cli::try_parse_from([
            "invctl", "runs", "list", "--watch", "--interval", "2", "--status", "failed",
        ])
        .unwrap();
        match cli.command {
            Commands::Runs {
                command:
                    RunsCommand::List {
                        watch,
                        interval,
                        status,
                        ..
                    },
            } => {
                assert!(watch);
                assert_eq!(interval, 2);
                assert_eq!(status, Some(crate::core::models::RunStatus::Failed));
            }
            _ => panic!("expected runs list"),
        }
    }

    #[test]
    fn test_log_json_is_global() {
        let cli = Cli::try_parse_from(["invctl", "tags", "list", "--log-json"]).unwrap();
        assert!(cli.log_json);
    }
}
