//! Agora CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write the default config
//! - `run`: Start a worker agent until Ctrl-C
//! - `agents`: List registered agents
//! - `tasks`: List pending tasks
//! - `status`: Show configuration and platform reachability

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "agora",
    about = "Agora — run agents on a shared collaboration platform",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.agora/config.toml
    #[arg(short, long, global = true, env = "AGORA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Onboard,

    /// Register a worker agent and process tasks until interrupted
    Run {
        /// Override the agent name
        #[arg(short, long)]
        name: Option<String>,

        /// Capability tag (repeatable); replaces the configured list
        #[arg(short = 'C', long = "capability")]
        capabilities: Vec<String>,

        /// Claim every new task, not only those matching a capability
        #[arg(long)]
        auto_claim: bool,
    },

    /// List agents known to the platform
    Agents {
        /// Only agents currently connected
        #[arg(long)]
        online: bool,
    },

    /// List pending tasks
    Tasks,

    /// Show configuration and platform reachability
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Run {
            name,
            capabilities,
            auto_claim,
        } => commands::run::run(config_path, name, capabilities, auto_claim).await?,
        Commands::Agents { online } => commands::agents::run(config_path, online).await?,
        Commands::Tasks => commands::tasks::run(config_path).await?,
        Commands::Status => commands::status::run(config_path).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_repeated_capabilities() {
        let cli = Cli::try_parse_from([
            "agora", "run", "--name", "A", "-C", "rust", "--capability", "logs", "--auto-claim",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                name,
                capabilities,
                auto_claim,
            } => {
                assert_eq!(name.as_deref(), Some("A"));
                assert_eq!(capabilities, vec!["rust", "logs"]);
                assert!(auto_claim);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["agora", "agents", "--online", "-v", "--config", "a.toml"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("a.toml")));
        assert!(matches!(cli.command, Commands::Agents { online: true }));
    }
}
