//! Parley CLI: the main entry point.
//!
//! Commands:
//! - `serve`  : Start the HTTP/websocket gateway
//! - `ask`    : Single message or interactive chat through the full pipeline
//! - `rules`  : Manage canned-answer rules through the gateway admin API
//! - `config` : Show, initialize or validate configuration
//! - `doctor` : Diagnose system health

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod gateway_client;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley — tiered response-routing chat backend",
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
    json_logs: bool,

    /// Use this config file instead of ~/.parley/config.toml
    #[arg(short, long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Ask a question through the full pipeline
    Ask {
        /// Send a single message instead of entering interactive mode
        message: Option<String>,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Manage canned-answer rules on the running gateway
    Rules {
        /// Gateway base URL (defaults to the configured host and port)
        #[arg(long, env = "PARLEY_GATEWAY_URL")]
        gateway: Option<String>,

        /// Write to the store directly, then ask the gateway to reload if it is up
        #[arg(long)]
        offline: bool,

        #[command(subcommand)]
        action: RulesAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose system health
    Doctor,
}

#[derive(Subcommand)]
enum RulesAction {
    /// List all rules
    List,

    /// Add a rule
    Add {
        /// Answer returned when a pattern matches
        #[arg(short, long)]
        answer: String,

        /// Regex pattern (repeatable)
        #[arg(short, long = "pattern", required = true)]
        patterns: Vec<String>,

        /// Provenance shown as the citation
        #[arg(short, long, default_value = "")]
        source: String,
    },

    /// Delete a rule
    Remove { id: i64 },

    /// Activate a rule
    Enable { id: i64 },

    /// Deactivate a rule
    Disable { id: i64 },

    /// Show which rule, if any, answers `text`
    Test { text: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration
    Validate,

    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.json_logs {
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
        Commands::Serve { port, host } => commands::serve::run(config_path, port, host).await?,
        Commands::Ask { message, session } => commands::ask::run(config_path, message, session).await?,
        Commands::Rules {
            gateway,
            offline,
            action,
        } => {
            let target = commands::rules::Target { gateway, offline };
            match action {
                RulesAction::List => commands::rules::list(config_path, &target).await?,
                RulesAction::Add {
                    answer,
                    patterns,
                    source,
                } => commands::rules::add(config_path, &target, patterns, answer, source).await?,
                RulesAction::Remove { id } => commands::rules::remove(config_path, &target, id).await?,
                RulesAction::Enable { id } => commands::rules::set_active(config_path, &target, id, true).await?,
                RulesAction::Disable { id } => {
                    commands::rules::set_active(config_path, &target, id, false).await?
                }
                RulesAction::Test { text } => commands::rules::test(config_path, &target, &text).await?,
            }
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Init { force } => commands::config_cmd::init(config_path, force).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
        },
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
