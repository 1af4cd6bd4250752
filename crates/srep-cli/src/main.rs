//! srep: remote scenario shell client.
//!
//! Starts troubleshooting scenarios ("plays") on the srep API, queries
//! and cancels them, checks whether they are solved, and attaches the
//! local terminal to a play's shell.

mod commands;
mod config;
mod terminal;

use anyhow::{Context, Result};
use clap::parser::ValueSource;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use tracing::{error, warn};

use srep_client::{Client, ClientOptions};

/// srep: remote scenario shell client
#[derive(Parser)]
#[command(name = "srep", version, about = "Start srep scenarios and attach to their shells")]
struct Cli {
    /// Config file path
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// API host[:port] (overrides config)
    #[arg(long, global = true)]
    url: Option<String>,

    /// API scheme, https or http (overrides config)
    #[arg(long, global = true)]
    scheme: Option<String>,

    /// Bearer token (overrides config)
    #[arg(long, global = true, env = "SREP_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start a new play of a scenario
    Start {
        /// Scenario name
        scenario: String,
    },

    /// List your plays
    Plays,

    /// Show the currently active play
    Active,

    /// Show one play
    Find {
        /// Play ID
        id: String,
    },

    /// Cancel a play
    Cancel {
        /// Play ID
        id: String,
    },

    /// Check whether a play's objective is met
    Check {
        /// Play ID
        id: String,
    },

    /// List the scenario catalog, or describe one scenario
    Scenarios {
        /// Scenario name
        name: Option<String>,
    },

    /// Attach to a play's shell, waiting for it to start
    Shell {
        /// Play ID
        id: String,
    },

    /// Write the effective settings to the config file
    Init,
}

#[tokio::main]
async fn main() {
    let matches = Cli::command().get_matches();
    let token_from_env = matches.value_source("token") == Some(ValueSource::EnvVariable);
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    // Logs go to stderr so relayed shell output on stdout stays clean.
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("srep=debug,srep_cli=debug,srep_client=debug,srep_core=debug")
            .with_writer(std::io::stderr)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("srep=warn,srep_cli=warn,srep_client=warn")
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    let code = match run(cli, token_from_env).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("srep: {e:#}");
            1
        }
    };
    // The stdin reader of a finished shell may still be parked in a
    // blocking read; exit without waiting for it.
    std::process::exit(code);
}

async fn run(cli: Cli, token_from_env: bool) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let mut cfg = config::Config::load(&config_path)?;

    if let Command::Init = cli.command {
        cfg.api.url = cli.url.unwrap_or(cfg.api.url);
        cfg.api.scheme = cli.scheme.unwrap_or(cfg.api.scheme);
        // Only a token given on the command line is written to disk.
        match cli.token {
            Some(token) if !token_from_env => cfg.api.token = token,
            Some(_) => warn!(
                "not saving the SREP_TOKEN token to the config file; pass --token to store one"
            ),
            None => {}
        }
        cfg.save(&config_path)?;
        println!("Wrote {config_path}");
        return Ok(());
    }

    // CLI flags override config.
    let client = Client::new(ClientOptions {
        url: cli.url.unwrap_or(cfg.api.url.clone()),
        scheme: cli.scheme.unwrap_or(cfg.api.scheme.clone()),
        token: cli.token.unwrap_or(cfg.api.token.clone()),
        timeout: cfg.api.timeout(),
    })
    .context("invalid API settings")?;

    match cli.command {
        Command::Start { scenario } => commands::plays::run_start(&client, &scenario).await,
        Command::Plays => commands::plays::run_list(&client, cli.json).await,
        Command::Active => commands::plays::run_active(&client, cli.json).await,
        Command::Find { id } => commands::plays::run_find(&client, &id, cli.json).await,
        Command::Cancel { id } => commands::plays::run_cancel(&client, &id).await,
        Command::Check { id } => commands::plays::run_check(&client, &id).await,
        Command::Scenarios { name } => {
            commands::scenarios::run(&client, name.as_deref(), cli.json).await
        }
        Command::Shell { id } => commands::shell::run(&client, &id, &cfg.retry).await,
        Command::Init => Ok(()),
    }
}
