//! Command-line interface for scand
//!
//! Argument parsing and command dispatch. Tracing is initialized here so
//! every command logs through the same subscriber; diagnostics go to stderr,
//! keeping stdout clean for record output.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use crate::config::ServiceConfig;

mod commands;
mod output;

/// Scand - scan job orchestration with a durable result store
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<String>,

    /// Database file override
    #[arg(long, value_name = "FILE", global = true)]
    pub db: Option<PathBuf>,

    /// Output format for scan records
    #[arg(long, value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable quiet output (warnings and errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the orchestrator as an HTTP service
    Serve {
        /// Bind host override
        #[arg(long)]
        host: Option<String>,
        /// Bind port override
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run a single scan in the foreground and print the result
    Scan {
        /// Target to scan
        target: String,
        /// Executor kind (defaults to the configured kind)
        #[arg(short, long)]
        kind: Option<String>,
    },
    /// Show a stored scan
    Status {
        /// Scan id
        id: Uuid,
    },
    /// List recent scans, newest first
    List {
        /// Maximum number of scans to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Show the merged configuration
    Config,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        init_tracing(self.verbose, self.quiet);

        let mut config = ServiceConfig::load_with_custom_config(self.config.as_deref())?;
        if let Some(db) = self.db {
            config.database.path = db;
        }

        match self.command {
            Some(Commands::Serve { host, port }) => {
                commands::serve::execute(config, host, port).await
            }
            Some(Commands::Scan { target, kind }) => {
                commands::scan::execute(config, &target, kind.as_deref(), self.format).await
            }
            Some(Commands::Status { id }) => {
                commands::status::execute(&config, id, self.format).await
            }
            Some(Commands::List { limit }) => {
                commands::list::execute(&config, limit, self.format).await
            }
            Some(Commands::Config) => commands::config::execute(&config).await,
            None => {
                // Show help when no command is provided
                let mut cmd = Cli::command();
                cmd.print_help()?;
                Ok(())
            }
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_filter = if quiet {
        "scand=warn"
    } else if verbose {
        "scand=debug,tower_http=debug"
    } else {
        "scand=info,tower_http=warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
