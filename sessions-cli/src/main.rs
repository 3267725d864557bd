mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "sessions")]
#[command(about = "Run code in a remote session pool")]
#[command(version)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "SESSIONS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Pool management endpoint (overrides config and environment)
    #[arg(short, long, global = true)]
    pub endpoint: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute code fragments in order and print the combined output
    Run {
        /// Files holding one fragment each (reads stdin when empty)
        files: Vec<PathBuf>,

        /// Treat input as a markdown message and run its python blocks
        #[arg(short, long)]
        markdown: bool,

        /// Session identifier (default: random per invocation)
        #[arg(short, long)]
        identifier: Option<String>,

        /// Sandbox-side timeout per fragment in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print the outcome as JSON instead of the raw log
        #[arg(long)]
        json: bool,
    },
    /// Acquire a token and print its expiry
    Token {
        /// Authorization scope (default: the pool audience)
        #[arg(short, long)]
        scope: Option<String>,
    },
    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let guard = commands::init_tracing(cli.verbose, cli.log_file.as_deref())?;

    let config = commands::resolve_config(cli.config.as_deref(), cli.endpoint);

    match cli.command {
        Commands::Run {
            files,
            markdown,
            identifier,
            timeout,
            json,
        } => {
            let mut config = config?;
            if let Some(identifier) = identifier {
                config = config.with_identifier(identifier);
            }
            if let Some(secs) = timeout {
                config = config.with_execution_timeout(Duration::from_secs(secs));
            }

            let fragments = commands::read_fragments(&files, markdown)?;
            let outcome = commands::execute_run(config, fragments).await?;
            commands::print_outcome(&outcome, json)?;

            // Flush the file appender before exiting with the batch status
            drop(guard);
            std::process::exit(outcome.exit_code);
        }
        Commands::Token { scope } => commands::execute_token(config?, scope).await,
        Commands::Config => {
            print!("{}", config?.to_toml()?);
            Ok(())
        }
    }
}
