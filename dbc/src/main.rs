//! dbc - Database console CLI
//!
//! Connection URI tools, masking pattern administration and access
//! evaluation, working directly against the console database.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;
mod config;
mod error;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("dbc=info".parse()?))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = config::Config::load()?;

    // Execute command
    match cli.command {
        Commands::Uri(cmd) => commands::uri::execute(cmd).await,
        Commands::Pattern(cmd) => commands::pattern::execute(cmd, &config).await,
        Commands::Evaluate(args) => commands::evaluate::execute(args, &config).await,
        Commands::Exception(cmd) => commands::exception::execute(cmd, &config).await,
        Commands::Doctor => commands::doctor::execute(&config).await,
        Commands::Version => {
            println!("dbc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
