//! TMX Notes CLI - shared notes and allowlist administration from the terminal.

mod auth;
mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::check::run_check;
use crate::commands::common::connect;
use crate::commands::completions::run_completions;
use crate::commands::notes::run_notes;
use crate::commands::users::run_users;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tmx=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Auth { command } => run_auth(command).await?,
        Commands::Check { email } => {
            let ctx = connect().await?;
            println!("{}", run_check(&ctx, email.as_deref()).await?);
        }
        Commands::Notes { command } => run_notes(&connect().await?, command).await?,
        Commands::Users { command } => run_users(&connect().await?, command).await?,
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}
