//! CLI module for Parentline
//!
//! - `serve`: run the HTTP and websocket server (default)
//! - `seed-milestones`: load the built-in milestone catalogue
//! - `check-config`: print the resolved configuration and its warnings

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::server::config::AppConfig;

/// Parentline parenting-support server
#[derive(Parser, Debug)]
#[command(name = "parentline")]
#[command(about = "Parenting-support API and chat server")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the server (default)
    Serve,
    /// Insert the built-in developmental milestones
    SeedMilestones,
    /// Print the resolved configuration and exit
    CheckConfig,
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => crate::server::run(config).await,
        Commands::SeedMilestones => {
            let inserted = crate::server::seed_milestones(&config).await?;
            println!("Seeded {} milestones into {}", inserted, config.database.path);
            Ok(())
        }
        Commands::CheckConfig => {
            check_config(&config);
            Ok(())
        }
    }
}

fn check_config(config: &AppConfig) {
    println!("Environment: {}", crate::server::environment_name());
    println!("{:#?}", config);

    let warnings = crate::server::production_warnings(config);
    if warnings.is_empty() {
        println!("No configuration warnings.");
    }
    for warning in warnings {
        println!("warning: {}", warning);
    }
}
