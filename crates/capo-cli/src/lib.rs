//! capo CLI library

pub mod commands;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// capo - OpenStack Cluster API infrastructure inspection
#[derive(Parser, Debug)]
#[command(name = "capo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Client config YAML (defaults to OS_* environment variables)
    #[arg(long, global = true, env = "CAPO_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the security group rules planned for a node role
    Rules(commands::rules::RulesArgs),
    /// List availability zones and the failure domains derived from them
    Zones(commands::zones::ZonesArgs),
    /// Print the node addresses of a server
    Addresses(commands::addresses::AddressesArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Rules(args) => commands::rules::run(args),
            Commands::Zones(args) => commands::zones::run(args, self.config.as_deref()).await,
            Commands::Addresses(args) => {
                commands::addresses::run(args, self.config.as_deref()).await
            }
        }
    }
}
