//! capo CLI
//!
//! Inspect managed security group rules, availability zones and server
//! node addresses of an OpenStack Cluster API deployment.

use clap::Parser;

use capo_cli::{Cli, Result};
use capo_common::telemetry::{init_telemetry, LogFormat, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry(TelemetryConfig {
        service_name: "capo-cli".to_string(),
        format: LogFormat::Plain,
        default_filter: "warn,capo=info".to_string(),
    })?;

    let cli = Cli::parse();
    cli.run().await
}
