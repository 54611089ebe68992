//! sbproj
//!
//! Runs the service binding projector over workload manifests.

use clap::Parser;

use servicebinding_cli::{Cli, Result};
use servicebinding_common::telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        format: cli.log_format,
        ..Default::default()
    })?;

    cli.run().await
}
